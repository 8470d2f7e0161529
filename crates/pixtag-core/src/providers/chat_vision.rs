//! Chat vision provider
//!
//! Sends the image to an OpenAI-compatible multimodal model with an
//! instruction to answer with a single JSON object, then parses the reply.
//! Parse failures and call errors are retried with a fixed delay; running
//! out of attempts yields [`AnnotationResult::analysis_failed`].

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use pixtag_clients::{ChatApi, ChatClient};

use crate::annotation::AnnotationResult;
use crate::config::{ChatVisionSettings, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use crate::error::AnnotationError;
use crate::providers::AnnotationProvider;

pub const ANNOTATION_PROMPT: &str = r##"Analyze this image and return ONLY valid JSON in this exact format:
{
    "description": "one descriptive sentence about the image",
    "tags": ["tag1", "tag2", "tag3", "tag4", "tag5"],
    "colors": ["#HEX1", "#HEX2", "#HEX3"]
}

Return ONLY the JSON, no other text."##;

pub struct ChatVisionProvider {
    api: Arc<dyn ChatApi>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ChatVisionProvider {
    pub fn new(settings: &ChatVisionSettings) -> Result<Self, AnnotationError> {
        if settings.api_key.trim().is_empty() {
            return Err(AnnotationError::Configuration(
                "chat API key is not configured".to_string(),
            ));
        }

        let client =
            ChatClient::new(&settings.api_url, settings.api_key.clone(), &settings.model)?;
        info!(
            "Chat vision provider ready (model {}, {} retries, {:?} delay)",
            client.model(),
            settings.max_retries,
            settings.retry_delay
        );

        Ok(Self::with_api(Arc::new(client))
            .with_retry_policy(settings.max_retries, settings.retry_delay))
    }

    pub fn with_api(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    async fn attempt(&self, image: &[u8]) -> Result<AnnotationResult, AnnotationError> {
        let reply = self.api.complete(image, ANNOTATION_PROMPT).await?;
        let parsed = parse_reply(&reply);
        if parsed.is_err() {
            let preview: String = reply.chars().take(200).collect();
            debug!("Unparsable chat reply: {}", preview);
        }
        parsed
    }
}

#[async_trait]
impl AnnotationProvider for ChatVisionProvider {
    fn name(&self) -> &str {
        "chat-vision"
    }

    async fn annotate(&self, image: &[u8]) -> AnnotationResult {
        let attempts = self.max_retries.saturating_add(1);

        for attempt in 0..attempts {
            match self.attempt(image).await {
                Ok(result) => {
                    info!(
                        "Chat vision annotation: {} tags, {} colors",
                        result.tags.len(),
                        result.colors.len()
                    );
                    return result;
                }
                Err(e) => {
                    warn!("Chat vision attempt {}/{} failed: {}", attempt + 1, attempts, e);
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!("Chat vision gave up after {} attempts", attempts);
        AnnotationResult::analysis_failed()
    }
}

// ============================================================================
// Reply Parsing
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ChatReply {
    description: Option<String>,
    tags: Option<Vec<String>>,
    colors: Option<Vec<String>>,
}

/// Remove a surrounding Markdown code fence, if any
pub fn strip_code_fence(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.strip_prefix("json").unwrap_or(rest);
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a model reply into a result, defaulting missing or null keys to empty.
///
/// Only invalid JSON, a non-object, or wrongly typed values are errors.
pub fn parse_reply(reply: &str) -> Result<AnnotationResult, AnnotationError> {
    let parsed: ChatReply = serde_json::from_str(strip_code_fence(reply))?;
    Ok(AnnotationResult::new(
        parsed.tags.unwrap_or_default(),
        parsed.description.unwrap_or_default(),
        parsed.colors.unwrap_or_default(),
    ))
}
