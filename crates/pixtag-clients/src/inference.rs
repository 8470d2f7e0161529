//! Hosted inference API client
//!
//! Posts raw image bytes to two hosted models:
//! - an image-captioning model answering `[{"generated_text": "..."}]`
//! - an image-classification model answering `[{"label": "...", "score": 0.9}, ...]`

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::ClientError;
use crate::InferenceApi;

pub const DEFAULT_INFERENCE_API_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_CAPTION_MODEL: &str = "Salesforce/blip-image-captioning-base";
pub const DEFAULT_CLASSIFIER_MODEL: &str = "microsoft/resnet-50";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One ranked entry from the classification model
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub label: String,
    pub score: f32,
}

/// Wire form of a label; missing or null fields are tolerated
#[derive(Debug, Deserialize)]
struct RawLabel {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    score: Option<f32>,
}

impl From<RawLabel> for Label {
    fn from(raw: RawLabel) -> Self {
        Self {
            label: raw.label.unwrap_or_default(),
            score: raw.score.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeneratedCaption {
    generated_text: String,
}

#[derive(Clone)]
pub struct InferenceClient {
    client: reqwest::Client,
    api_key: Arc<String>,
    base_url: String,
    caption_model: String,
    classifier_model: String,
}

impl InferenceClient {
    pub fn new(api_key: String) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("pixtag/0.1.0")
            .build()?;

        Ok(Self {
            client,
            api_key: Arc::new(api_key),
            base_url: DEFAULT_INFERENCE_API_URL.to_string(),
            caption_model: DEFAULT_CAPTION_MODEL.to_string(),
            classifier_model: DEFAULT_CLASSIFIER_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_models(
        mut self,
        caption_model: impl Into<String>,
        classifier_model: impl Into<String>,
    ) -> Self {
        self.caption_model = caption_model.into();
        self.classifier_model = classifier_model.into();
        self
    }

    /// Generate a one-sentence caption for the image
    pub async fn caption(&self, image: &[u8]) -> Result<String, ClientError> {
        let body = self.post_image(&self.caption_model, image).await?;
        parse_caption(&body)
    }

    /// Fetch the ranked label list for the image, best first
    pub async fn classify(&self, image: &[u8]) -> Result<Vec<Label>, ClientError> {
        let body = self.post_image(&self.classifier_model, image).await?;
        parse_labels(&body)
    }

    async fn post_image(&self, model: &str, image: &[u8]) -> Result<String, ClientError> {
        let url = format!("{}/{}", self.base_url, model);
        debug!("Inference request to {} ({} bytes)", url, image.len());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .body(image.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl InferenceApi for InferenceClient {
    async fn caption(&self, image: &[u8]) -> Result<String, ClientError> {
        InferenceClient::caption(self, image).await
    }

    async fn classify(&self, image: &[u8]) -> Result<Vec<Label>, ClientError> {
        InferenceClient::classify(self, image).await
    }
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("base_url", &self.base_url)
            .field("caption_model", &self.caption_model)
            .field("classifier_model", &self.classifier_model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Extract the caption from a captioning response body
pub fn parse_caption(body: &str) -> Result<String, ClientError> {
    let items: Vec<GeneratedCaption> = serde_json::from_str(body)?;
    items
        .into_iter()
        .next()
        .map(|item| item.generated_text)
        .ok_or_else(|| ClientError::Malformed("empty caption list".to_string()))
}

/// Extract the ranked labels from a classification response body.
///
/// The body must be a JSON list. Items that are not label objects keep their
/// rank slot with an empty label, so callers can skip them.
pub fn parse_labels(body: &str) -> Result<Vec<Label>, ClientError> {
    let items: Vec<serde_json::Value> = serde_json::from_str(body)?;
    Ok(items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<RawLabel>(item)
                .map(Label::from)
                .unwrap_or_else(|e| {
                    debug!("Unreadable label entry: {}", e);
                    Label {
                        label: String::new(),
                        score: 0.0,
                    }
                })
        })
        .collect())
}
