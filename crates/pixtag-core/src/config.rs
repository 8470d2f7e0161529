use anyhow::{Context, Result};
use std::time::Duration;

use pixtag_clients::chat::{DEFAULT_CHAT_API_URL, DEFAULT_CHAT_MODEL};
use pixtag_clients::inference::{
    DEFAULT_CAPTION_MODEL, DEFAULT_CLASSIFIER_MODEL, DEFAULT_INFERENCE_API_URL,
};

use crate::error::AnnotationError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Which provider the operator asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderChoice {
    /// First viable of chat, classifier, heuristic
    Auto,
    Chat,
    Classifier,
    Heuristic,
}

impl std::str::FromStr for ProviderChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(ProviderChoice::Auto),
            "chat" | "openai" => Ok(ProviderChoice::Chat),
            "classifier" | "huggingface" => Ok(ProviderChoice::Classifier),
            "heuristic" | "mock" | "offline" => Ok(ProviderChoice::Heuristic),
            other => Err(anyhow::anyhow!(
                "Invalid provider: {}. Must be 'auto', 'chat', 'classifier' or 'heuristic'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderChoice,

    pub chat_api_url: String,
    pub chat_api_key: Option<String>,
    pub chat_model: String,
    /// Extra attempts after the first chat call fails
    pub chat_max_retries: u32,
    pub chat_retry_delay: Duration,

    pub inference_api_url: String,
    pub inference_api_key: Option<String>,
    pub caption_model: String,
    pub classifier_model: String,

    /// Fixes the heuristic provider's randomness when set
    pub heuristic_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderChoice::Auto,
            chat_api_url: DEFAULT_CHAT_API_URL.to_string(),
            chat_api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chat_max_retries: DEFAULT_MAX_RETRIES,
            chat_retry_delay: DEFAULT_RETRY_DELAY,
            inference_api_url: DEFAULT_INFERENCE_API_URL.to_string(),
            inference_api_key: None,
            caption_model: DEFAULT_CAPTION_MODEL.to_string(),
            classifier_model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            heuristic_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            provider: env_var("PIXTAG_PROVIDER")
                .unwrap_or_default()
                .parse::<ProviderChoice>()
                .context("PIXTAG_PROVIDER is invalid")?,

            chat_api_url: env_var("CHAT_API_URL")
                .unwrap_or_else(|| DEFAULT_CHAT_API_URL.to_string()),
            chat_api_key: env_var("OPENAI_API_KEY").or_else(|| env_var("AI_API_KEY")),
            chat_model: env_var("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            chat_max_retries: env_var("CHAT_MAX_RETRIES")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("CHAT_MAX_RETRIES must be a non-negative integer")?
                .unwrap_or(DEFAULT_MAX_RETRIES),
            chat_retry_delay: env_var("CHAT_RETRY_DELAY_SECS")
                .map(|v| parse_delay_secs(&v))
                .transpose()
                .context("CHAT_RETRY_DELAY_SECS must be a non-negative number of seconds")?
                .unwrap_or(DEFAULT_RETRY_DELAY),

            inference_api_url: env_var("INFERENCE_API_URL")
                .unwrap_or_else(|| DEFAULT_INFERENCE_API_URL.to_string()),
            inference_api_key: env_var("HUGGINGFACE_API_KEY")
                .or_else(|| env_var("VITE_HUGGINGFACE_API_KEY")),
            caption_model: env_var("CAPTION_MODEL")
                .unwrap_or_else(|| DEFAULT_CAPTION_MODEL.to_string()),
            classifier_model: env_var("CLASSIFIER_MODEL")
                .unwrap_or_else(|| DEFAULT_CLASSIFIER_MODEL.to_string()),

            heuristic_seed: env_var("HEURISTIC_SEED")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("HEURISTIC_SEED must be an unsigned integer")?,
        })
    }

    /// Resolve the single provider this process will use
    pub fn provider_config(&self) -> Result<ProviderConfig, AnnotationError> {
        ProviderConfig::resolve(self)
    }
}

/// Read an env var, treating blank values as unset
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_delay_secs(value: &str) -> Result<Duration> {
    let secs: f64 = value.parse()?;
    Ok(Duration::try_from_secs_f64(secs)?)
}

// ============================================================================
// Provider Selection
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatVisionSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct CaptionClassifierSettings {
    pub api_url: String,
    pub api_key: String,
    pub caption_model: String,
    pub classifier_model: String,
}

/// The provider backing the annotation service, fixed for the process lifetime
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    ChatVision(ChatVisionSettings),
    CaptionClassifier(CaptionClassifierSettings),
    Heuristic { seed: Option<u64> },
}

impl ProviderConfig {
    /// Pick a provider: chat credential, then classifier credential, then heuristic.
    ///
    /// An explicit choice skips the priority order; asking for a remote provider
    /// without its credential is a configuration error.
    pub fn resolve(config: &Config) -> Result<Self, AnnotationError> {
        let chat = || {
            config.chat_api_key.clone().map(|api_key| {
                ProviderConfig::ChatVision(ChatVisionSettings {
                    api_url: config.chat_api_url.clone(),
                    api_key,
                    model: config.chat_model.clone(),
                    max_retries: config.chat_max_retries,
                    retry_delay: config.chat_retry_delay,
                })
            })
        };
        let classifier = || {
            config.inference_api_key.clone().map(|api_key| {
                ProviderConfig::CaptionClassifier(CaptionClassifierSettings {
                    api_url: config.inference_api_url.clone(),
                    api_key,
                    caption_model: config.caption_model.clone(),
                    classifier_model: config.classifier_model.clone(),
                })
            })
        };
        let heuristic = ProviderConfig::Heuristic {
            seed: config.heuristic_seed,
        };

        match config.provider {
            ProviderChoice::Auto => Ok(chat().or_else(classifier).unwrap_or(heuristic)),
            ProviderChoice::Chat => chat().ok_or_else(|| {
                AnnotationError::Configuration(
                    "chat provider requested but OPENAI_API_KEY is not set".to_string(),
                )
            }),
            ProviderChoice::Classifier => classifier().ok_or_else(|| {
                AnnotationError::Configuration(
                    "classifier provider requested but HUGGINGFACE_API_KEY is not set"
                        .to_string(),
                )
            }),
            ProviderChoice::Heuristic => Ok(heuristic),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::ChatVision(_) => "chat-vision",
            ProviderConfig::CaptionClassifier(_) => "caption-classifier",
            ProviderConfig::Heuristic { .. } => "heuristic",
        }
    }
}
