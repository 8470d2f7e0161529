//! pixtag clients - remote vision APIs used for annotation
//!
//! Clients are organized by service:
//! - inference: hosted captioning + classification models
//! - chat: OpenAI-compatible multimodal chat completions
//!
//! The `InferenceApi` and `ChatApi` traits are the seams annotation
//! providers are written against, so tests can swap in canned replies.

pub mod chat;
pub mod error;
pub mod inference;

use async_trait::async_trait;

pub use chat::ChatClient;
pub use error::ClientError;
pub use inference::{InferenceClient, Label};

/// Captioning and classification over raw image bytes
#[async_trait]
pub trait InferenceApi: Send + Sync {
    async fn caption(&self, image: &[u8]) -> Result<String, ClientError>;
    async fn classify(&self, image: &[u8]) -> Result<Vec<Label>, ClientError>;
}

/// A single multimodal prompt over raw image bytes
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn complete(&self, image: &[u8], prompt: &str) -> Result<String, ClientError>;
}
