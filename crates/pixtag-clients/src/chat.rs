//! OpenAI-compatible chat completions client for vision prompts
//!
//! Sends one user turn holding the instruction text and the image as a
//! base64 data URL, and returns the raw text of the first choice.

use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::ChatApi;

pub const DEFAULT_CHAT_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TOKENS: u32 = 300;

#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Arc<String>,
    model: String,
}

impl ChatClient {
    pub fn new(api_url: &str, api_key: String, model: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("pixtag/0.1.0")
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: Arc::new(api_key),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model about an image and return the reply text untouched
    pub async fn complete(&self, image: &[u8], prompt: &str) -> Result<String, ClientError> {
        let request_body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        { "type": "image_url", "image_url": { "url": data_url(image) } }
                    ]
                }
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": 0,
        });

        debug!("Chat API request to {}/chat/completions", self.api_url);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Chat API error {}: {}", status, body);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let json: serde_json::Value = serde_json::from_str(&body)?;
        extract_content(&json)
    }
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn complete(&self, image: &[u8], prompt: &str) -> Result<String, ClientError> {
        ChatClient::complete(self, image, prompt).await
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Pull `choices[0].message.content` out of a completion response
pub fn extract_content(json: &serde_json::Value) -> Result<String, ClientError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ClientError::Malformed("completion has no message content".to_string()))
}

/// Sniff the media type from the leading bytes
pub fn media_type(image: &[u8]) -> Option<&'static str> {
    image::guess_format(image)
        .ok()
        .map(|format| format.to_mime_type())
}

/// Build a `data:` URL, sniffing the media type from the bytes (JPEG when unknown)
pub fn data_url(image: &[u8]) -> String {
    let mime = media_type(image).unwrap_or("image/jpeg");
    let encoded = base64::engine::general_purpose::STANDARD.encode(image);
    format!("data:{};base64,{}", mime, encoded)
}

/// Check if a MIME type is an image type we can send to the model
pub fn is_supported_image(content_type: &str) -> bool {
    matches!(
        content_type,
        "image/jpeg" | "image/png" | "image/webp" | "image/gif"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn test_data_url_sniffs_png() {
        let url = data_url(PNG_SIGNATURE);
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_data_url_defaults_to_jpeg() {
        let url = data_url(b"definitely not an image");
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type(PNG_SIGNATURE), Some("image/png"));
        assert_eq!(media_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(media_type(b"plain text"), None);
    }

    #[test]
    fn test_extract_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"tags\": []}" } }]
        });
        assert_eq!(extract_content(&json).unwrap(), "{\"tags\": []}");

        let empty = serde_json::json!({ "choices": [] });
        assert!(extract_content(&empty).unwrap_err().is_malformed());
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_malformed() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { "<html>gateway says hi</html>" }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client =
            ChatClient::new(&format!("http://{}", addr), "key".to_string(), "vision").unwrap();
        let err = client.complete(PNG_SIGNATURE, "describe").await.unwrap_err();
        assert!(err.is_malformed(), "{:?}", err);
    }

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image("image/png"));
        assert!(is_supported_image("image/webp"));
        assert!(!is_supported_image("image/tiff"));
        assert!(!is_supported_image("application/pdf"));
    }

    #[tokio::test]
    async fn test_complete_sends_prompt_and_image() {
        let router = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                let content = &body["messages"][0]["content"];
                let echoed = format!(
                    "{}|{}",
                    content[0]["text"].as_str().unwrap_or_default(),
                    content[1]["image_url"]["url"]
                        .as_str()
                        .unwrap_or_default()
                        .starts_with("data:image/")
                );
                Json(serde_json::json!({
                    "choices": [{ "message": { "content": echoed } }]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client =
            ChatClient::new(&format!("http://{}/", addr), "key".to_string(), "vision").unwrap();
        let reply = client.complete(PNG_SIGNATURE, "describe").await.unwrap();
        assert_eq!(reply, "describe|true");
    }
}
