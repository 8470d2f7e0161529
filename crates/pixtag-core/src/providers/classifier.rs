//! Caption + classifier provider
//!
//! Two independent calls against hosted models: one for a caption, one for
//! a ranked label list. Each call has its own fallback, so a failed caption
//! still leaves real tags and vice versa.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use pixtag_clients::{InferenceApi, InferenceClient, Label};

use crate::annotation::{AnnotationResult, MAX_TAGS};
use crate::config::CaptionClassifierSettings;
use crate::error::AnnotationError;
use crate::palette::resolve_palette;
use crate::providers::AnnotationProvider;

pub const FALLBACK_CAPTION: &str = "An interesting image";
pub const FALLBACK_TAGS: [&str; 4] = ["image", "photo", "digital", "visual"];
pub const SUPPLEMENTAL_TAGS: [&str; 6] = ["image", "photo", "digital", "visual", "picture", "photography"];
/// Below this many label tags the supplemental pool is mixed in
pub const MIN_TAGS: usize = 5;

pub struct CaptionClassifierProvider {
    api: Arc<dyn InferenceApi>,
}

impl CaptionClassifierProvider {
    /// Build the provider against the hosted inference API.
    ///
    /// Fails up front when the credential is blank, before any request is made.
    pub fn new(settings: &CaptionClassifierSettings) -> Result<Self, AnnotationError> {
        if settings.api_key.trim().is_empty() {
            return Err(AnnotationError::Configuration(
                "inference API key is not configured".to_string(),
            ));
        }

        let client = InferenceClient::new(settings.api_key.clone())?
            .with_base_url(settings.api_url.as_str())
            .with_models(
                settings.caption_model.as_str(),
                settings.classifier_model.as_str(),
            );

        info!(
            "Caption/classifier provider ready ({} + {})",
            settings.caption_model, settings.classifier_model
        );

        Ok(Self::with_api(Arc::new(client)))
    }

    pub fn with_api(api: Arc<dyn InferenceApi>) -> Self {
        Self { api }
    }

    async fn caption(&self, image: &[u8]) -> String {
        match self.api.caption(image).await {
            Ok(caption) if !caption.trim().is_empty() => caption.trim().to_string(),
            Ok(_) => {
                warn!("Captioning returned an empty caption, using fallback");
                FALLBACK_CAPTION.to_string()
            }
            Err(e) => {
                warn!("Captioning failed: {}", AnnotationError::from(e));
                FALLBACK_CAPTION.to_string()
            }
        }
    }

    async fn tags(&self, image: &[u8]) -> Vec<String> {
        match self.api.classify(image).await {
            Ok(labels) => tags_from_labels(&labels),
            Err(e) => {
                warn!("Classification failed: {}", AnnotationError::from(e));
                FALLBACK_TAGS.iter().map(|t| t.to_string()).collect()
            }
        }
    }
}

#[async_trait]
impl AnnotationProvider for CaptionClassifierProvider {
    fn name(&self) -> &str {
        "caption-classifier"
    }

    async fn annotate(&self, image: &[u8]) -> AnnotationResult {
        let (caption, tags) = tokio::join!(self.caption(image), self.tags(image));
        let colors = resolve_palette(&caption, &tags);

        info!("Caption/classifier annotation: {} tags", tags.len());
        AnnotationResult::new(tags, caption, colors)
    }
}

/// Turn a ranked label list into tags.
///
/// Only the top [`MAX_TAGS`] labels are read. Each keeps the text before its
/// first comma, trimmed and lowercased. A short list is topped up from
/// [`SUPPLEMENTAL_TAGS`].
pub fn tags_from_labels(labels: &[Label]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for item in labels.iter().take(MAX_TAGS) {
        let clean = item
            .label
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if !clean.is_empty() && !tags.contains(&clean) {
            tags.push(clean);
        }
    }

    if tags.len() < MIN_TAGS {
        for extra in SUPPLEMENTAL_TAGS {
            if tags.len() >= MAX_TAGS {
                break;
            }
            if !tags.iter().any(|t| t == extra) {
                tags.push(extra.to_string());
            }
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixtag_clients::ClientError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeInference {
        caption: Result<String, String>,
        labels: Result<Vec<Label>, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceApi for FakeInference {
        async fn caption(&self, _image: &[u8]) -> Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.caption.clone().map_err(|message| ClientError::Api {
                status: 503,
                message,
            })
        }

        async fn classify(&self, _image: &[u8]) -> Result<Vec<Label>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.labels.clone().map_err(ClientError::Malformed)
        }
    }

    fn labels(values: &[&str]) -> Vec<Label> {
        values
            .iter()
            .map(|l| Label {
                label: l.to_string(),
                score: 0.5,
            })
            .collect()
    }

    fn provider(caption: Result<&str, &str>, labels: Result<Vec<Label>, &str>) -> CaptionClassifierProvider {
        CaptionClassifierProvider::with_api(Arc::new(FakeInference {
            caption: caption.map(str::to_string).map_err(str::to_string),
            labels: labels.map_err(str::to_string),
            calls: AtomicUsize::new(0),
        }))
    }

    #[test]
    fn test_label_text_after_comma_is_dropped() {
        let tags = tags_from_labels(&labels(&[
            "golden retriever, dog",
            "Labrador retriever",
            "tennis ball",
            "collie, sheepdog",
            "kuvasz",
        ]));
        assert_eq!(tags[0], "golden retriever");
        assert_eq!(tags[1], "labrador retriever");
        assert_eq!(tags[3], "collie");
        assert_eq!(tags.len(), 5);
    }

    #[test]
    fn test_only_first_eight_labels_are_read() {
        let names: Vec<String> = (0..12).map(|i| format!("label{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let tags = tags_from_labels(&labels(&refs));
        assert_eq!(tags.len(), 8);
        assert_eq!(tags[7], "label7");
    }

    #[test]
    fn test_short_label_list_is_supplemented() {
        let tags = tags_from_labels(&labels(&["Photo", "seashore, coast"]));
        assert_eq!(
            tags,
            vec!["photo", "seashore", "image", "digital", "visual", "picture", "photography"]
        );
    }

    #[test]
    fn test_supplement_stops_at_eight() {
        let tags = tags_from_labels(&labels(&["a", "b", "c", "d"]));
        assert_eq!(tags, vec!["a", "b", "c", "d", "image", "photo", "digital", "visual"]);
    }

    #[test]
    fn test_duplicates_and_empty_labels_skipped() {
        let tags = tags_from_labels(&labels(&["cat", "Cat, tabby", ", nothing", "dog", "fox", "owl", "emu"]));
        assert_eq!(tags, vec!["cat", "dog", "fox", "owl", "emu"]);
    }

    #[test]
    fn test_unreadable_label_entry_does_not_drop_the_rest() {
        let body = r#"[{"label": "tabby, cat"}, {"score": 0.1}, {"label": "lynx", "score": null}]"#;
        let parsed = pixtag_clients::inference::parse_labels(body).unwrap();
        let tags = tags_from_labels(&parsed);
        assert_eq!(
            tags,
            vec!["tabby", "lynx", "image", "photo", "digital", "visual", "picture", "photography"]
        );
    }

    #[tokio::test]
    async fn test_full_success() {
        let provider = provider(
            Ok("a dog playing on the beach"),
            Ok(labels(&["golden retriever, dog", "seashore", "sandbar", "tennis ball", "leash"])),
        );
        let result = provider.annotate(b"image").await;

        assert_eq!(result.description, "a dog playing on the beach");
        assert_eq!(result.tags[0], "golden retriever");
        // "beach" is the first palette keyword in the caption
        assert_eq!(result.colors, vec!["#00BFFF", "#FFD700", "#F0E68C"]);
    }

    #[tokio::test]
    async fn test_caption_failure_keeps_labels() {
        let provider = provider(Err("model loading"), Ok(labels(&["tabby, cat", "animal"])));
        let result = provider.annotate(b"image").await;

        assert_eq!(result.description, FALLBACK_CAPTION);
        assert_eq!(result.tags[..2], ["tabby".to_string(), "animal".to_string()]);
        // palette comes from the "animal" tag
        assert_eq!(result.colors, vec!["#8B4513", "#A0522D", "#CD853F"]);
    }

    #[tokio::test]
    async fn test_label_failure_keeps_caption() {
        let provider = provider(Ok("a city street at night"), Err("not a list"));
        let result = provider.annotate(b"image").await;

        assert_eq!(result.description, "a city street at night");
        assert_eq!(result.tags, vec!["image", "photo", "digital", "visual"]);
        assert_eq!(result.colors, vec!["#696969", "#808080", "#A9A9A9"]);
    }

    #[tokio::test]
    async fn test_both_calls_fail() {
        let provider = provider(Err("down"), Err("down"));
        let result = provider.annotate(b"image").await;

        assert_eq!(result.description, FALLBACK_CAPTION);
        assert_eq!(result.tags, vec!["image", "photo", "digital", "visual"]);
        assert_eq!(result.colors, vec!["#4A6572", "#344955", "#F9AA33"]);
    }

    #[tokio::test]
    async fn test_same_remote_reply_gives_same_result() {
        let provider = provider(Ok("a red bicycle"), Ok(labels(&["mountain bike, all-terrain bike"])));
        let first = provider.annotate(b"image").await;
        let second = provider.annotate(b"image").await;
        assert_eq!(first, second);
    }

    #[test]
    fn test_blank_credential_rejected_at_construction() {
        let settings = CaptionClassifierSettings {
            api_url: "http://localhost".to_string(),
            api_key: "  ".to_string(),
            caption_model: "c".to_string(),
            classifier_model: "l".to_string(),
        };
        assert!(matches!(
            CaptionClassifierProvider::new(&settings),
            Err(AnnotationError::Configuration(_))
        ));
    }
}
