//! Annotation providers
//!
//! Each provider turns raw image bytes into an [`AnnotationResult`] and
//! absorbs its own failures: remote errors become fixed fallback values, so
//! `annotate` has no error path.

pub mod chat_vision;
pub mod classifier;
pub mod heuristic;

use async_trait::async_trait;

use crate::annotation::AnnotationResult;

pub use chat_vision::ChatVisionProvider;
pub use classifier::CaptionClassifierProvider;
pub use heuristic::HeuristicProvider;

#[async_trait]
pub trait AnnotationProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    async fn annotate(&self, image: &[u8]) -> AnnotationResult;
}
