//! Annotation service
//!
//! Holds the one provider chosen at startup and normalizes whatever it
//! returns, so callers always see at most eight clean tags and exactly three
//! `#RRGGBB` colors.

use std::sync::Arc;
use tracing::{debug, info};

use crate::annotation::AnnotationResult;
use crate::config::ProviderConfig;
use crate::error::AnnotationError;
use crate::providers::{
    AnnotationProvider, CaptionClassifierProvider, ChatVisionProvider, HeuristicProvider,
};

#[derive(Clone)]
pub struct AnnotationService {
    provider: Arc<dyn AnnotationProvider>,
}

impl AnnotationService {
    /// Construct the configured provider
    pub fn from_config(config: &ProviderConfig) -> Result<Self, AnnotationError> {
        let provider: Arc<dyn AnnotationProvider> = match config {
            ProviderConfig::ChatVision(settings) => Arc::new(ChatVisionProvider::new(settings)?),
            ProviderConfig::CaptionClassifier(settings) => {
                Arc::new(CaptionClassifierProvider::new(settings)?)
            }
            ProviderConfig::Heuristic { seed: Some(seed) } => {
                Arc::new(HeuristicProvider::with_seed(*seed))
            }
            ProviderConfig::Heuristic { seed: None } => Arc::new(HeuristicProvider::new()),
        };

        info!("Annotation provider selected: {}", provider.name());
        Ok(Self::new(provider))
    }

    pub fn new(provider: Arc<dyn AnnotationProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Annotate one image. Never fails; provider errors are already folded
    /// into fallback values.
    pub async fn annotate(&self, image: &[u8]) -> AnnotationResult {
        let raw = self.provider.annotate(image).await;
        let result = raw.normalized();
        debug!(
            "{} annotated {} bytes: {} tags, colors {:?}",
            self.provider.name(),
            image.len(),
            result.tags.len(),
            result.colors
        );
        result
    }
}

impl std::fmt::Debug for AnnotationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationService")
            .field("provider", &self.provider.name())
            .finish()
    }
}
