//! Background annotation pipeline
//!
//! Each upload is annotated in its own task so the upload path never waits.
//! The task writes exactly one terminal record: `done` with the normalized
//! result, or `failed` if annotation panicked.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::annotation::{AnnotationRequest, MetadataRecord};
use crate::error::AnnotationError;
use crate::service::AnnotationService;
use crate::store::MetadataStore;

#[derive(Clone)]
pub struct AnnotationPipeline {
    service: Arc<AnnotationService>,
    store: Arc<dyn MetadataStore>,
}

impl AnnotationPipeline {
    pub fn new(service: Arc<AnnotationService>, store: Arc<dyn MetadataStore>) -> Self {
        Self { service, store }
    }

    /// Queue annotation for an image and return immediately.
    ///
    /// The handle resolves to the record that was written.
    pub fn schedule(
        &self,
        request: AnnotationRequest,
    ) -> JoinHandle<Result<MetadataRecord, AnnotationError>> {
        let pipeline = self.clone();
        info!(
            "Scheduled annotation for image {} ({} bytes)",
            request.image_id,
            request.image.len()
        );
        tokio::spawn(async move { pipeline.run(request).await })
    }

    /// Annotate and persist one image
    pub async fn run(&self, request: AnnotationRequest) -> Result<MetadataRecord, AnnotationError> {
        let image_id = request.image_id;
        let service = self.service.clone();

        // Annotation runs in its own task so a panic surfaces as a JoinError
        let outcome = tokio::spawn(async move { service.annotate(&request.image).await }).await;

        let record = match outcome {
            Ok(result) => {
                info!(
                    "Annotated image {}: {} tags, \"{}\"",
                    image_id,
                    result.tags.len(),
                    result.description
                );
                MetadataRecord::done(image_id, result)
            }
            Err(e) => {
                error!("Annotation task for image {} crashed: {}", image_id, e);
                MetadataRecord::failed(image_id)
            }
        };

        self.persist(image_id, record).await
    }

    async fn persist(
        &self,
        image_id: Uuid,
        record: MetadataRecord,
    ) -> Result<MetadataRecord, AnnotationError> {
        match self.store.write_metadata(record.clone()).await {
            Ok(()) => Ok(record),
            Err(e) => {
                warn!("Failed to store metadata for image {}: {}", image_id, e);
                Err(AnnotationError::PipelineWrite {
                    image_id,
                    message: e.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for AnnotationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationPipeline")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationResult, AnnotationStatus};
    use crate::providers::{AnnotationProvider, HeuristicProvider};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct PanickingProvider;

    #[async_trait]
    impl AnnotationProvider for PanickingProvider {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn annotate(&self, _image: &[u8]) -> AnnotationResult {
            panic!("decoder blew up");
        }
    }

    /// Remembers every write and always fails
    #[derive(Default)]
    struct BrokenStore {
        attempts: Mutex<Vec<MetadataRecord>>,
    }

    #[async_trait]
    impl MetadataStore for BrokenStore {
        async fn write_metadata(&self, record: MetadataRecord) -> anyhow::Result<()> {
            self.attempts.lock().unwrap().push(record);
            anyhow::bail!("database is read-only")
        }
    }

    fn heuristic_service() -> Arc<AnnotationService> {
        Arc::new(AnnotationService::new(Arc::new(HeuristicProvider::with_seed(3))))
    }

    #[tokio::test]
    async fn test_scheduled_image_ends_done() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = AnnotationPipeline::new(heuristic_service(), store.clone());
        let id = Uuid::new_v4();
        store.insert_pending(id).unwrap();

        let written = pipeline
            .schedule(AnnotationRequest::new(id, b"tiny".to_vec()))
            .await
            .unwrap()
            .unwrap();

        let stored = store.get(id).unwrap().unwrap();
        assert_eq!(stored, written);
        assert_eq!(stored.status, AnnotationStatus::Done);
        assert_eq!(stored.colors.len(), 3);
        assert!(stored.tags.len() <= 8);
        assert!(stored.description.is_some());
    }

    #[tokio::test]
    async fn test_panicking_provider_writes_failed() {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(AnnotationService::new(Arc::new(PanickingProvider)));
        let pipeline = AnnotationPipeline::new(service, store.clone());
        let id = Uuid::new_v4();
        store.insert_pending(id).unwrap();

        let written = pipeline.run(AnnotationRequest::new(id, Vec::new())).await.unwrap();

        assert_eq!(written.status, AnnotationStatus::Failed);
        assert_eq!(written.description, None);
        assert!(written.tags.is_empty() && written.colors.is_empty());
        assert_eq!(store.get(id).unwrap().unwrap().status, AnnotationStatus::Failed);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let store = Arc::new(BrokenStore::default());
        let pipeline = AnnotationPipeline::new(heuristic_service(), store.clone());
        let id = Uuid::new_v4();

        let err = pipeline
            .run(AnnotationRequest::new(id, Vec::new()))
            .await
            .unwrap_err();

        match err {
            AnnotationError::PipelineWrite { image_id, message } => {
                assert_eq!(image_id, id);
                assert!(message.contains("read-only"));
            }
            other => panic!("expected pipeline write error, got {:?}", other),
        }
        // One terminal write attempt, no retry
        let attempts = store.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AnnotationStatus::Done);
    }

    #[tokio::test]
    async fn test_terminal_record_is_never_reverted() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = AnnotationPipeline::new(heuristic_service(), store.clone());
        let id = Uuid::new_v4();
        store.insert_pending(id).unwrap();

        let first = pipeline.run(AnnotationRequest::new(id, Vec::new())).await.unwrap();
        let second = pipeline.run(AnnotationRequest::new(id, Vec::new())).await;

        assert!(matches!(second, Err(AnnotationError::PipelineWrite { .. })));
        assert_eq!(store.get(id).unwrap().unwrap(), first);
    }

    #[tokio::test]
    async fn test_many_images_each_get_one_record() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = AnnotationPipeline::new(heuristic_service(), store.clone());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let id = Uuid::new_v4();
            store.insert_pending(id).unwrap();
            handles.push(pipeline.schedule(AnnotationRequest::new(id, vec![0u8; 256])));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = store.records().unwrap();
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|r| r.status == AnnotationStatus::Done));
    }
}
