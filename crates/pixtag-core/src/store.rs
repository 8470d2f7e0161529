//! Metadata store
//!
//! The pipeline only needs one operation from persistence: write the final
//! record for an image. `MemoryStore` is the in-process implementation used
//! by the CLI and tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::annotation::MetadataRecord;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Replace the stored record for `record.image_id`
    async fn write_metadata(&self, record: MetadataRecord) -> Result<()>;
}

/// Records keyed by image id
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, MetadataRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the pending row for a freshly uploaded image
    pub fn insert_pending(&self, image_id: Uuid) -> Result<MetadataRecord> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        if records.contains_key(&image_id) {
            anyhow::bail!("Image {} already has a metadata record", image_id);
        }

        let record = MetadataRecord::pending(image_id);
        records.insert(image_id, record.clone());
        Ok(record)
    }

    pub fn get(&self, image_id: Uuid) -> Result<Option<MetadataRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(records.get(&image_id).cloned())
    }

    /// All records, oldest update first
    pub fn records(&self) -> Result<Vec<MetadataRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let mut all: Vec<MetadataRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.updated_at);
        Ok(all)
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    /// Writes are only accepted over a pending record; terminal states are final.
    async fn write_metadata(&self, record: MetadataRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        match records.get(&record.image_id) {
            None => anyhow::bail!("No metadata record for image {}", record.image_id),
            Some(existing) if existing.status.is_terminal() => anyhow::bail!(
                "Image {} is already {}, refusing to overwrite with {}",
                record.image_id,
                existing.status,
                record.status
            ),
            Some(_) => {}
        }

        tracing::debug!("Stored {} metadata for image {}", record.status, record.image_id);
        records.insert(record.image_id, record);
        Ok(())
    }
}
