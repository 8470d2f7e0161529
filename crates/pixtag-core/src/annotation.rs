//! Annotation data model
//!
//! `AnnotationResult` is what providers return; `MetadataRecord` is the row
//! the pipeline hands to the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::palette;

/// Maximum number of tags kept on a normalized result
pub const MAX_TAGS: usize = 8;

/// Description returned by a provider that gave up after all attempts
pub const ANALYSIS_FAILED: &str = "Analysis failed";

// ============================================================================
// Types
// ============================================================================

/// Raw image bytes for one uploaded image
#[derive(Debug, Clone)]
pub struct AnnotationRequest {
    pub image_id: Uuid,
    pub image: Vec<u8>,
}

impl AnnotationRequest {
    pub fn new(image_id: Uuid, image: Vec<u8>) -> Self {
        Self { image_id, image }
    }
}

/// Tags, caption and palette produced for one image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationResult {
    pub tags: Vec<String>,
    pub description: String,
    pub colors: Vec<String>,
}

impl AnnotationResult {
    pub fn new(tags: Vec<String>, description: impl Into<String>, colors: Vec<String>) -> Self {
        Self {
            tags,
            description: description.into(),
            colors,
        }
    }

    /// The terminal result of a provider that exhausted its attempts
    pub fn analysis_failed() -> Self {
        Self::new(Vec::new(), ANALYSIS_FAILED, Vec::new())
    }

    pub fn is_analysis_failed(&self) -> bool {
        self.description == ANALYSIS_FAILED
    }

    /// Enforce the result invariants.
    ///
    /// Tags are trimmed, lowercased, deduplicated in insertion order and cut
    /// to [`MAX_TAGS`]. Colors become exactly three uppercase `#RRGGBB` values.
    pub fn normalized(self) -> Self {
        let mut tags: Vec<String> = Vec::with_capacity(MAX_TAGS);
        for tag in &self.tags {
            let tag = tag.trim().to_lowercase();
            if tag.is_empty() || tags.contains(&tag) {
                continue;
            }
            tags.push(tag);
            if tags.len() == MAX_TAGS {
                break;
            }
        }

        let description = self.description.trim().to_string();
        let colors = palette::normalize_colors(&self.colors, &description, &tags);

        Self {
            tags,
            description,
            colors,
        }
    }
}

/// Processing status of an image's metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    Pending,
    Done,
    Failed,
}

impl AnnotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationStatus::Pending => "pending",
            AnnotationStatus::Done => "done",
            AnnotationStatus::Failed => "failed",
        }
    }

    /// Done and failed never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnnotationStatus::Pending)
    }
}

impl FromStr for AnnotationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(AnnotationStatus::Pending),
            "done" => Ok(AnnotationStatus::Done),
            "failed" => Ok(AnnotationStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid annotation status: {}", s)),
        }
    }
}

impl std::fmt::Display for AnnotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted annotation metadata for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub image_id: Uuid,
    pub status: AnnotationStatus,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub colors: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl MetadataRecord {
    /// The record that exists as soon as the image row is created
    pub fn pending(image_id: Uuid) -> Self {
        Self {
            image_id,
            status: AnnotationStatus::Pending,
            description: None,
            tags: Vec::new(),
            colors: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// A completed annotation. An empty or failure-sentinel description is stored as `None`.
    pub fn done(image_id: Uuid, result: AnnotationResult) -> Self {
        let description = if result.description.is_empty() || result.is_analysis_failed() {
            None
        } else {
            Some(result.description)
        };

        Self {
            image_id,
            status: AnnotationStatus::Done,
            description,
            tags: result.tags,
            colors: result.colors,
            updated_at: Utc::now(),
        }
    }

    /// Annotation crashed before producing anything
    pub fn failed(image_id: Uuid) -> Self {
        Self {
            image_id,
            status: AnnotationStatus::Failed,
            description: None,
            tags: Vec::new(),
            colors: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}
