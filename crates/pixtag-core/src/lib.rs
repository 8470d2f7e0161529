//! pixtag core library
//!
//! Annotates uploaded images with tags, a one-line description and a
//! three-color palette, then records the outcome as image metadata.
//!
//! - `providers`: interchangeable annotation backends (remote and offline)
//! - `service`: the process-wide provider plus result normalization
//! - `pipeline`: background tasks that write one terminal record per image

pub mod annotation;
pub mod config;
pub mod error;
pub mod palette;
pub mod pipeline;
pub mod providers;
pub mod service;
pub mod store;

// Re-export key types for convenience
pub use annotation::{AnnotationRequest, AnnotationResult, AnnotationStatus, MetadataRecord};
pub use config::{Config, ProviderConfig};
pub use error::AnnotationError;
pub use pipeline::AnnotationPipeline;
pub use providers::AnnotationProvider;
pub use service::AnnotationService;
pub use store::{MemoryStore, MetadataStore};
