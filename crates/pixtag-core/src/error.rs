//! Annotation error taxonomy

use pixtag_clients::ClientError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    /// No usable credential for the requested provider
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Network failure, timeout, or non-success status from a remote call
    #[error("Transport error: {0}")]
    Transport(String),
    /// The remote call succeeded but its payload was unusable
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// The terminal metadata record could not be persisted
    #[error("Failed to write metadata for image {image_id}: {message}")]
    PipelineWrite { image_id: Uuid, message: String },
}

impl From<ClientError> for AnnotationError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Malformed(message) => AnnotationError::MalformedResponse(message),
            other => AnnotationError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AnnotationError {
    fn from(e: serde_json::Error) -> Self {
        AnnotationError::MalformedResponse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_taxonomy() {
        let api = ClientError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(matches!(
            AnnotationError::from(api),
            AnnotationError::Transport(msg) if msg.contains("500")
        ));

        let malformed = ClientError::Malformed("no content".to_string());
        assert!(matches!(
            AnnotationError::from(malformed),
            AnnotationError::MalformedResponse(msg) if msg == "no content"
        ));
    }
}
