//! The prediction pipeline: upload validation, storage, audio extraction,
//! feature extraction and classification.

mod file_handler;
mod service;

pub use file_handler::{sanitize_filename, FileHandler, FileHandlerError, EXTRACTED_AUDIO_PREFIX};
pub use service::{classify_audio, PredictionService};

use axum::body::Bytes;
use thiserror::Error;

use crate::audio::{AudioError, ExtractionError};
use crate::features::FeatureError;
use crate::model::ModelError;

/// One uploaded file, as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    /// Uploads must carry a file name and a `video/*` media type.
    pub fn validate(&self) -> Result<(), PredictionError> {
        let is_video = self
            .content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("video/"))
            .unwrap_or(false);
        if self.file_name.is_empty() || !is_video {
            return Err(PredictionError::NotVideo);
        }
        Ok(())
    }
}

/// Failures after the audio has been extracted.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Features(#[from] FeatureError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("No file part in the request")]
    MissingFile,

    #[error("Only video files are accepted")]
    NotVideo,

    #[error("Upload exceeds the maximum size of {0} bytes")]
    TooLarge(usize),

    #[error("Error storing upload: {0}")]
    Storage(#[from] FileHandlerError),

    #[error("Error extracting audio: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Error processing audio: {0}")]
    Processing(#[from] ProcessingError),
}

impl PredictionError {
    /// Whether the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictionError::MissingFile | PredictionError::NotVideo | PredictionError::TooLarge(_)
        )
    }

    /// Outcome label used in metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            PredictionError::MissingFile
            | PredictionError::NotVideo
            | PredictionError::TooLarge(_) => "client_error",
            PredictionError::Storage(_) => "storage_error",
            PredictionError::Extraction(_) => "extraction_error",
            PredictionError::Processing(_) => "processing_error",
        }
    }
}
