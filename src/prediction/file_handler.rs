//! File handling for prediction uploads.

use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Errors that can occur during file handling.
#[derive(Debug, Error)]
pub enum FileHandlerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
}

/// Prefix of the transient WAV files written by audio extraction.
pub const EXTRACTED_AUDIO_PREFIX: &str = "extracted_audio_";

/// File handler for the uploads directory.
#[derive(Debug, Clone)]
pub struct FileHandler {
    uploads_dir: PathBuf,
}

impl FileHandler {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Initialize the file handler (creates the uploads directory).
    pub async fn init(&self) -> Result<(), FileHandlerError> {
        fs::create_dir_all(&self.uploads_dir).await?;
        Ok(())
    }

    /// Save uploaded bytes under a unique name derived from the client's
    /// file name.
    pub async fn save_upload(
        &self,
        filename: &str,
        data: &[u8],
    ) -> Result<PathBuf, FileHandlerError> {
        let id = Uuid::new_v4();
        let stored_name = match sanitize_filename(filename) {
            Ok(safe) => format!("{}_{}", id, safe),
            Err(_) => id.to_string(),
        };

        let file_path = self.uploads_dir.join(stored_name);
        let mut file = fs::File::create(&file_path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(file_path)
    }

    /// Reserve a unique path for extracted audio. The file is deleted when
    /// the returned guard is dropped.
    pub fn scratch_audio_path(&self) -> Result<TempPath, FileHandlerError> {
        let file = tempfile::Builder::new()
            .prefix(EXTRACTED_AUDIO_PREFIX)
            .suffix(".wav")
            .tempfile_in(&self.uploads_dir)?;
        Ok(file.into_temp_path())
    }

    /// Remove a stored upload. A file that is already gone is not an error.
    pub async fn discard_upload(&self, path: &Path) -> Result<(), FileHandlerError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Sanitize a filename to prevent path traversal attacks.
pub fn sanitize_filename(filename: &str) -> Result<String, FileHandlerError> {
    // Get just the filename part (no path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FileHandlerError::InvalidFilename(filename.to_string()))?;

    // Null bytes and hidden files are never allowed
    if name.contains('\0') || name.starts_with('.') {
        return Err(FileHandlerError::InvalidFilename(filename.to_string()));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            _ => c,
        })
        .collect();

    if sanitized.is_empty() {
        return Err(FileHandlerError::InvalidFilename(filename.to_string()));
    }

    Ok(sanitized)
}
