use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub host: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub uploads_dir: Option<String>,
    pub retain_uploads: Option<bool>,
    pub max_upload_size_mb: Option<usize>,

    // Model artifacts
    pub classifier_path: Option<String>,
    pub selector_path: Option<String>,

    // Feature configs
    pub ffmpeg_path: Option<String>,
    pub extraction: Option<ExtractionConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Rate ffmpeg writes the extracted WAV at.
    pub sample_rate: Option<u32>,
    pub timeout_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
