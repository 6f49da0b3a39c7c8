use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{FileHandler, PredictionError, ProcessingError, Upload};
use crate::audio::{load_waveform, AudioExtractor};
use crate::features::{extract_features, SAMPLE_RATE};
use crate::model::{Label, ModelArtifacts};
use crate::server::metrics;

/// Loads an extracted WAV file and classifies it.
///
/// CPU bound; call it from a blocking context.
pub fn classify_audio(path: &Path, models: &ModelArtifacts) -> Result<Label, ProcessingError> {
    let waveform = load_waveform(path, SAMPLE_RATE)?;
    debug!(
        "Loaded {:.2}s of audio from {:?}",
        waveform.duration_secs(),
        path
    );
    let features = extract_features(&waveform)?;
    Ok(models.predict(&features)?)
}

pub struct PredictionService {
    files: FileHandler,
    extractor: AudioExtractor,
    models: Arc<ModelArtifacts>,
    retain_uploads: bool,
}

impl PredictionService {
    pub fn new(
        files: FileHandler,
        extractor: AudioExtractor,
        models: Arc<ModelArtifacts>,
        retain_uploads: bool,
    ) -> Self {
        Self {
            files,
            extractor,
            models,
            retain_uploads,
        }
    }

    pub fn files(&self) -> &FileHandler {
        &self.files
    }

    pub fn models(&self) -> &Arc<ModelArtifacts> {
        &self.models
    }

    /// Classifies one uploaded video.
    pub async fn predict(&self, upload: Upload) -> Result<Label, PredictionError> {
        upload.validate()?;

        let upload_path = self
            .files
            .save_upload(&upload.file_name, &upload.data)
            .await?;
        info!(
            "Stored upload {:?} ({} bytes) at {:?}",
            upload.file_name,
            upload.data.len(),
            upload_path
        );

        let result = self.classify_upload(&upload_path).await;

        if !self.retain_uploads {
            if let Err(e) = self.files.discard_upload(&upload_path).await {
                warn!("Failed to remove upload {:?}: {}", upload_path, e);
            }
        }

        if let Ok(label) = &result {
            info!("Predicted {} for {:?}", label, upload.file_name);
        }
        result
    }

    async fn classify_upload(&self, upload_path: &Path) -> Result<Label, PredictionError> {
        // Removed when dropped, whichever way this function returns.
        let audio_path = self.files.scratch_audio_path()?;

        let started = Instant::now();
        self.extractor.extract(upload_path, &audio_path).await?;
        metrics::record_prediction_stage("extraction", started.elapsed());

        let models = Arc::clone(&self.models);
        let started = Instant::now();
        let label = tokio::task::spawn_blocking(move || classify_audio(&audio_path, &models))
            .await
            .map_err(ProcessingError::from)??;
        metrics::record_prediction_stage("processing", started.elapsed());

        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_VECTOR_LEN;
    use crate::model::{Classifier, ClassifierModel, FeatureSelector, LinearModel};
    use crate::prediction::EXTRACTED_AUDIO_PREFIX;
    use axum::body::Bytes;
    use std::time::Duration;
    use tempfile::TempDir;

    fn models(support_len: usize) -> ModelArtifacts {
        let classifier = Classifier::new(
            support_len,
            vec![Label::Text("no_bark".into()), Label::Text("bark".into())],
            ClassifierModel::Linear(LinearModel {
                coef: vec![vec![0.0; support_len]],
                intercept: vec![1.0],
            }),
        );
        ModelArtifacts::new(FeatureSelector::new(vec![true; support_len]), classifier).unwrap()
    }

    fn write_tone(path: &Path, sample_rate: u32, seconds: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (sample_rate as f32 * seconds) as usize;
        for i in 0..n {
            let t = i as f32 / sample_rate as f32;
            let v = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            writer.write_sample((v * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn service(dir: &Path, ffmpeg: &str, retain_uploads: bool) -> PredictionService {
        PredictionService::new(
            FileHandler::new(dir),
            AudioExtractor::new(ffmpeg, 44100, Duration::from_secs(30)),
            Arc::new(models(FEATURE_VECTOR_LEN)),
            retain_uploads,
        )
    }

    fn leftover_audio(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(EXTRACTED_AUDIO_PREFIX))
            .collect()
    }

    #[test]
    fn classifies_wav_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, 44100, 1.0);

        let label = classify_audio(&path, &models(FEATURE_VECTOR_LEN)).unwrap();
        assert_eq!(label, Label::Text("bark".into()));
    }

    #[test]
    fn selector_mismatch_is_a_processing_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, 22050, 0.5);

        let err = classify_audio(&path, &models(FEATURE_VECTOR_LEN + 3)).unwrap_err();
        assert!(matches!(err, ProcessingError::Model(_)));
    }

    #[test]
    fn empty_wav_is_a_processing_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        write_tone(&path, 22050, 0.0);

        let err = classify_audio(&path, &models(FEATURE_VECTOR_LEN)).unwrap_err();
        assert_eq!(err.to_string(), "Audio buffer is empty");
    }

    #[tokio::test]
    async fn rejects_non_video_without_storing() {
        let dir = TempDir::new().unwrap();
        let service = service(dir.path(), "ffmpeg", true);

        let err = service
            .predict(Upload {
                file_name: "notes.txt".into(),
                content_type: Some("text/plain".into()),
                data: Bytes::from_static(b"hello"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PredictionError::NotVideo));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn extraction_failure_cleans_up_scratch_audio() {
        let dir = TempDir::new().unwrap();
        let service = service(dir.path(), "/nonexistent/ffmpeg-binary", false);

        let err = service
            .predict(Upload {
                file_name: "clip.mp4".into(),
                content_type: Some("video/mp4".into()),
                data: Bytes::from_static(b"not really a video"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PredictionError::Extraction(_)));
        assert!(leftover_audio(dir.path()).is_empty());
        // Uploads are discarded when retention is off.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
