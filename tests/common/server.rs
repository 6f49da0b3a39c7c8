//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own model artifacts and
//! uploads directory.

use super::constants::*;
use super::fixtures::write_model_artifacts;
use bark_classifier_server::audio::AudioExtractor;
use bark_classifier_server::features::FEATURE_VECTOR_LEN;
use bark_classifier_server::model::ModelArtifacts;
use bark_classifier_server::prediction::{FileHandler, PredictionService, EXTRACTED_AUDIO_PREFIX};
use bark_classifier_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Knobs for [`TestServer::spawn_with`].
#[derive(Debug, Clone)]
pub struct TestServerOptions {
    /// Input width the feature selector expects
    pub selector_width: usize,
    /// Keep uploads on disk after prediction
    pub retain_uploads: bool,
    pub max_upload_size_bytes: usize,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            selector_width: FEATURE_VECTOR_LEN,
            retain_uploads: true,
            max_upload_size_bytes: TEST_MAX_UPLOAD_SIZE_BYTES,
        }
    }
}

/// Test server instance with isolated model and uploads directory
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Directory uploads and extracted audio are written to
    pub uploads_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server with default options on a random port
    pub async fn spawn() -> Self {
        Self::spawn_with(TestServerOptions::default()).await
    }

    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if artifact creation, port binding or startup fails.
    pub async fn spawn_with(options: TestServerOptions) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let model_dir = temp_dir.path().join("model");
        let uploads_dir = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&model_dir).expect("Failed to create model dir");

        let (classifier_path, selector_path) =
            write_model_artifacts(&model_dir, options.selector_width)
                .expect("Failed to write model artifacts");
        let models = ModelArtifacts::load(&classifier_path, &selector_path)
            .expect("Failed to load model artifacts");

        let file_handler = FileHandler::new(&uploads_dir);
        file_handler
            .init()
            .await
            .expect("Failed to create uploads dir");

        let service = PredictionService::new(
            file_handler,
            AudioExtractor::new("ffmpeg", 44100, Duration::from_secs(30)),
            Arc::new(models),
            options.retain_uploads,
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            host: "127.0.0.1".to_string(),
            port,
            max_upload_size_bytes: options.max_upload_size_bytes,
            ..Default::default()
        };
        let app = make_app(config, Arc::new(service));

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            uploads_dir,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// File names currently in the uploads directory
    pub fn uploaded_files(&self) -> Vec<String> {
        list_dir(&self.uploads_dir)
    }

    /// Extracted audio files left in the uploads directory
    pub fn leftover_extracted_audio(&self) -> Vec<String> {
        self.uploaded_files()
            .into_iter()
            .filter(|name| name.starts_with(EXTRACTED_AUDIO_PREFIX))
            .collect()
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
