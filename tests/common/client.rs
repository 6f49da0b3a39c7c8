//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use bark_classifier_server::server::UPLOAD_FIELD;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Status Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// GET /stats
    pub async fn stats(&self) -> Response {
        self.client
            .get(format!("{}/stats", self.base_url))
            .send()
            .await
            .expect("Stats request failed")
    }

    // ========================================================================
    // Prediction Endpoint
    // ========================================================================

    /// POST /predict with a multipart form
    pub async fn predict_form(&self, form: Form) -> Response {
        self.client
            .post(format!("{}/predict", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("Predict request failed")
    }

    /// POST /predict uploading `data` as the video file part
    pub async fn predict_video(&self, file_name: &str, content_type: &str, data: Vec<u8>) -> Response {
        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .expect("Invalid content type");
        self.predict_form(Form::new().part(UPLOAD_FIELD, part)).await
    }

    /// POST /predict with a form that has no file part
    pub async fn predict_without_file(&self) -> Response {
        self.predict_form(Form::new().text("comment", "no video here"))
            .await
    }

    /// POST /predict with a raw, non-multipart body
    pub async fn predict_raw(&self, body: &'static str) -> Response {
        self.client
            .post(format!("{}/predict", self.base_url))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Predict request failed")
    }
}
