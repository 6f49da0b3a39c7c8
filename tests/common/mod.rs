//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, generate_video, VideoKind};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_predict() {
//!     let Some(video) = generate_video(VideoKind::Tone) else { return };
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.predict_video("clip.mp4", "video/mp4", video).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

#![allow(dead_code)]

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use fixtures::{ffmpeg_available, generate_video, VideoKind};
pub use server::{TestServer, TestServerOptions};
