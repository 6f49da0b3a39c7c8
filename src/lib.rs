//! Bark Classifier Server Library
//!
//! This library exposes the internal modules for the server binary, the
//! offline classification CLI and the end-to-end tests.

pub mod audio;
pub mod config;
pub mod features;
pub mod model;
pub mod prediction;
pub mod server;

// Re-export commonly used types for convenience
pub use model::{Label, ModelArtifacts};
pub use prediction::{PredictionError, PredictionService};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
