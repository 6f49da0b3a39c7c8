pub mod config;
mod http_layers;
pub mod metrics;
mod predict;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use predict::UPLOAD_FIELD;
pub use server::{make_app, run_server};
