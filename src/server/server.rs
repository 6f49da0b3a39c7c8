use anyhow::{Context, Result};
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::metrics::metrics_handler;
use super::predict::predict;
use super::{log_requests, state::*, ServerConfig};
use crate::model::Label;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub n_features_in: usize,
    pub classes: Vec<Label>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home() -> impl IntoResponse {
    Html("<h1>Backend is running</h1>")
}

async fn stats(
    State(state): State<ServerState>,
    State(models): State<GuardedModelArtifacts>,
) -> impl IntoResponse {
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        n_features_in: models.selector().n_features_in(),
        classes: models.classifier().classes().to_vec(),
    })
}

pub fn make_app(config: ServerConfig, prediction_service: GuardedPredictionService) -> Router {
    let state = ServerState::new(config.clone(), prediction_service);

    Router::new()
        .route("/", get(home))
        .route("/stats", get(stats))
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::max(config.max_upload_size_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server(config: ServerConfig, prediction_service: GuardedPredictionService) -> Result<()> {
    let app = make_app(config.clone(), prediction_service);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    let metrics_listener = TcpListener::bind((config.host.as_str(), config.metrics_port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.metrics_port))?;

    info!("Ready to serve at {}:{}!", config.host, config.port);
    info!("Metrics available at port {}!", config.metrics_port);

    tokio::try_join!(
        async {
            axum::serve(listener, app)
                .await
                .context("HTTP server failed")
        },
        async {
            axum::serve(metrics_listener, make_metrics_app())
                .await
                .context("Metrics server failed")
        },
    )?;
    Ok(())
}
