use axum::extract::FromRef;

use crate::model::ModelArtifacts;
use crate::prediction::PredictionService;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedPredictionService = Arc<PredictionService>;
pub type GuardedModelArtifacts = Arc<ModelArtifacts>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub prediction_service: GuardedPredictionService,
    pub hash: String,
}

impl ServerState {
    pub fn new(config: ServerConfig, prediction_service: GuardedPredictionService) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            prediction_service,
            hash: env!("GIT_HASH").to_string(),
        }
    }
}

impl FromRef<ServerState> for GuardedPredictionService {
    fn from_ref(input: &ServerState) -> Self {
        input.prediction_service.clone()
    }
}

impl FromRef<ServerState> for GuardedModelArtifacts {
    fn from_ref(input: &ServerState) -> Self {
        input.prediction_service.models().clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
