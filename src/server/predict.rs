//! The `/predict` upload endpoint.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, warn};

use super::metrics;
use super::state::GuardedPredictionService;
use super::ServerConfig;
use crate::model::Label;
use crate::prediction::{PredictionError, Upload};

/// Multipart field carrying the video.
pub const UPLOAD_FIELD: &str = "videofile";

#[derive(Serialize)]
struct PredictionResponse {
    prediction: Label,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        let status = match &self {
            PredictionError::MissingFile | PredictionError::NotVideo => StatusCode::BAD_REQUEST,
            PredictionError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            PredictionError::Storage(_)
            | PredictionError::Extraction(_)
            | PredictionError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> PredictionError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return PredictionError::TooLarge(limit);
    }
    debug!("Unreadable multipart body: {}", err);
    PredictionError::MissingFile
}

/// Finds the first `videofile` part that carries a file name.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
    limit: usize,
) -> Result<Upload, PredictionError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!("Request is not multipart: {}", rejection);
        PredictionError::MissingFile
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(PredictionError::MissingFile),
            Err(err) => return Err(multipart_error(err, limit)),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|err| multipart_error(err, limit))?;

        return Ok(Upload {
            file_name,
            content_type,
            data,
        });
    }
}

pub(super) async fn predict(
    State(service): State<GuardedPredictionService>,
    State(config): State<ServerConfig>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let result = match read_upload(multipart, config.max_upload_size_bytes).await {
        Ok(upload) => service.predict(upload).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(label) => {
            metrics::record_prediction("success");
            metrics::record_predicted_label(&label.to_string());
            Json(PredictionResponse { prediction: label }).into_response()
        }
        Err(err) => {
            let outcome = err.outcome();
            metrics::record_prediction(outcome);
            if err.is_client_error() {
                debug!("Rejected prediction request: {}", err);
            } else {
                warn!("Prediction failed: {}", err);
                metrics::record_error(outcome, "/predict");
            }
            err.into_response()
        }
    }
}
