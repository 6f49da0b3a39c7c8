//! Request logging middleware
//!
//! Logs each request at the configured [`RequestsLoggingLevel`] and records
//! the HTTP metrics. Metrics are labelled by route template, never by the raw
//! path, so unknown URLs all share the `unmatched` series.

use super::super::ServerConfig;
use crate::server::metrics::record_http_request;
use axum::extract::{MatchedPath, State};
use axum::{
    body::Body,
    http::{
        header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE},
        Method, Request, Response, StatusCode,
    },
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    /// Adds a summary of the uploaded payload and the JSON response body.
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Metrics label for requests that matched no route.
pub(crate) const UNMATCHED_ROUTE: &str = "unmatched";

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

/// Route template the request was dispatched to, e.g. `/predict`.
pub(crate) fn route_label<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Standard methods keep their name, anything else is `OTHER`.
pub(crate) fn method_label(method: &Method) -> &str {
    match method.as_str() {
        name @ ("GET" | "POST" | "PUT" | "DELETE" | "HEAD" | "OPTIONS" | "PATCH") => name,
        _ => "OTHER",
    }
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE)?.to_str().ok()
}

/// Boundary parameter of a `multipart/form-data` content type.
pub(crate) fn multipart_boundary(content_type: &str) -> Option<&str> {
    let mut params = content_type.split(';');
    let media_type = params.next()?.trim();
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
}

/// One-line description of a request payload. Upload bytes are never read.
pub(crate) fn describe_payload(headers: &HeaderMap) -> String {
    let size = match content_length(headers) {
        Some(len) => format!("{:#}", byte_unit::Byte::from(len)),
        None => "size unknown".to_string(),
    };
    match content_type(headers) {
        Some(ct) => match multipart_boundary(ct) {
            Some(boundary) => format!("multipart upload, boundary {:?}, {}", boundary, size),
            None => format!("{}, {}", ct, size),
        },
        None => format!("no content type, {}", size),
    }
}

fn is_textual(headers: &HeaderMap) -> bool {
    content_type(headers)
        .map(|ct| {
            let ct = ct.trim().to_ascii_lowercase();
            ct.starts_with("application/json") || ct.starts_with("text/")
        })
        .unwrap_or(false)
}

fn internal_error() -> Response<Body> {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

pub async fn log_requests(
    State(config): State<ServerConfig>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let level = config.requests_logging_level;

    let start = Instant::now();

    let method = method_label(request.method()).to_string();
    let route = route_label(&request);

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", request.method(), request.uri().path());
    }

    if level >= RequestsLoggingLevel::Headers {
        info!("  Req Headers:");
        for (name, value) in request.headers().iter() {
            info!("    {:?}: {:?}", name, value);
        }
    }

    if level >= RequestsLoggingLevel::Body && request.method() == Method::POST {
        info!("  Req Payload: {}", describe_payload(request.headers()));
    }

    let mut response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        info!("  Resp Headers:");
        for (name, value) in response.headers().iter() {
            info!("    {:?}: {:?}", name, value);
        }
    }

    if level >= RequestsLoggingLevel::Body && is_textual(response.headers()) {
        match content_length(response.headers()) {
            Some(size) if size < MAX_LOGGABLE_BODY_LENGTH => {
                let (parts, body) = response.into_parts();
                let bytes = match axum::body::to_bytes(body, size).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        error!("Failed to read response body: {:?}", err);
                        return internal_error();
                    }
                };
                info!("  Resp Body: {}", String::from_utf8_lossy(&bytes));
                response = Response::from_parts(parts, Body::from(bytes))
            }
            Some(size) => info!(
                "  Resp Body: Too big to log ({:#})",
                byte_unit::Byte::from(size)
            ),
            None => info!("  Resp Body: length unknown"),
        }
    }

    let status = response.status().as_u16();
    let duration = start.elapsed();

    if level > RequestsLoggingLevel::None {
        info!("<<< {} {} ({}ms)", status, route, duration.as_millis());
    }

    record_http_request(&method, &route, status, duration);

    response
}
