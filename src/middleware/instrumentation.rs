//! Per-request timing and status capture.
//!
//! Reports to a [`MetricsSink`] and to the structured log. The stage is purely
//! observational: it never changes the response it forwards.

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Largest body the description sniffer will buffer.
const SNIFF_LIMIT: u64 = 64 * 1024;

/// Counters and histogram updated by the instrumentation stage.
///
/// Implementations synchronize internally; the stage calls them from any
/// number of in-flight requests.
pub trait MetricsSink: Send + Sync {
    fn observe_duration(&self, method: &str, path: &str, elapsed: Duration);
    fn increment_hits(&self, method: &str, path: &str, status: u16);
    fn increment_errors(&self, method: &str, path: &str, description: &str);
}

/// Sink backed by the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecorderSink;

impl MetricsSink for RecorderSink {
    fn observe_duration(&self, method: &str, path: &str, elapsed: Duration) {
        metrics::histogram!(
            "http_method_duration_seconds",
            "method" => method.to_owned(),
            "path" => path.to_owned()
        )
        .record(elapsed.as_secs_f64());
    }

    fn increment_hits(&self, method: &str, path: &str, status: u16) {
        metrics::counter!(
            "http_method_hits_total",
            "method" => method.to_owned(),
            "path" => path.to_owned(),
            "status_code" => status.to_string()
        )
        .increment(1);
    }

    fn increment_errors(&self, method: &str, path: &str, description: &str) {
        metrics::counter!(
            "http_method_errors_total",
            "method" => method.to_owned(),
            "path" => path.to_owned(),
            "description" => description.to_owned()
        )
        .increment(1);
    }
}

/// What one request looked like once the chain below finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub description: String,
    pub elapsed: Duration,
}

impl RequestOutcome {
    fn report(&self, sink: &dyn MetricsSink) {
        sink.observe_duration(&self.method, &self.path, self.elapsed);
        sink.increment_hits(&self.method, &self.path, self.status);
        if self.status / 100 != 2 {
            sink.increment_errors(&self.method, &self.path, &self.description);
        }
    }
}

pub async fn instrumentation_middleware(
    State(sink): State<Arc<dyn MetricsSink>>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().to_string();
    let raw_path = request.uri().path().to_string();
    let span = tracing::info_span!("request", %request_id);

    async move {
        let start = Instant::now();
        let response = next.run(request).await;
        let (response, description) = sniff_description(response).await;

        let outcome = RequestOutcome {
            method,
            path: normalize_path(&raw_path),
            status: response.status().as_u16(),
            description,
            elapsed: start.elapsed(),
        };
        outcome.report(sink.as_ref());

        tracing::info!(
            method = %outcome.method,
            path = %raw_path,
            route = %outcome.path,
            status = outcome.status,
            description = %outcome.description,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "HTTP request"
        );

        response
    }
    .instrument(span)
    .await
}

#[derive(Deserialize)]
struct Envelope {
    description: String,
}

/// Best-effort read of `{"description": ...}` from a small JSON body.
///
/// Streaming or oversized bodies are left untouched and yield an empty
/// description.
async fn sniff_description(response: Response) -> (Response, String) {
    let sniffable = is_json(response.headers())
        && matches!(response.body().size_hint().exact(), Some(len) if len > 0 && len <= SNIFF_LIMIT);
    if !sniffable {
        return (response, String::new());
    }

    let (parts, body) = response.into_parts();
    match axum::body::to_bytes(body, SNIFF_LIMIT as usize).await {
        Ok(bytes) => {
            let description = serde_json::from_slice::<Envelope>(&bytes)
                .map(|e| e.description)
                .unwrap_or_default();
            (Response::from_parts(parts, Body::from(bytes)), description)
        }
        Err(e) => {
            tracing::warn!("Failed to buffer response body for instrumentation: {}", e);
            (Response::from_parts(parts, Body::empty()), String::new())
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

/// Collapse identifiers in a path so metric labels stay low-cardinality.
///
/// Numeric segments become `:id`; the profile segment of
/// `/api/v1/users/{name}` becomes `:username`.
pub fn normalize_path(path: &str) -> String {
    const USERS: &str = "/api/v1/users/";

    if let Some(rest) = path.strip_prefix(USERS) {
        let mut segments = rest.splitn(2, '/');
        let name = segments.next().unwrap_or_default();
        if !name.is_empty() {
            return match segments.next() {
                Some(tail) if tail.starts_with("boards") => format!("{}:username/{}", USERS, tail),
                Some(_) => collapse_numeric(path),
                None => format!("{}:username", USERS),
            };
        }
    }

    collapse_numeric(path)
}

fn collapse_numeric(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
