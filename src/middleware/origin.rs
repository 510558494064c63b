use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;

pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-CSRF-Token, X-Forwarded-Host";

const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginMode {
    /// Only allow-listed origins get through.
    Strict,
    /// Origins are not checked; `*` is always advertised.
    Permissive,
}

/// Process-wide origin allow-list, read-only after startup.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed_origins: Vec<String>,
    mode: OriginMode,
}

/// Outcome of the origin check for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    Allow(String),
    Reject,
}

impl OriginPolicy {
    pub fn new(allowed_origins: Vec<String>, mode: OriginMode) -> Self {
        Self { allowed_origins, mode }
    }

    pub fn mode(&self) -> OriginMode {
        self.mode
    }

    /// Resolve the `Access-Control-Allow-Origin` value for a request.
    pub fn decide(&self, headers: &HeaderMap) -> OriginDecision {
        if self.mode == OriginMode::Permissive || self.allows("*") {
            return OriginDecision::Allow("*".to_string());
        }

        [header::ORIGIN, X_FORWARDED_HOST]
            .iter()
            .filter_map(|name| headers.get(name).and_then(|v| v.to_str().ok()))
            .filter(|candidate| !candidate.is_empty())
            .find(|candidate| self.allows(candidate))
            .map(|origin| OriginDecision::Allow(origin.to_string()))
            .unwrap_or(OriginDecision::Reject)
    }

    fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

#[derive(Clone)]
pub struct OriginState {
    pub policy: Arc<OriginPolicy>,
    pub methods: Arc<[Method]>,
}

impl OriginState {
    fn allow_methods(&self) -> String {
        self.methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Method allow-list and cross-origin enforcement.
///
/// CORS metadata headers are attached to every response this stage produces
/// or forwards, rejections included.
pub async fn origin_middleware(
    State(state): State<OriginState>,
    request: Request,
    next: Next,
) -> Response {
    let mut cors = HeaderMap::new();
    if let Ok(methods) = HeaderValue::from_str(&state.allow_methods()) {
        cors.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
    }
    cors.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
    cors.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));

    if !state.methods.contains(request.method()) {
        return with_headers(ApiError::method_not_allowed().into_response(), cors);
    }

    match state.policy.decide(request.headers()) {
        OriginDecision::Allow(origin) => {
            if let Ok(value) = HeaderValue::from_str(&origin) {
                cors.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
        }
        OriginDecision::Reject => {
            tracing::debug!(path = %request.uri().path(), "Origin not in allow-list");
            return with_headers(ApiError::forbidden().into_response(), cors);
        }
    }

    // Preflight ends here
    if request.method() == Method::OPTIONS {
        return with_headers(StatusCode::OK.into_response(), cors);
    }

    with_headers(next.run(request).await, cors)
}

fn with_headers(mut response: Response, headers: HeaderMap) -> Response {
    response.headers_mut().extend(headers);
    response
}
