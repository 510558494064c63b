use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{read_cookie, CSRF_COOKIE, CSRF_HEADER};
use crate::error::ApiError;

/// Double-submit anti-forgery check: the `csrf_token` cookie must be echoed
/// verbatim in `X-CSRF-TOKEN`. Safe methods pass through.
pub async fn csrf_middleware(request: Request, next: Next) -> Response {
    if is_safe(request.method()) {
        return next.run(request).await;
    }

    let cookie = match read_cookie(request.headers(), CSRF_COOKIE) {
        Some(value) if !value.is_empty() => value,
        _ => return ApiError::forbidden_with("csrf token missing").into_response(),
    };

    let echoed = request.headers().get(CSRF_HEADER).map(|v| v.as_bytes());

    if echoed != Some(cookie.as_bytes()) {
        tracing::debug!(method = %request.method(), path = %request.uri().path(), "CSRF token mismatch");
        return ApiError::forbidden_with("csrf token mismatch").into_response();
    }

    next.run(request).await
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
