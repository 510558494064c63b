use axum::{
    response::{IntoResponse, Response},
    Extension,
};
use serde::Serialize;

use crate::auth::SessionCookies;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Identity};

#[derive(Debug, Serialize)]
pub struct WhoamiData {
    pub user_id: i64,
    pub email: String,
    pub expires_at: i64,
}

/// GET /api/v1/auth/whoami - identity behind the current session cookie
pub async fn whoami(Extension(identity): Extension<Identity>) -> ApiResult<WhoamiData> {
    let claims = identity.claims().ok_or_else(ApiError::unauthorized)?;

    Ok(ApiResponse::success(WhoamiData {
        user_id: claims.user_id,
        email: claims.email.clone(),
        expires_at: claims.exp,
    }))
}

/// POST /api/v1/auth/logout - expire both session cookies
pub async fn logout(identity: Identity, secure: bool) -> Response {
    if let Some(claims) = identity.claims() {
        tracing::info!(user_id = claims.user_id, token_id = %claims.jti, "Session closed");
    }

    let mut response = ApiResponse::message("logged out").into_response();
    SessionCookies::clear(secure).apply(response.headers_mut());
    response
}
