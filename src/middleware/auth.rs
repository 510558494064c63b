use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::auth::{read_cookie, Claims, TokenAuthority, AUTH_COOKIE};
use crate::error::ApiError;

/// Caller identity attached to the request by an authentication stage.
///
/// Downstream code sees either fully validated claims or an explicit
/// anonymous marker, never a half-checked token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    Authenticated(Claims),
    Anonymous,
}

impl Identity {
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Identity::Authenticated(claims) => Some(claims),
            Identity::Anonymous => None,
        }
    }

    /// Subject id used for downstream checks; zero for anonymous callers.
    pub fn user_id(&self) -> i64 {
        self.claims().map(|c| c.user_id).unwrap_or(0)
    }
}

/// Route policy for a missing or invalid session token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    /// Reject with 401.
    Hard,
    /// Continue as anonymous.
    Soft,
}

#[derive(Clone)]
pub struct AuthState {
    pub authority: Arc<TokenAuthority>,
    pub mode: AuthMode,
}

/// Session-cookie authentication stage.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match read_cookie(request.headers(), AUTH_COOKIE) {
        None => None,
        Some(token) => match state.authority.validate(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(reason = %e, mode = ?state.mode, "Session token rejected");
                None
            }
        },
    };

    let identity = match (identity, state.mode) {
        (Some(claims), _) => Identity::Authenticated(claims),
        (None, AuthMode::Soft) => Identity::Anonymous,
        (None, AuthMode::Hard) => return ApiError::unauthorized().into_response(),
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}
