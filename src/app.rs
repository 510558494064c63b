use axum::{http::Method, Extension, Router};
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::auth::{TokenAuthority, TokenError};
use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::{AuthMode, Identity, MetricsSink, OriginPolicy};
use crate::pipeline::{Pipeline, PipelineServices, Stage};
use crate::services::PermissionChecker;

/// Build the shared stage collaborators from configuration.
pub fn services(
    config: &AppConfig,
    metrics: Arc<dyn MetricsSink>,
    permissions: Arc<dyn PermissionChecker>,
) -> Result<PipelineServices, TokenError> {
    let authority = TokenAuthority::new(
        config.security.jwt_secret.as_bytes(),
        config.security.token_ttl(),
    )?;

    Ok(PipelineServices {
        authority: Arc::new(authority),
        origin_policy: Arc::new(OriginPolicy::new(
            config.security.allowed_origins.clone(),
            config.environment.origin_mode(),
        )),
        metrics,
        permissions,
        protected_prefix: config.static_files.protected_prefix.as_str().into(),
        permission_timeout: config.auth_service.timeout(),
    })
}

/// Full route table.
pub fn router(pipeline: &Pipeline, config: &AppConfig) -> Router {
    let secure = config.security.cookie_secure;
    let get = [Method::GET, Method::OPTIONS];
    let get_head = [Method::GET, Method::HEAD, Method::OPTIONS];
    let post = [Method::POST, Method::OPTIONS];

    let health = pipeline.route(
        "/health",
        handlers::health,
        &[Stage::Instrument, Stage::RecoverPanics, Stage::origin(&get)],
    );

    let whoami = pipeline.route(
        "/api/v1/auth/whoami",
        handlers::whoami,
        &[
            Stage::Instrument,
            Stage::RecoverPanics,
            Stage::origin(&get),
            Stage::Auth(AuthMode::Hard),
        ],
    );

    let logout = pipeline.route(
        "/api/v1/auth/logout",
        move |Extension(identity): Extension<Identity>| handlers::logout(identity, secure),
        &[
            Stage::Instrument,
            Stage::RecoverPanics,
            Stage::origin(&post),
            Stage::Auth(AuthMode::Hard),
            Stage::Csrf,
        ],
    );

    let assets = pipeline.build(
        Router::new().nest_service(
            &config.static_files.url_prefix,
            ServeDir::new(&config.static_files.base_dir),
        ),
        &[
            Stage::Instrument,
            Stage::RecoverPanics,
            Stage::origin(&get_head),
            Stage::Auth(AuthMode::Soft),
            Stage::ResourceAccess,
        ],
    );

    Router::new()
        .merge(health)
        .merge(whoami)
        .merge(logout)
        .merge(assets)
}
