//! Ordered middleware composition.
//!
//! A route is a terminal [`Router`] plus an explicit list of [`Stage`]s. The
//! first stage listed is the outermost and sees the request first; any stage
//! may answer on its own and stop the chain.

use axum::{
    handler::Handler,
    http::Method,
    middleware::{from_fn, from_fn_with_state},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenAuthority;
use crate::middleware::{
    auth_middleware, csrf_middleware, instrumentation_middleware, origin_middleware, panic_layer,
    resource_access_middleware, AuthMode, AuthState, MetricsSink, OriginPolicy, OriginState,
    ResourceAccessState,
};
use crate::services::PermissionChecker;

/// Long-lived collaborators shared by every stage, built once at startup.
#[derive(Clone)]
pub struct PipelineServices {
    pub authority: Arc<TokenAuthority>,
    pub origin_policy: Arc<OriginPolicy>,
    pub metrics: Arc<dyn MetricsSink>,
    pub permissions: Arc<dyn PermissionChecker>,
    pub protected_prefix: Arc<str>,
    pub permission_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Timing, status and error counters plus the request log line.
    Instrument,
    /// Turn downstream panics into a 500 JSON response.
    RecoverPanics,
    /// Method allow-list and CORS policy for the route.
    Origin(Vec<Method>),
    /// Session cookie authentication.
    Auth(AuthMode),
    /// Double-submit anti-forgery check.
    Csrf,
    /// Permission-service gate for protected assets.
    ResourceAccess,
}

impl Stage {
    pub fn origin(methods: &[Method]) -> Self {
        Stage::Origin(methods.to_vec())
    }
}

#[derive(Clone)]
pub struct Pipeline {
    services: PipelineServices,
}

impl Pipeline {
    pub fn new(services: PipelineServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    /// Wrap `terminal` so that `stages` run in the order given.
    pub fn build(&self, terminal: Router, stages: &[Stage]) -> Router {
        // Router::layer makes the newest layer outermost, so apply innermost first.
        stages
            .iter()
            .rev()
            .fold(terminal, |router, stage| self.apply(router, stage))
    }

    /// Mount `handler` at `path` for every method and wrap it with `stages`.
    /// Method filtering is the job of [`Stage::Origin`].
    pub fn route<H, T>(&self, path: &str, handler: H, stages: &[Stage]) -> Router
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.build(Router::new().route(path, any(handler)), stages)
    }

    fn apply(&self, router: Router, stage: &Stage) -> Router {
        let services = &self.services;
        match stage {
            Stage::Instrument => router.layer(from_fn_with_state(
                services.metrics.clone(),
                instrumentation_middleware,
            )),
            Stage::RecoverPanics => router.layer(panic_layer()),
            Stage::Origin(methods) => router.layer(from_fn_with_state(
                OriginState {
                    policy: services.origin_policy.clone(),
                    methods: methods.as_slice().into(),
                },
                origin_middleware,
            )),
            Stage::Auth(mode) => router.layer(from_fn_with_state(
                AuthState {
                    authority: services.authority.clone(),
                    mode: *mode,
                },
                auth_middleware,
            )),
            Stage::Csrf => router.layer(from_fn(csrf_middleware)),
            Stage::ResourceAccess => router.layer(from_fn_with_state(
                ResourceAccessState {
                    checker: services.permissions.clone(),
                    protected_prefix: services.protected_prefix.clone(),
                    timeout: services.permission_timeout,
                },
                resource_access_middleware,
            )),
        }
    }
}
