pub mod auth;
pub mod csrf;
pub mod instrumentation;
pub mod origin;
pub mod panic;
pub mod resource_access;
pub mod response;

pub use auth::{auth_middleware, AuthMode, AuthState, Identity};
pub use csrf::csrf_middleware;
pub use instrumentation::{
    instrumentation_middleware, normalize_path, MetricsSink, RecorderSink, RequestOutcome,
};
pub use origin::{origin_middleware, OriginDecision, OriginMode, OriginPolicy, OriginState};
pub use panic::panic_layer;
pub use resource_access::{resource_access_middleware, ResourceAccessState};
pub use response::{ApiResponse, ApiResult};
