use crate::middleware::ApiResponse;

/// GET /health - liveness probe
pub async fn health() -> ApiResponse<()> {
    ApiResponse::message("OK")
}
