use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

/// Success envelope: `{"description": ..., "data": ...}`, matching the error
/// envelope so every body carries a `description`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub description: String,
    pub data: Option<T>,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            description: "OK".to_string(),
            data: Some(data),
            status_code: StatusCode::OK,
        }
    }
}

impl ApiResponse<()> {
    /// Description-only response
    pub fn message(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            data: None,
            status_code: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let mut envelope = json!({ "description": self.description });

        if let Some(data) = self.data {
            match serde_json::to_value(&data) {
                Ok(Value::Null) => {}
                Ok(value) => envelope["data"] = value,
                Err(e) => {
                    tracing::error!("Failed to serialize response data: {}", e);
                    return crate::error::ApiError::internal_server_error().into_response();
                }
            }
        }

        (self.status_code, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
