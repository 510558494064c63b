use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Access question sent to the authorization service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionQuery {
    pub asset_id: String,
    /// Zero for anonymous callers.
    pub subject_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionAnswer {
    pub has_access: bool,
}

#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("permission service endpoint is invalid: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("permission service call failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("permission service answered with status {0}")]
    Rejected(u16),

    #[error("permission service did not answer in time")]
    Timeout,
}

/// Capability to ask whether a subject may read a protected asset.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn check_access(&self, query: &PermissionQuery) -> Result<PermissionAnswer, PermissionError>;
}

/// Permission checker speaking JSON over HTTP to the auth service.
#[derive(Debug, Clone)]
pub struct HttpPermissionChecker {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpPermissionChecker {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PermissionError> {
        let endpoint = Url::parse(endpoint)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PermissionChecker for HttpPermissionChecker {
    async fn check_access(&self, query: &PermissionQuery) -> Result<PermissionAnswer, PermissionError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PermissionError::Rejected(response.status().as_u16()));
        }

        Ok(response.json::<PermissionAnswer>().await?)
    }
}
