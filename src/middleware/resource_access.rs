use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

use super::auth::Identity;
use crate::error::ApiError;
use crate::services::{PermissionChecker, PermissionError, PermissionQuery};

#[derive(Clone)]
pub struct ResourceAccessState {
    pub checker: Arc<dyn PermissionChecker>,
    /// Path prefix of the protected asset tree, e.g. `/static/img/`.
    pub protected_prefix: Arc<str>,
    pub timeout: Duration,
}

/// Delegates access to protected static assets to the permission service.
///
/// Anything short of an explicit "has access" answer is a 403, including
/// transport errors and timeouts.
pub async fn resource_access_middleware(
    State(state): State<ResourceAccessState>,
    request: Request,
    next: Next,
) -> Response {
    // Decide on the path the file server will actually open, not the raw spelling.
    let Some(segments) = canonical_segments(request.uri().path()) else {
        tracing::debug!(path = %request.uri().path(), "Rejecting non-canonical asset path");
        return ApiError::forbidden().into_response();
    };

    let prefix: Vec<&str> = state.protected_prefix.split('/').filter(|s| !s.is_empty()).collect();
    let protected = segments.len() >= prefix.len()
        && segments.iter().zip(&prefix).all(|(segment, expected)| segment.as_str() == *expected);
    if !protected {
        return next.run(request).await;
    }

    let Some(asset_id) = segments.get(prefix.len()).cloned() else {
        return ApiError::forbidden().into_response();
    };

    let query = PermissionQuery {
        asset_id,
        subject_id: request
            .extensions()
            .get::<Identity>()
            .map(Identity::user_id)
            .unwrap_or(0),
    };

    // Dropping this future (client went away) drops the outbound call with it.
    let answer = tokio::time::timeout(state.timeout, state.checker.check_access(&query))
        .await
        .unwrap_or(Err(PermissionError::Timeout));

    match answer {
        Ok(answer) if answer.has_access => next.run(request).await,
        Ok(_) => {
            tracing::debug!(asset = %query.asset_id, subject = query.subject_id, "Asset access denied");
            ApiError::forbidden().into_response()
        }
        Err(e) => {
            tracing::warn!(asset = %query.asset_id, subject = query.subject_id, error = %e, "Permission check failed, denying");
            ApiError::forbidden().into_response()
        }
    }
}

/// Percent-decode `path` and resolve it into plain segments the way the static
/// file server does: empty and `.` segments vanish, anything that could leave
/// the tree (`..`, roots, drive prefixes) or is not UTF-8 yields `None`.
fn canonical_segments(path: &str) -> Option<Vec<String>> {
    let decoded = urlencoding::decode(path.trim_start_matches('/')).ok()?;

    let mut segments = Vec::new();
    for component in Path::new(&*decoded).components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_spellings_resolve_alike() {
        let expected = Some(vec!["static".to_string(), "img".to_string(), "cat.png".to_string()]);
        for path in [
            "/static/img/cat.png",
            "/static/%69mg/cat.png",
            "/static//img/cat.png",
            "/static/img%2Fcat.png",
            "/static/./img/cat.png",
            "/static/img/./cat.png",
        ] {
            assert_eq!(canonical_segments(path), expected, "{}", path);
        }
    }

    #[test]
    fn test_escaping_paths_rejected() {
        assert_eq!(canonical_segments("/static/../secret"), None);
        assert_eq!(canonical_segments("/static/%2e%2e/secret"), None);
        assert_eq!(canonical_segments("/static/%FF.png"), None);
    }
}
