//! Authentication middleware for the REST API.
//!
//! Callers are authenticated upstream; the coordinator only checks a shared
//! bearer token when `COORD_API_TOKEN` is configured.

use crate::errors::CoordinatorError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone, Debug)]
pub struct AuthState {
    /// Expected bearer token. `None` disables the check.
    pub api_token: Option<SecretString>,
}

/// Reject requests without the configured bearer token.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// Returns 401 Unauthorized with a `WWW-Authenticate` header when the token
/// is missing or wrong.
#[instrument(skip_all, name = "coord.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, CoordinatorError> {
    let Some(expected) = state.api_token.as_ref() else {
        return Ok(next.run(req).await);
    };

    let token = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "coord.middleware.auth", "Missing Authorization header");
            CoordinatorError::Unauthorized("Missing Authorization header".to_string())
        })?
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            tracing::debug!(target: "coord.middleware.auth", "Invalid Authorization header format");
            CoordinatorError::Unauthorized("Invalid Authorization header format".to_string())
        })?;

    if !constant_time_eq(token.as_bytes(), expected.expose_secret().as_bytes()) {
        tracing::debug!(target: "coord.middleware.auth", "Bearer token rejected");
        return Err(CoordinatorError::Unauthorized(
            "Invalid token".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn app(token: Option<&str>) -> Router {
        let state = Arc::new(AuthState {
            api_token: token.map(|t| SecretString::from(t.to_string())),
        });
        Router::new()
            .route("/protected", get(|| async { "OK" }))
            .route_layer(middleware::from_fn_with_state(state, require_auth))
    }

    async fn status(app: Router, auth: Option<&str>) -> StatusCode {
        let mut builder = HttpRequest::builder().uri("/protected");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_open_when_no_token_configured() {
        assert_eq!(status(app(None), None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        assert_eq!(status(app(Some("s3cret")), None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_scheme_rejected() {
        assert_eq!(
            status(app(Some("s3cret")), Some("Basic s3cret")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_wrong_token_rejected() {
        assert_eq!(
            status(app(Some("s3cret")), Some("Bearer guess")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_valid_token_accepted() {
        assert_eq!(
            status(app(Some("s3cret")), Some("Bearer s3cret")).await,
            StatusCode::OK
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
