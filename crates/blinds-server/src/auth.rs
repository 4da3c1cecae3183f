use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Controls HTTP Basic authentication.
///
/// When no credentials are set the middleware is a transparent no-op and all
/// requests pass through.
#[derive(Debug, Clone, Default)]
pub struct BasicAuth {
    pub credentials: Option<(String, String)>,
}

impl BasicAuth {
    pub fn none() -> Self {
        Self { credentials: None }
    }

    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Some((username.into(), password.into())),
        }
    }

    /// Credentials are only enforced when both halves are present.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Self {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() => Self::new(u, p),
            _ => Self::none(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// The presented `user:pass` is compared by SHA-256 digest with a
    /// constant-time fold, so timing reveals neither length nor prefix.
    fn accepts(&self, header: &str) -> bool {
        let Some((user, pass)) = &self.credentials else {
            return true;
        };
        let Some(encoded) = header.strip_prefix("Basic ") else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let expected = Sha256::digest(format!("{user}:{pass}").as_bytes());
        let presented = Sha256::digest(&decoded);
        expected
            .iter()
            .zip(presented.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Axum middleware that gates every request behind Basic auth when
/// credentials are configured.
pub async fn auth_middleware(
    State(auth): State<Arc<BasicAuth>>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        return next.run(req).await;
    }

    let header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    if auth.accepts(header) {
        return next.run(req).await;
    }

    tracing::debug!(path = %req.uri().path(), "rejected unauthenticated request");
    let mut resp = Response::new(Body::from(r#"{"error":"unauthorized"}"#));
    *resp.status_mut() = axum::http::StatusCode::UNAUTHORIZED;
    let headers = resp.headers_mut();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("application/json"),
    );
    headers.insert(
        axum::http::header::WWW_AUTHENTICATE,
        axum::http::HeaderValue::from_static(r#"Basic realm="blinds""#),
    );
    resp
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
