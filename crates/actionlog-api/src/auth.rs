//! API authentication via bearer tokens.
//!
//! Provides token generation and persistence, middleware for protected
//! endpoints, and a soft check read endpoints use to widen visibility.

use std::path::Path;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;

use crate::error::ErrorBody;
use crate::state::AppState;

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Load token from file, or generate and save a new one.
pub fn load_or_generate_token(token_path: &Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(token_path) {
        let token = contents.trim().to_string();
        if !token.is_empty() {
            tracing::info!("API token loaded from {}", token_path.display());
            return token;
        }
    }

    let token = generate_token();

    if let Some(parent) = token_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(token_path, &token) {
        tracing::warn!(error = %e, "Failed to save API token to {}", token_path.display());
    } else {
        // Owner-only access.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(token_path, std::fs::Permissions::from_mode(0o600));
        }
        tracing::info!("API token saved to {}", token_path.display());
    }

    token
}

/// Why a request failed bearer authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    BadEncoding,
    WrongToken,
}

impl AuthFailure {
    fn message(self) -> &'static str {
        match self {
            AuthFailure::Missing => "Missing Authorization header",
            AuthFailure::BadEncoding => "Invalid Authorization header encoding",
            AuthFailure::WrongToken => "Invalid bearer token",
        }
    }
}

/// Validate `Authorization: Bearer <token>` against `expected`.
///
/// An empty `expected` token never authenticates.
pub fn check_bearer(headers: &HeaderMap, expected: &str) -> Result<(), AuthFailure> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthFailure::Missing)?;
    let value = value.to_str().map_err(|_| AuthFailure::BadEncoding)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !expected.is_empty() && token == expected => Ok(()),
        _ => Err(AuthFailure::WrongToken),
    }
}

/// Whether the request carries the service's bearer token. Used by read
/// endpoints, which stay public but show private records to authenticated
/// callers.
pub fn is_authenticated(headers: &HeaderMap, state: &AppState) -> bool {
    check_bearer(headers, &state.api_token).is_ok()
}

/// Middleware that validates Bearer token authentication.
///
/// Returns 401 if the header is missing or the token does not match
/// `AppState.api_token`.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match check_bearer(req.headers(), &state.api_token) {
        Ok(()) => next.run(req).await,
        Err(failure) => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "unauthorized".to_string(),
                message: failure.message().to_string(),
                details: None,
            }),
        )
            .into_response(),
    }
}
