//! Fixed-window rate limiter for the ingest endpoints.
//!
//! Hosts fire change events in bursts around saves; the limiter caps how
//! many ingest requests are accepted per window and tells rejected callers
//! when to retry.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Extension, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::ErrorBody;

/// Default number of ingest requests accepted per window.
pub const DEFAULT_MAX_PER_WINDOW: u32 = 60;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Shared state for the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    state: Arc<Mutex<Window>>,
}

impl RateLimiter {
    /// Allow `max_per_window` requests in every `window`.
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            state: Arc::new(Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            })),
        }
    }

    /// `DEFAULT_MAX_PER_WINDOW` requests per second.
    pub fn per_second() -> Self {
        Self::new(DEFAULT_MAX_PER_WINDOW, Duration::from_secs(1))
    }

    /// Try to acquire a permit at `now`. On rejection returns how long until
    /// the window resets.
    fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        let elapsed = now.saturating_duration_since(state.started);
        if elapsed >= self.window {
            state.started = now;
            state.count = 0;
        }

        if state.count < self.max_per_window {
            state.count += 1;
            Ok(())
        } else {
            Err(self.window.saturating_sub(elapsed))
        }
    }

    fn try_acquire(&self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }
}

/// Axum middleware that enforces the rate limit.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    match limiter.try_acquire() {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            tracing::warn!(path = %req.uri().path(), "Rate limit exceeded");
            let mut resp = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorBody {
                    error: "too_many_requests".to_string(),
                    message: "Rate limit exceeded".to_string(),
                    details: None,
                }),
            )
                .into_response();
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, value);
            }
            resp
        }
    }
}
