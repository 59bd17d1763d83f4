//! Error types for the action log engine and webhook dispatch.

use actionlog_core::error::ActionLogError;

/// Errors raised while turning a descriptor into a stored record.
///
/// These never escape `log_action`; they are logged and reported through
/// `LogOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Action descriptor is missing required field: {0}")]
    MissingField(&'static str),
    #[error("Storage error: {0}")]
    Storage(#[from] ActionLogError),
}

/// Errors from a single webhook POST.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid webhook URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
    #[error("Webhook request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("Webhook {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}
