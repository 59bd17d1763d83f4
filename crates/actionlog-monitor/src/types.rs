//! Outcome and request types produced by the engine and the dispatcher.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of a single `log_action` call.
///
/// Logging never fails from the caller's point of view; this value tells
/// tests and the ingest endpoint what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LogOutcome {
    /// A record was created or updated.
    Recorded {
        record_id: Uuid,
        created: bool,
        dispatch_scheduled: bool,
    },
    /// The pre-log policy returned `false`.
    Vetoed,
    /// The node id is on the monitor's ignore list.
    Ignored,
    /// A required descriptor field was missing.
    Rejected { missing: &'static str },
    /// A storage operation failed; the error was logged.
    Failed { message: String },
}

impl LogOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, LogOutcome::Recorded { .. })
    }

    pub fn record_id(&self) -> Option<Uuid> {
        match self {
            LogOutcome::Recorded { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }
}

/// Argument bag for one outbound webhook POST.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON body. `None` sends an empty POST.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl WebhookRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// A webhook that could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedWebhook {
    pub url: String,
    pub reason: String,
}

/// Summary of one end-of-request dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Whether the engine owed a dispatch when the request ended.
    pub owed: bool,
    /// URLs a POST was attempted for.
    pub attempted: Vec<String>,
    /// URLs that answered with a 2xx status.
    pub delivered: Vec<String>,
    pub failed: Vec<FailedWebhook>,
    /// Configured entries dropped before sending (unparseable URLs).
    pub invalid: Vec<String>,
}

impl DispatchReport {
    pub fn fired(&self) -> bool {
        !self.attempted.is_empty()
    }
}
