//! Action log engine.
//!
//! Turns change notifications from a host content repository into a
//! deduplicated action log, and notifies build webhooks once per request
//! lifetime when new content actions were recorded.
//!
//! A request lifetime looks like this:
//!
//! 1. Build an [`ActionMonitor`] over the shared store, host and policies.
//! 2. Build a [`MonitorSet`] from a [`MonitorRegistry`] and route every
//!    [`ChangeEvent`](actionlog_core::ChangeEvent) through it.
//! 3. Call [`DispatchScheduler::on_request_end`].

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod host;
pub mod monitors;
pub mod policy;
pub mod types;

pub use dispatch::{webhook_urls, DispatchScheduler, ReqwestTransport, WebhookTransport};
pub use engine::{ActionMonitor, ACTION_LOG_POST_TYPE, UNKNOWN_NODE_TYPE};
pub use error::{DispatchError, MonitorError};
pub use host::{ContentHost, HostCatalog, InMemoryHost};
pub use monitors::{Monitor, MonitorBase, MonitorRegistry, MonitorSet};
pub use policy::{MetaOwner, Policies, DEFAULT_TRACKED_OPTIONS, DEFAULT_TRACKED_USER_META};
pub use types::{DispatchReport, FailedWebhook, LogOutcome, WebhookRequest};
