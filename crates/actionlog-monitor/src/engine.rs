//! The action log engine.
//!
//! An `ActionMonitor` lives for one request. It turns action descriptors
//! into deduplicated records, remembers whether a webhook dispatch is owed
//! and prunes stale records after every write.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use actionlog_core::types::{ActionDescriptor, ActionType, NodeId, StreamType, Visibility};
use actionlog_storage::{
    sanitize_term, ActionRecordStore, DedupKey, GarbageCollector, NewActionRecord, TagTaxonomy,
    META_ACTION_TYPE, META_NODE_ID, META_NODE_TYPE, META_REST_BASE, META_STATUS,
};

use crate::error::MonitorError;
use crate::host::ContentHost;
use crate::policy::Policies;
use crate::types::LogOutcome;

/// Post type the action log itself would be registered as on the host.
/// Never tracked, so logging an action cannot log another action.
pub const ACTION_LOG_POST_TYPE: &str = "action_monitor";

/// Node type used when neither the caller nor the host can classify a node.
pub const UNKNOWN_NODE_TYPE: &str = "unknown";

/// Request-scoped action log context shared by every monitor.
pub struct ActionMonitor {
    store: Arc<dyn ActionRecordStore>,
    host: Arc<dyn ContentHost>,
    policies: Arc<Policies>,
    gc: GarbageCollector,
    dispatch_owed: AtomicBool,
    logged: AtomicUsize,
}

impl std::fmt::Debug for ActionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionMonitor")
            .field("dispatch_owed", &self.dispatch_owed())
            .field("logged", &self.logged_count())
            .finish_non_exhaustive()
    }
}

/// Fully validated descriptor fields.
struct Resolved<'a> {
    action_type: ActionType,
    title: &'a str,
    /// Normalised the same way as the dedup key.
    node_id: NodeId,
    status: &'a str,
    node_type: String,
    stream: StreamType,
}

impl ActionMonitor {
    pub fn new(
        store: Arc<dyn ActionRecordStore>,
        host: Arc<dyn ContentHost>,
        policies: Arc<Policies>,
    ) -> Self {
        Self {
            store,
            host,
            policies,
            gc: GarbageCollector::new(),
            dispatch_owed: AtomicBool::new(false),
            logged: AtomicUsize::new(0),
        }
    }

    pub fn with_gc(mut self, gc: GarbageCollector) -> Self {
        self.gc = gc;
        self
    }

    pub fn host(&self) -> &dyn ContentHost {
        self.host.as_ref()
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    pub fn store(&self) -> &dyn ActionRecordStore {
        self.store.as_ref()
    }

    /// Record one action. Never panics and never returns an error; failures
    /// are logged and reflected in the outcome.
    pub fn log_action(
        &self,
        descriptor: &ActionDescriptor,
        ignored: &HashSet<NodeId>,
    ) -> LogOutcome {
        let resolved = match self.validate(descriptor) {
            Ok(resolved) => resolved,
            Err(MonitorError::MissingField(field)) => {
                warn!(field, descriptor = ?descriptor, "Missing required field for log_action");
                return LogOutcome::Rejected { missing: field };
            }
            Err(e) => return LogOutcome::Failed { message: e.to_string() },
        };

        if self.policies.pre_log(descriptor) == Some(false) {
            debug!(node_id = %resolved.node_id, "Action vetoed by pre-log policy");
            return LogOutcome::Vetoed;
        }

        if ignored.contains(&resolved.node_id) {
            debug!(node_id = %resolved.node_id, "Action suppressed by ignore list");
            return LogOutcome::Ignored;
        }

        let outcome = match self.persist(&resolved, descriptor) {
            Ok((record_id, created)) => {
                let dispatch_scheduled =
                    !descriptor.skip_webhook && resolved.stream == StreamType::Content;
                if dispatch_scheduled {
                    self.dispatch_owed.store(true, Ordering::SeqCst);
                }
                self.logged.fetch_add(1, Ordering::SeqCst);
                debug!(
                    %record_id,
                    created,
                    action_type = %resolved.action_type,
                    node_id = %resolved.node_id,
                    node_type = %resolved.node_type,
                    stream = %resolved.stream,
                    "Action logged"
                );
                LogOutcome::Recorded {
                    record_id,
                    created,
                    dispatch_scheduled,
                }
            }
            Err(e) => {
                error!(
                    error = %e,
                    node_id = %resolved.node_id,
                    node_type = %resolved.node_type,
                    "Failed to persist action"
                );
                LogOutcome::Failed { message: e.to_string() }
            }
        };

        if let Err(e) = self.gc.sweep(self.store.as_ref()) {
            error!(error = %e, "Action log garbage collection failed");
        }

        outcome
    }

    fn validate<'a>(&self, descriptor: &'a ActionDescriptor) -> Result<Resolved<'a>, MonitorError> {
        if let Some(field) = descriptor.missing_field() {
            return Err(MonitorError::MissingField(field));
        }
        let (Some(action_type), Some(title), Some(node_id), Some(status)) = (
            descriptor.action_type,
            descriptor.title.as_deref(),
            descriptor.node_id.as_ref(),
            descriptor.status.as_deref(),
        ) else {
            return Err(MonitorError::MissingField("action_type"));
        };

        let node_id = NodeId::new(sanitize_term(node_id.as_str()));
        if node_id.is_empty() {
            return Err(MonitorError::MissingField("node_id"));
        }
        let node_type = self.resolve_node_type(descriptor.node_type.as_deref(), &node_id);

        Ok(Resolved {
            action_type,
            title,
            node_id,
            status,
            node_type,
            stream: match descriptor.stream_type {
                Some(StreamType::Preview) => StreamType::Preview,
                _ => StreamType::Content,
            },
        })
    }

    fn resolve_node_type(&self, explicit: Option<&str>, node_id: &NodeId) -> String {
        if let Some(node_type) = explicit.filter(|t| !t.trim().is_empty()) {
            return node_type.to_string();
        }
        node_id
            .as_numeric()
            .and_then(|id| self.host.entity_type(id))
            .unwrap_or_else(|| UNKNOWN_NODE_TYPE.to_string())
    }

    /// Steps that touch storage. Returns the record id and whether it was
    /// newly created.
    fn persist(
        &self,
        resolved: &Resolved<'_>,
        descriptor: &ActionDescriptor,
    ) -> Result<(Uuid, bool), MonitorError> {
        let now = Utc::now();
        let key = DedupKey::new(&resolved.node_id, &resolved.node_type, resolved.stream);

        let (id, created) = match self.store.find_by_key(&key)? {
            Some(existing) => {
                self.store.update_title(existing.id, resolved.title, now)?;
                (existing.id, false)
            }
            None => {
                let id = self.store.insert(&NewActionRecord {
                    key,
                    title: resolved.title.to_string(),
                    action_type: resolved.action_type,
                    now,
                })?;
                (id, true)
            }
        };

        self.store
            .set_tag(id, TagTaxonomy::ActionType, &resolved.action_type.to_string())?;
        self.store
            .set_tag(id, TagTaxonomy::StreamType, &resolved.stream.to_string())?;

        self.store.set_meta(id, META_STATUS, resolved.status)?;
        if let Some(rest_base) = descriptor.rest_base.as_deref() {
            self.store.set_meta(id, META_REST_BASE, rest_base)?;
        }
        self.store
            .set_meta(id, META_ACTION_TYPE, &resolved.action_type.to_string())?;
        self.store.set_meta(id, META_NODE_ID, resolved.node_id.as_str())?;
        self.store.set_meta(id, META_NODE_TYPE, &resolved.node_type)?;

        if resolved.stream == StreamType::Content {
            self.store.set_visibility(id, Visibility::Public)?;
        }

        Ok((id, created))
    }

    /// Whether at least one content action asked for a webhook dispatch.
    pub fn dispatch_owed(&self) -> bool {
        self.dispatch_owed.load(Ordering::SeqCst)
    }

    /// Consume the dispatch flag. Only the first caller sees `true`.
    pub fn take_dispatch(&self) -> bool {
        self.dispatch_owed.swap(false, Ordering::SeqCst)
    }

    /// Number of actions recorded by this engine.
    pub fn logged_count(&self) -> usize {
        self.logged.load(Ordering::SeqCst)
    }

    /// Document types whose changes are logged.
    pub fn tracked_post_types(&self) -> Vec<String> {
        let types = self
            .host
            .post_types()
            .into_iter()
            .filter(|p| p.show_in_rest && (p.public || p.publicly_queryable))
            .filter(|p| p.name != ACTION_LOG_POST_TYPE)
            .map(|p| p.name)
            .collect();
        self.policies.filter_post_types(types)
    }

    pub fn is_post_type_tracked(&self, post_type: &str) -> bool {
        self.tracked_post_types().iter().any(|t| t == post_type)
    }

    /// Taxonomies whose terms are logged.
    pub fn tracked_taxonomies(&self) -> Vec<String> {
        let taxonomies = self
            .host
            .taxonomies()
            .into_iter()
            .filter(|t| t.show_in_rest && t.public)
            .map(|t| t.name)
            .collect();
        self.policies.filter_taxonomies(taxonomies)
    }

    pub fn is_taxonomy_tracked(&self, taxonomy: &str) -> bool {
        self.tracked_taxonomies().iter().any(|t| t == taxonomy)
    }
}
