//! State and helpers shared by every monitor.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use actionlog_core::types::{ActionDescriptor, ActionType, NodeId};
use actionlog_storage::sanitize_term;

use crate::engine::ActionMonitor;
use crate::policy::MetaOwner;
use crate::types::LogOutcome;

const REFETCH_ALL: &str = "refetch_all";
const NON_NODE_ROOT_FIELD: &str = "update_non_node_root_field";
const NONE: &str = "none";

/// Ignore list entries use the same form as the engine's dedup key.
fn normalise(id: NodeId) -> NodeId {
    NodeId::new(sanitize_term(id.as_str()))
}

/// The engine handle and ignore list every monitor carries.
pub struct MonitorBase {
    engine: Arc<ActionMonitor>,
    ignored: Mutex<HashSet<NodeId>>,
}

impl std::fmt::Debug for MonitorBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorBase")
            .field("ignored", &self.ignored().len())
            .finish_non_exhaustive()
    }
}

impl MonitorBase {
    pub fn new(engine: Arc<ActionMonitor>) -> Self {
        Self {
            engine,
            ignored: Mutex::new(HashSet::new()),
        }
    }

    pub fn engine(&self) -> &ActionMonitor {
        &self.engine
    }

    fn ignored(&self) -> MutexGuard<'_, HashSet<NodeId>> {
        self.ignored.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log through the engine, honoring this monitor's ignore list.
    pub fn log_action(&self, descriptor: ActionDescriptor) -> LogOutcome {
        let ignored = self.ignored();
        self.engine.log_action(&descriptor, &ignored)
    }

    /// Log an action telling consumers to refetch everything.
    pub fn trigger_refetch_all(&self, overrides: ActionDescriptor) -> LogOutcome {
        let defaults = ActionDescriptor::new(
            ActionType::RefetchAll,
            "Something changed (such as permalink structure) that requires everything to be refetched",
            REFETCH_ALL,
            REFETCH_ALL,
        );
        self.log_sentinel(ActionType::RefetchAll, overrides, defaults)
    }

    /// Log an action for a change to a root field that is not a node.
    pub fn trigger_non_node_root_field_update(&self, overrides: ActionDescriptor) -> LogOutcome {
        let defaults = ActionDescriptor::new(
            ActionType::NonNodeRootFields,
            "Non node root field changed",
            NON_NODE_ROOT_FIELD,
            NON_NODE_ROOT_FIELD,
        );
        self.log_sentinel(ActionType::NonNodeRootFields, overrides, defaults)
    }

    /// Log an action telling consumers the content model changed shape.
    pub fn trigger_schema_diff(&self, overrides: ActionDescriptor) -> LogOutcome {
        let defaults = ActionDescriptor::new(ActionType::DiffSchemas, "Diff schemas", NONE, NONE)
            .with_node_type(NONE);
        self.log_sentinel(ActionType::DiffSchemas, overrides, defaults)
    }

    fn log_sentinel(
        &self,
        action_type: ActionType,
        overrides: ActionDescriptor,
        defaults: ActionDescriptor,
    ) -> LogOutcome {
        let mut descriptor = overrides.merged_over(defaults);
        descriptor.action_type = Some(action_type);
        self.log_action(descriptor)
    }

    /// Add ids to the ignore list.
    pub fn set_ignored_ids<I>(&self, ids: I)
    where
        I: IntoIterator,
        I::Item: Into<NodeId>,
    {
        self.ignored()
            .extend(ids.into_iter().map(|id| normalise(id.into())));
    }

    /// Remove ids from the ignore list.
    pub fn unset_ignored_ids<I>(&self, ids: I)
    where
        I: IntoIterator,
        I::Item: Into<NodeId>,
    {
        let mut ignored = self.ignored();
        for id in ids {
            ignored.remove(&normalise(id.into()));
        }
    }

    pub fn reset_ignored_ids(&self) {
        self.ignored().clear();
    }

    pub fn is_ignored(&self, id: &NodeId) -> bool {
        self.ignored().contains(&normalise(id.clone()))
    }

    /// Whether a metadata change should produce an action.
    ///
    /// An injected override wins; otherwise keys with a leading underscore
    /// are private and skipped, and everything else is tracked.
    pub fn should_track_meta(&self, key: &str, value: &Value, owner: MetaOwner) -> bool {
        if let Some(decision) = self.engine.policies().meta_override(key, value, owner) {
            return decision;
        }
        !key.starts_with('_')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use actionlog_core::types::{StreamType, Visibility};
    use actionlog_storage::{ActionRecordRepository, ActionRecordStore, Database};

    use crate::host::InMemoryHost;
    use crate::policy::Policies;

    fn make_base(policies: Policies) -> (MonitorBase, Arc<ActionRecordRepository>) {
        let repo = Arc::new(ActionRecordRepository::new(Arc::new(
            Database::in_memory().unwrap(),
        )));
        let engine = ActionMonitor::new(
            repo.clone(),
            Arc::new(InMemoryHost::new()),
            Arc::new(policies),
        );
        (MonitorBase::new(Arc::new(engine)), repo)
    }

    fn post_update(id: u64) -> ActionDescriptor {
        ActionDescriptor::new(ActionType::Update, "Post", id, "publish").with_node_type("post")
    }

    #[test]
    fn test_ignore_list_set_unset_reset() {
        let (base, repo) = make_base(Policies::new());

        base.set_ignored_ids([1u64, 2]);
        assert!(base.is_ignored(&NodeId::from(1u64)));
        assert_eq!(base.log_action(post_update(1)), LogOutcome::Ignored);

        base.unset_ignored_ids([1u64]);
        assert!(!base.is_ignored(&NodeId::from(1u64)));
        assert!(base.log_action(post_update(1)).is_recorded());
        assert_eq!(base.log_action(post_update(2)), LogOutcome::Ignored);

        base.reset_ignored_ids();
        assert!(base.log_action(post_update(2)).is_recorded());
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_ignore_list_ignores_whitespace_variants() {
        let (base, repo) = make_base(Policies::new());

        base.set_ignored_ids([" 7 "]);
        assert!(base.is_ignored(&NodeId::from(7u64)));
        let padded = ActionDescriptor::new(ActionType::Update, "Post", "7 ", "publish")
            .with_node_type("post");
        assert_eq!(base.log_action(padded), LogOutcome::Ignored);
        assert_eq!(base.log_action(post_update(7)), LogOutcome::Ignored);
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_refetch_all_defaults_and_override() {
        let (base, repo) = make_base(Policies::new());
        let outcome = base.trigger_refetch_all(
            ActionDescriptor::default().with_title("Permalink structure updated"),
        );

        let record = repo.find_by_id(outcome.record_id().unwrap()).unwrap().unwrap();
        assert_eq!(record.action_type, ActionType::RefetchAll);
        assert_eq!(record.title, "Permalink structure updated");
        assert_eq!(record.node_id, NodeId::from("refetch_all"));
        assert_eq!(record.status, "refetch_all");
        assert_eq!(record.visibility, Visibility::Public);
    }

    #[test]
    fn test_sentinel_action_type_cannot_be_overridden() {
        let (base, repo) = make_base(Policies::new());
        let overrides = ActionDescriptor {
            action_type: Some(ActionType::Delete),
            ..ActionDescriptor::default()
        };
        let outcome = base.trigger_schema_diff(overrides);

        let record = repo.find_by_id(outcome.record_id().unwrap()).unwrap().unwrap();
        assert_eq!(record.action_type, ActionType::DiffSchemas);
        assert_eq!(record.title, "Diff schemas");
        assert_eq!(record.node_type, "none");
        assert_eq!(record.stream_type, StreamType::Content);
    }

    #[test]
    fn test_non_node_root_field_defaults() {
        let (base, repo) = make_base(Policies::new());
        let outcome = base.trigger_non_node_root_field_update(ActionDescriptor::default());
        let record = repo.find_by_id(outcome.record_id().unwrap()).unwrap().unwrap();
        assert_eq!(record.action_type, ActionType::NonNodeRootFields);
        assert_eq!(record.title, "Non node root field changed");
        assert_eq!(record.status, "update_non_node_root_field");
    }

    #[test]
    fn test_should_track_meta_precedence() {
        let (base, _) = make_base(Policies::new());
        assert!(base.should_track_meta("color", &Value::Null, MetaOwner::Entity(1)));
        assert!(!base.should_track_meta("_edit_lock", &Value::Null, MetaOwner::Entity(1)));

        let policies = Policies::new().with_should_track_meta(|key, _, _| match key {
            "_seo_title" => Some(true),
            "views" => Some(false),
            _ => None,
        });
        let (base, _) = make_base(policies);
        assert!(base.should_track_meta("_seo_title", &Value::Null, MetaOwner::Term(3)));
        assert!(!base.should_track_meta("views", &Value::Null, MetaOwner::Term(3)));
        assert!(!base.should_track_meta("_other", &Value::Null, MetaOwner::Term(3)));
        assert!(base.should_track_meta("other", &Value::Null, MetaOwner::Term(3)));
    }
}
