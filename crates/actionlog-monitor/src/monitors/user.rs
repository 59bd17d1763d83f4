//! User accounts, including deletion with content reassignment.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::warn;

use actionlog_core::events::{ChangeEvent, EventKind};
use actionlog_core::types::{ActionDescriptor, ActionType, UserProfile};

use super::{Monitor, MonitorBase};
use crate::policy::MetaOwner;
use crate::types::LogOutcome;

pub const NAME: &str = "user";

const NODE_TYPE: &str = "user";

const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::UserSaved,
    EventKind::UserAboutToDelete,
    EventKind::UserDeleted,
    EventKind::UserMetaChanged,
];

/// What is known about a user just before deletion.
#[derive(Debug, Clone)]
struct DeletedUser {
    user: UserProfile,
    reassign: Option<UserProfile>,
    /// Published posts that will move to `reassign`.
    post_ids: Vec<u64>,
}

pub struct UserMonitor {
    base: MonitorBase,
    before_delete: Mutex<HashMap<u64, DeletedUser>>,
}

impl UserMonitor {
    pub fn new(base: MonitorBase) -> Self {
        Self {
            base,
            before_delete: Mutex::new(HashMap::new()),
        }
    }

    fn descriptor(action_type: ActionType, user: &UserProfile, status: &str) -> ActionDescriptor {
        ActionDescriptor::new(action_type, user.display_name.clone(), user.id, status)
            .with_node_type(NODE_TYPE)
    }

    /// Whether the user authored at least one published post of a tracked
    /// type.
    pub fn is_published_author(&self, user_id: u64) -> bool {
        let engine = self.base.engine();
        let types = engine.tracked_post_types();
        !engine
            .host()
            .published_posts_by_author(user_id, &types)
            .is_empty()
    }

    /// Whether a user meta change should produce an action. Only the
    /// allow-listed keys are public unless an override says otherwise.
    pub fn should_track_meta(&self, key: &str, value: &Value, user_id: u64) -> bool {
        let policies = self.base.engine().policies();
        if let Some(decision) = policies.meta_override(key, value, MetaOwner::User(user_id)) {
            return decision;
        }
        policies.tracked_user_meta_keys().iter().any(|k| k == key)
    }

    /// Profile updated or user registered.
    pub fn on_user_saved(&self, user_id: u64) -> Option<LogOutcome> {
        if user_id == 0 {
            return None;
        }
        let user = self.base.engine().host().user(user_id)?;
        Some(self.base.log_action(Self::descriptor(ActionType::Update, &user, "publish")))
    }

    /// Capture the user, the reassignment target and the posts that will
    /// move, while all of them still exist.
    pub fn on_user_about_to_delete(&self, user_id: u64, reassign_to: Option<u64>) {
        if user_id == 0 {
            return;
        }
        let engine = self.base.engine();
        let host = engine.host();
        let Some(user) = host.user(user_id) else {
            return;
        };

        let reassign = reassign_to.filter(|id| *id != 0).and_then(|id| host.user(id));
        let post_ids = if reassign.is_some() {
            host.published_posts_by_author(user_id, &engine.tracked_post_types())
        } else {
            Vec::new()
        };

        self.before_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                user_id,
                DeletedUser {
                    user,
                    reassign,
                    post_ids,
                },
            );
    }

    /// Log the deleted user and, when content was reassigned, the new owner
    /// and every moved post.
    pub fn on_user_deleted(&self, user_id: u64) -> Vec<LogOutcome> {
        let Some(deleted) = self
            .before_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&user_id)
        else {
            warn!(
                user_id,
                "User deleted without an about-to-delete snapshot in this request; nothing logged"
            );
            return Vec::new();
        };

        let mut outcomes = vec![self
            .base
            .log_action(Self::descriptor(ActionType::Delete, &deleted.user, "trash"))];

        let Some(reassign) = deleted.reassign else {
            return outcomes;
        };
        outcomes.push(
            self.base
                .log_action(Self::descriptor(ActionType::Update, &reassign, "publish")),
        );

        let host = self.base.engine().host();
        for post_id in deleted.post_ids {
            let Some(post) = host.entity(post_id) else {
                continue;
            };
            if !post.is_published() {
                continue;
            }
            outcomes.push(self.base.log_action(
                ActionDescriptor::new(ActionType::Update, post.title, post.id, "publish")
                    .with_node_type(post.entity_type),
            ));
        }
        outcomes
    }

    pub fn on_user_meta_changed(&self, user_id: u64, key: &str, value: &Value) -> Option<LogOutcome> {
        let user = self.base.engine().host().user(user_id)?;
        if !self.is_published_author(user_id) {
            return None;
        }
        if !self.should_track_meta(key, value, user_id) {
            return None;
        }
        Some(self.base.log_action(Self::descriptor(ActionType::Update, &user, "publish")))
    }
}

impl Monitor for UserMonitor {
    fn name(&self) -> &str {
        NAME
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn on_event(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::UserSaved { user_id } => {
                self.on_user_saved(*user_id);
            }
            ChangeEvent::UserAboutToDelete {
                user_id,
                reassign_to,
            } => self.on_user_about_to_delete(*user_id, *reassign_to),
            ChangeEvent::UserDeleted { user_id } => {
                self.on_user_deleted(*user_id);
            }
            ChangeEvent::UserMetaChanged {
                user_id,
                meta_key,
                meta_value,
            } => {
                self.on_user_meta_changed(*user_id, meta_key, meta_value);
            }
            _ => {}
        }
    }

    fn base(&self) -> &MonitorBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actionlog_core::types::ContentEntity;
    use actionlog_storage::{ActionRecordRepository, ActionRecordStore, Database};

    use crate::engine::ActionMonitor;
    use crate::host::InMemoryHost;
    use crate::policy::Policies;

    struct Fixture {
        monitor: UserMonitor,
        engine: Arc<ActionMonitor>,
        host: Arc<InMemoryHost>,
        repo: Arc<ActionRecordRepository>,
    }

    fn setup_with(policies: Policies) -> Fixture {
        let repo = Arc::new(ActionRecordRepository::new(Arc::new(
            Database::in_memory().unwrap(),
        )));
        let host = Arc::new(InMemoryHost::with_core_types());
        let engine = Arc::new(ActionMonitor::new(repo.clone(), host.clone(), Arc::new(policies)));
        Fixture {
            monitor: UserMonitor::new(MonitorBase::new(engine.clone())),
            engine,
            host,
            repo,
        }
    }

    fn setup() -> Fixture {
        setup_with(Policies::new())
    }

    fn user(id: u64, name: &str) -> UserProfile {
        UserProfile {
            id,
            display_name: name.to_string(),
        }
    }

    fn post(id: u64, author: u64, status: &str) -> ContentEntity {
        ContentEntity {
            id,
            entity_type: "post".to_string(),
            title: format!("Post {}", id),
            status: status.to_string(),
            author: Some(author),
        }
    }

    #[test]
    fn test_profile_update() {
        let f = setup();
        f.host.insert_user(user(3, "Ada"));
        let outcome = f.monitor.on_user_saved(3).unwrap();
        let record = f.repo.find_by_id(outcome.record_id().unwrap()).unwrap().unwrap();
        assert_eq!(record.title, "Ada");
        assert_eq!(record.node_type, "user");
        assert_eq!(record.action_type, ActionType::Update);

        assert!(f.monitor.on_user_saved(0).is_none());
        assert!(f.monitor.on_user_saved(404).is_none());
    }

    #[test]
    fn test_delete_with_reassignment() {
        let f = setup();
        f.host.insert_user(user(1, "Leaving"));
        f.host.insert_user(user(2, "Heir"));
        f.host.insert_entity(post(10, 1, "publish"));
        f.host.insert_entity(post(11, 1, "publish"));
        f.host.insert_entity(post(12, 1, "draft"));

        f.monitor.on_user_about_to_delete(1, Some(2));
        f.host.remove_user(1);
        let outcomes = f.monitor.on_user_deleted(1);

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(LogOutcome::is_recorded));

        let deleted = f.repo.find_by_id(outcomes[0].record_id().unwrap()).unwrap().unwrap();
        assert_eq!(deleted.action_type, ActionType::Delete);
        assert_eq!(deleted.title, "Leaving");
        assert_eq!(deleted.status, "trash");

        let heir = f.repo.find_by_id(outcomes[1].record_id().unwrap()).unwrap().unwrap();
        assert_eq!(heir.action_type, ActionType::Update);
        assert_eq!(heir.title, "Heir");

        let moved: Vec<String> = outcomes[2..]
            .iter()
            .map(|o| f.repo.find_by_id(o.record_id().unwrap()).unwrap().unwrap())
            .map(|r| format!("{}:{}", r.node_type, r.node_id))
            .collect();
        assert_eq!(moved, vec!["post:10", "post:11"]);
    }

    #[test]
    fn test_delete_without_reassignment() {
        let f = setup();
        f.host.insert_user(user(1, "Leaving"));
        f.host.insert_entity(post(10, 1, "publish"));

        f.monitor.on_user_about_to_delete(1, None);
        let outcomes = f.monitor.on_user_deleted(1);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(f.repo.count().unwrap(), 1);
    }

    #[test]
    fn test_delete_without_snapshot_is_noop() {
        let f = setup();
        assert!(f.monitor.on_user_deleted(5).is_empty());
        assert_eq!(f.repo.count().unwrap(), 0);
    }

    #[test]
    fn test_delete_snapshot_does_not_outlive_monitor() {
        let f = setup();
        f.host.insert_user(user(5, "Leaving"));
        f.monitor.on_user_about_to_delete(5, None);

        // A fresh monitor stands in for the next request.
        let next = UserMonitor::new(MonitorBase::new(f.engine.clone()));
        assert!(next.on_user_deleted(5).is_empty());
        assert_eq!(f.repo.count().unwrap(), 0);

        // The snapshot is consumed by the first delete in its own request.
        assert_eq!(f.monitor.on_user_deleted(5).len(), 1);
        assert!(f.monitor.on_user_deleted(5).is_empty());
        assert_eq!(f.repo.count().unwrap(), 1);
    }

    #[test]
    fn test_meta_requires_published_author_and_allowed_key() {
        let f = setup();
        f.host.insert_user(user(1, "Author"));
        f.host.insert_user(user(2, "Reader"));
        f.host.insert_entity(post(10, 1, "publish"));

        assert!(f
            .monitor
            .on_user_meta_changed(2, "description", &Value::Null)
            .is_none());
        assert!(f
            .monitor
            .on_user_meta_changed(1, "session_tokens", &Value::Null)
            .is_none());
        assert!(f
            .monitor
            .on_user_meta_changed(1, "nickname", &Value::Null)
            .is_some());
    }

    #[test]
    fn test_meta_override_and_allow_list_filter() {
        let policies = Policies::new()
            .with_should_track_meta(|key, _, owner| {
                (key == "nickname" && owner == MetaOwner::User(1)).then_some(false)
            })
            .with_tracked_user_meta_keys(|mut keys| {
                keys.push("twitter".to_string());
                keys
            });
        let f = setup_with(policies);
        f.host.insert_user(user(1, "Author"));
        f.host.insert_entity(post(10, 1, "publish"));

        assert!(!f.monitor.should_track_meta("nickname", &Value::Null, 1));
        assert!(f.monitor.should_track_meta("twitter", &Value::Null, 1));
        assert!(f.monitor.should_track_meta("description", &Value::Null, 1));
    }
}
