//! Navigation menus and their theme location assignments.

use std::any::Any;
use std::collections::BTreeMap;

use actionlog_core::events::{ChangeEvent, EventKind};
use actionlog_core::types::{ActionDescriptor, ActionType};

use super::{Monitor, MonitorBase};
use crate::types::LogOutcome;

pub const NAME: &str = "nav_menu";

const NODE_TYPE: &str = "menu";
const REST_BASE: &str = "menus";

const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::MenuLocationsChanged,
    EventKind::MenuUpdated,
    EventKind::MenuDeleted,
];

pub struct NavMenuMonitor {
    base: MonitorBase,
}

impl NavMenuMonitor {
    pub fn new(base: MonitorBase) -> Self {
        Self { base }
    }

    /// Menus newly assigned to a location are created; menus no longer
    /// assigned anywhere are deleted.
    pub fn on_menu_locations_changed(
        &self,
        old: &BTreeMap<String, u64>,
        new: &BTreeMap<String, u64>,
    ) -> Vec<LogOutcome> {
        if old == new {
            return Vec::new();
        }
        let host = self.base.engine().host();
        let mut outcomes = Vec::new();

        for menu_id in menu_diff(new, old) {
            let Some(menu) = host.menu(menu_id) else {
                continue;
            };
            outcomes.push(
                self.base.log_action(
                    ActionDescriptor::new(ActionType::Create, menu.name, menu.id, "publish")
                        .with_node_type(NODE_TYPE)
                        .with_rest_base(REST_BASE),
                ),
            );
        }

        for menu_id in menu_diff(old, new) {
            outcomes.push(
                self.base.log_action(
                    ActionDescriptor::new(ActionType::Delete, menu_id.to_string(), menu_id, "trash")
                        .with_node_type(NODE_TYPE),
                ),
            );
        }
        outcomes
    }

    pub fn on_menu_updated(&self, menu_id: u64) -> Option<LogOutcome> {
        let menu = self.base.engine().host().menu(menu_id)?;
        Some(
            self.base.log_action(
                ActionDescriptor::new(ActionType::Update, menu.name, menu.id, "publish")
                    .with_node_type(NODE_TYPE)
                    .with_rest_base(REST_BASE),
            ),
        )
    }

    pub fn on_menu_deleted(&self, menu_id: u64) -> LogOutcome {
        self.base.log_action(
            ActionDescriptor::new(ActionType::Delete, format!("#{}", menu_id), menu_id, "trash")
                .with_node_type(NODE_TYPE),
        )
    }
}

/// Menu ids assigned in `a` but in no location of `b`, in order, once each.
fn menu_diff(a: &BTreeMap<String, u64>, b: &BTreeMap<String, u64>) -> Vec<u64> {
    let mut ids = Vec::new();
    for id in a.values() {
        if !b.values().any(|other| other == id) && !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}

impl Monitor for NavMenuMonitor {
    fn name(&self) -> &str {
        NAME
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn on_event(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::MenuLocationsChanged {
                old_locations,
                new_locations,
            } => {
                self.on_menu_locations_changed(old_locations, new_locations);
            }
            ChangeEvent::MenuUpdated { menu_id } => {
                self.on_menu_updated(*menu_id);
            }
            ChangeEvent::MenuDeleted { menu_id } => {
                self.on_menu_deleted(*menu_id);
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

    use actionlog_core::types::NavMenu;
    use actionlog_storage::{ActionRecordRepository, ActionRecordStore, Database};

    use crate::engine::ActionMonitor;
    use crate::host::InMemoryHost;
    use crate::policy::Policies;

    fn setup() -> (NavMenuMonitor, Arc<InMemoryHost>, Arc<ActionRecordRepository>) {
        let repo = Arc::new(ActionRecordRepository::new(Arc::new(
            Database::in_memory().unwrap(),
        )));
        let host = Arc::new(InMemoryHost::new());
        let engine = Arc::new(ActionMonitor::new(
            repo.clone(),
            host.clone(),
            Arc::new(Policies::new()),
        ));
        (NavMenuMonitor::new(MonitorBase::new(engine)), host, repo)
    }

    fn locations(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_menu_diff() {
        let a = locations(&[("primary", 1), ("footer", 2), ("social", 2)]);
        let b = locations(&[("primary", 1), ("footer", 3)]);
        assert_eq!(menu_diff(&a, &b), vec![2]);
        assert_eq!(menu_diff(&b, &a), vec![3]);
    }

    #[test]
    fn test_location_changes_create_and_delete() {
        let (monitor, host, repo) = setup();
        host.insert_menu(NavMenu {
            id: 3,
            name: "Footer".to_string(),
        });

        let outcomes = monitor.on_menu_locations_changed(
            &locations(&[("footer", 2)]),
            &locations(&[("footer", 3)]),
        );
        assert_eq!(outcomes.len(), 2);

        let created = repo.find_by_id(outcomes[0].record_id().unwrap()).unwrap().unwrap();
        assert_eq!(created.action_type, ActionType::Create);
        assert_eq!(created.title, "Footer");
        assert_eq!(created.node_type, "menu");

        let removed = repo.find_by_id(outcomes[1].record_id().unwrap()).unwrap().unwrap();
        assert_eq!(removed.action_type, ActionType::Delete);
        assert_eq!(removed.title, "2");
        assert_eq!(removed.status, "trash");
    }

    #[test]
    fn test_unchanged_locations_noop() {
        let (monitor, _, repo) = setup();
        let same = locations(&[("primary", 1)]);
        assert!(monitor.on_menu_locations_changed(&same, &same).is_empty());
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_update_and_delete_menu() {
        let (monitor, host, repo) = setup();
        host.insert_menu(NavMenu {
            id: 8,
            name: "Main".to_string(),
        });

        let updated = monitor.on_menu_updated(8).unwrap();
        let record = repo.find_by_id(updated.record_id().unwrap()).unwrap().unwrap();
        assert_eq!(record.rest_base.as_deref(), Some("menus"));

        assert!(monitor.on_menu_updated(9).is_none());

        let deleted = monitor.on_menu_deleted(8);
        assert_eq!(deleted.record_id(), updated.record_id());
        let record = repo.find_by_id(deleted.record_id().unwrap()).unwrap().unwrap();
        assert_eq!(record.title, "#8");
        assert_eq!(record.action_type, ActionType::Delete);
    }
}
