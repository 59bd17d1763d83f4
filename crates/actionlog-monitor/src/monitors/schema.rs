//! Content model changes: registered document types or taxonomies.

use std::any::Any;

use actionlog_core::events::{ChangeEvent, EventKind};
use actionlog_core::types::ActionDescriptor;

use super::{Monitor, MonitorBase};
use crate::types::LogOutcome;

pub const NAME: &str = "schema";

const SUBSCRIPTIONS: &[EventKind] = &[EventKind::ContentModelChanged];

pub struct SchemaMonitor {
    base: MonitorBase,
}

impl SchemaMonitor {
    pub fn new(base: MonitorBase) -> Self {
        Self { base }
    }

    pub fn on_content_model_changed(&self, description: Option<&str>) -> LogOutcome {
        let overrides = match description.filter(|d| !d.trim().is_empty()) {
            Some(description) => ActionDescriptor::default().with_title(description),
            None => ActionDescriptor::default(),
        };
        self.base.trigger_schema_diff(overrides)
    }
}

impl Monitor for SchemaMonitor {
    fn name(&self) -> &str {
        NAME
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn on_event(&self, event: &ChangeEvent) {
        if let ChangeEvent::ContentModelChanged { description } = event {
            self.on_content_model_changed(description.as_deref());
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

    use actionlog_core::types::ActionType;
    use actionlog_storage::{ActionRecordRepository, ActionRecordStore, Database};

    use crate::engine::ActionMonitor;
    use crate::host::InMemoryHost;
    use crate::policy::Policies;

    #[test]
    fn test_content_model_change_diffs_schemas() {
        let repo = Arc::new(ActionRecordRepository::new(Arc::new(
            Database::in_memory().unwrap(),
        )));
        let engine = Arc::new(ActionMonitor::new(
            repo.clone(),
            Arc::new(InMemoryHost::new()),
            Arc::new(Policies::new()),
        ));
        let monitor = SchemaMonitor::new(MonitorBase::new(engine.clone()));

        let first = monitor.on_content_model_changed(None);
        let second = monitor.on_content_model_changed(Some("Registered post type: product"));
        assert_eq!(first.record_id(), second.record_id());

        let record = repo.find_by_id(second.record_id().unwrap()).unwrap().unwrap();
        assert_eq!(record.action_type, ActionType::DiffSchemas);
        assert_eq!(record.title, "Registered post type: product");
        assert_eq!(record.status, "none");
        assert!(engine.dispatch_owed());
    }
}
