//! Site options.

use std::any::Any;

use serde_json::Value;

use actionlog_core::events::{ChangeEvent, EventKind};
use actionlog_core::types::{ActionDescriptor, ActionType, ContentEntity};

use super::{Monitor, MonitorBase};
use crate::types::LogOutcome;

pub const NAME: &str = "settings";

const SUBSCRIPTIONS: &[EventKind] = &[EventKind::OptionUpdated];

pub const PAGE_ON_FRONT: &str = "page_on_front";
pub const PAGE_FOR_POSTS: &str = "page_for_posts";
pub const PERMALINK_STRUCTURE: &str = "permalink_structure";

pub struct SettingsMonitor {
    base: MonitorBase,
}

impl SettingsMonitor {
    pub fn new(base: MonitorBase) -> Self {
        Self { base }
    }

    /// Override hook first, then the allow-list. Anything else is untracked.
    pub fn should_track_option(&self, name: &str, old: &Value, new: &Value) -> bool {
        let policies = self.base.engine().policies();
        if let Some(decision) = policies.option_override(name, old, new) {
            return decision;
        }
        policies.tracked_option_names().iter().any(|n| n == name)
    }

    pub fn on_option_updated(&self, name: &str, old: &Value, new: &Value) -> Option<LogOutcome> {
        if !self.should_track_option(name, old, new) {
            return None;
        }
        let descriptor =
            ActionDescriptor::new(ActionType::Update, format!("Update Setting:  {}", name), "0", "publish")
                .with_node_type("settings");
        Some(self.base.log_action(descriptor))
    }

    fn page(&self, id: u64) -> Option<ContentEntity> {
        if id == 0 {
            return None;
        }
        self.base.engine().host().entity(id)
    }

    fn log_page(&self, page: &ContentEntity) -> LogOutcome {
        self.base.log_action(ActionDescriptor::new(
            ActionType::Update,
            page.title.clone(),
            page.id,
            page.status.clone(),
        ))
    }

    /// The static front page changed. Both pages are touched.
    pub fn on_page_on_front_updated(&self, old: u64, new: u64) -> Vec<LogOutcome> {
        if old == new {
            return Vec::new();
        }
        [old, new]
            .into_iter()
            .filter_map(|id| self.page(id))
            .map(|page| self.log_page(&page))
            .collect()
    }

    /// The posts page changed. A missing side means the post archive itself
    /// moved, which is logged against the `post` node.
    pub fn on_page_for_posts_updated(&self, old: u64, new: u64) -> Vec<LogOutcome> {
        if old == new {
            return Vec::new();
        }
        let mut outcomes = Vec::with_capacity(2);
        for (id, archive_title) in [
            (old, "Change page on front away from posts"),
            (new, "Set page on front to posts"),
        ] {
            let outcome = match self.page(id) {
                Some(page) => self.log_page(&page),
                None => self.base.log_action(ActionDescriptor::new(
                    ActionType::Update,
                    archive_title,
                    "post",
                    "publish",
                )),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    pub fn on_permalink_structure_updated(&self, old: &Value, new: &Value) -> Option<LogOutcome> {
        if old == new {
            return None;
        }
        Some(
            self.base
                .trigger_refetch_all(ActionDescriptor::default().with_title("Permalink structure updated")),
        )
    }
}

/// Option values arrive as numbers or numeric strings.
fn as_id(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl Monitor for SettingsMonitor {
    fn name(&self) -> &str {
        NAME
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn on_event(&self, event: &ChangeEvent) {
        let ChangeEvent::OptionUpdated {
            option_name,
            old_value,
            new_value,
        } = event
        else {
            return;
        };

        self.on_option_updated(option_name, old_value, new_value);
        match option_name.as_str() {
            PAGE_ON_FRONT => {
                self.on_page_on_front_updated(as_id(old_value), as_id(new_value));
            }
            PAGE_FOR_POSTS => {
                self.on_page_for_posts_updated(as_id(old_value), as_id(new_value));
            }
            PERMALINK_STRUCTURE => {
                self.on_permalink_structure_updated(old_value, new_value);
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
