//! Media library attachments.

use std::any::Any;

use actionlog_core::events::{ChangeEvent, EventKind};
use actionlog_core::types::{ActionDescriptor, ActionType};

use super::{Monitor, MonitorBase};
use crate::types::LogOutcome;

pub const NAME: &str = "media";

const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::MediaAdded,
    EventKind::MediaEdited,
    EventKind::MediaDeleted,
    EventKind::MediaFileSaved,
];

pub struct MediaMonitor {
    base: MonitorBase,
}

impl MediaMonitor {
    pub fn new(base: MonitorBase) -> Self {
        Self { base }
    }

    fn title(&self, attachment_id: u64) -> String {
        self.base
            .engine()
            .host()
            .entity(attachment_id)
            .map(|e| e.title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Attachment #{}", attachment_id))
    }

    fn log(&self, action_type: ActionType, attachment_id: u64, status: &str) -> LogOutcome {
        self.base.log_action(ActionDescriptor::new(
            action_type,
            self.title(attachment_id),
            attachment_id,
            status,
        ))
    }

    pub fn on_media_added(&self, attachment_id: u64) -> LogOutcome {
        self.log(ActionType::Create, attachment_id, "publish")
    }

    pub fn on_media_edited(&self, attachment_id: u64) -> LogOutcome {
        self.log(ActionType::Update, attachment_id, "publish")
    }

    pub fn on_media_deleted(&self, attachment_id: u64) -> LogOutcome {
        self.log(ActionType::Delete, attachment_id, "trash")
    }

    /// An image editor re-saved the file.
    pub fn on_media_file_saved(&self, attachment_id: u64) -> LogOutcome {
        self.on_media_edited(attachment_id)
    }
}

impl Monitor for MediaMonitor {
    fn name(&self) -> &str {
        NAME
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn on_event(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::MediaAdded { attachment_id } => {
                self.on_media_added(*attachment_id);
            }
            ChangeEvent::MediaEdited { attachment_id } => {
                self.on_media_edited(*attachment_id);
            }
            ChangeEvent::MediaDeleted { attachment_id } => {
                self.on_media_deleted(*attachment_id);
            }
            ChangeEvent::MediaFileSaved { attachment_id } => {
                self.on_media_file_saved(*attachment_id);
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
