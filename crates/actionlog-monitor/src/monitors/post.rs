//! Documents: publish transitions, previews, deletions and metadata.

use std::any::Any;

use serde_json::Value;
use tracing::debug;

use actionlog_core::events::{ChangeEvent, EventKind};
use actionlog_core::types::{ActionDescriptor, ActionType, ContentEntity, StreamType};

use super::{Monitor, MonitorBase};
use crate::policy::MetaOwner;
use crate::types::LogOutcome;

pub const NAME: &str = "post";

const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::EntitySaved,
    EventKind::EntityPreviewed,
    EventKind::EntityDeleted,
    EventKind::EntityMetaChanged,
];

pub struct PostMonitor {
    base: MonitorBase,
}

impl PostMonitor {
    pub fn new(base: MonitorBase) -> Self {
        Self { base }
    }

    /// Entity snapshot, if it exists and its type is tracked.
    fn tracked_entity(&self, id: u64) -> Option<ContentEntity> {
        let engine = self.base.engine();
        let entity = engine.host().entity(id)?;
        if !engine.is_post_type_tracked(&entity.entity_type) {
            debug!(id, entity_type = %entity.entity_type, "Untracked post type");
            return None;
        }
        Some(entity)
    }

    fn descriptor(&self, action_type: ActionType, entity: &ContentEntity, status: &str) -> ActionDescriptor {
        let mut descriptor = ActionDescriptor::new(action_type, entity.title.clone(), entity.id, status)
            .with_node_type(entity.entity_type.clone());
        if let Some(rest_base) = self
            .base
            .engine()
            .host()
            .post_type(&entity.entity_type)
            .and_then(|p| p.rest_base)
        {
            descriptor = descriptor.with_rest_base(rest_base);
        }
        descriptor
    }

    /// A document was saved. Logs CREATE when it became published, UPDATE
    /// when it stayed published and DELETE when it was unpublished.
    pub fn on_entity_saved(&self, id: u64, previous_status: Option<&str>) -> Option<LogOutcome> {
        let entity = self.tracked_entity(id)?;
        let was_published = previous_status == Some("publish");

        let action_type = match (was_published, entity.is_published()) {
            (false, true) => ActionType::Create,
            (true, true) => ActionType::Update,
            (true, false) => ActionType::Delete,
            (false, false) => return None,
        };
        Some(self.base.log_action(self.descriptor(action_type, &entity, &entity.status)))
    }

    /// A draft or preview revision was saved.
    pub fn on_entity_previewed(&self, id: u64) -> Option<LogOutcome> {
        let entity = self.tracked_entity(id)?;
        let descriptor = self
            .descriptor(ActionType::Update, &entity, &entity.status)
            .with_stream(StreamType::Preview);
        Some(self.base.log_action(descriptor))
    }

    pub fn on_entity_deleted(&self, id: u64) -> Option<LogOutcome> {
        let entity = self.tracked_entity(id)?;
        Some(self.base.log_action(self.descriptor(ActionType::Delete, &entity, "trash")))
    }

    /// Metadata changed on a published document.
    pub fn on_entity_meta_changed(&self, id: u64, key: &str, value: &Value) -> Option<LogOutcome> {
        let entity = self.tracked_entity(id)?;
        if !entity.is_published() {
            return None;
        }
        if !self.base.should_track_meta(key, value, MetaOwner::Entity(id)) {
            return None;
        }
        Some(self.base.log_action(self.descriptor(ActionType::Update, &entity, "publish")))
    }
}

impl Monitor for PostMonitor {
    fn name(&self) -> &str {
        NAME
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn on_event(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::EntitySaved {
                entity_id,
                previous_status,
            } => {
                self.on_entity_saved(*entity_id, previous_status.as_deref());
            }
            ChangeEvent::EntityPreviewed { entity_id } => {
                self.on_entity_previewed(*entity_id);
            }
            ChangeEvent::EntityDeleted { entity_id } => {
                self.on_entity_deleted(*entity_id);
            }
            ChangeEvent::EntityMetaChanged {
                entity_id,
                meta_key,
                meta_value,
            } => {
                self.on_entity_meta_changed(*entity_id, meta_key, meta_value);
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
