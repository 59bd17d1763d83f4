use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Change notifications emitted by the host content repository.
///
/// Each variant mirrors one typed monitor callback. Events carry ids and,
/// where the monitor needs them, the before/after values of the change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ChangeEvent {
    // =========================================================================
    // Documents
    // =========================================================================
    /// A document was inserted or updated.
    EntitySaved {
        entity_id: u64,
        #[serde(default)]
        previous_status: Option<String>,
    },

    /// A draft/preview revision of a document was saved.
    EntityPreviewed { entity_id: u64 },

    /// A document was permanently deleted.
    EntityDeleted { entity_id: u64 },

    /// Metadata on a document was added, updated or removed.
    EntityMetaChanged {
        entity_id: u64,
        meta_key: String,
        #[serde(default)]
        meta_value: serde_json::Value,
    },

    // =========================================================================
    // Taxonomy terms
    // =========================================================================
    TermCreated { term_id: u64, taxonomy: String },

    /// A term was edited. `parent_before` is the parent prior to the edit.
    TermEdited {
        term_id: u64,
        taxonomy: String,
        #[serde(default)]
        parent_before: Option<u64>,
    },

    /// Fires while the term still exists, before `TermDeleted`. Send both in
    /// the same batch: the snapshot only lives for one request.
    TermAboutToDelete { term_id: u64, taxonomy: String },

    TermDeleted { term_id: u64, taxonomy: String },

    TermMetaChanged {
        term_id: u64,
        meta_key: String,
        #[serde(default)]
        meta_value: serde_json::Value,
    },

    // =========================================================================
    // Users
    // =========================================================================
    /// Profile updated or user registered.
    UserSaved { user_id: u64 },

    /// Fires while the user still exists, before `UserDeleted`. Send both in
    /// the same batch: without the snapshot the delete is not logged.
    UserAboutToDelete {
        user_id: u64,
        #[serde(default)]
        reassign_to: Option<u64>,
    },

    UserDeleted { user_id: u64 },

    UserMetaChanged {
        user_id: u64,
        meta_key: String,
        #[serde(default)]
        meta_value: serde_json::Value,
    },

    // =========================================================================
    // Settings
    // =========================================================================
    OptionUpdated {
        option_name: String,
        #[serde(default)]
        old_value: serde_json::Value,
        #[serde(default)]
        new_value: serde_json::Value,
    },

    // =========================================================================
    // Navigation
    // =========================================================================
    /// Menu-to-location assignments changed. Maps location name to menu id.
    MenuLocationsChanged {
        #[serde(default)]
        old_locations: BTreeMap<String, u64>,
        #[serde(default)]
        new_locations: BTreeMap<String, u64>,
    },

    MenuUpdated { menu_id: u64 },

    MenuDeleted { menu_id: u64 },

    // =========================================================================
    // Media
    // =========================================================================
    MediaAdded { attachment_id: u64 },

    MediaEdited { attachment_id: u64 },

    MediaDeleted { attachment_id: u64 },

    /// An image file was re-saved (cropped, rotated, regenerated).
    MediaFileSaved { attachment_id: u64 },

    // =========================================================================
    // Content model
    // =========================================================================
    /// Registered document types or taxonomies changed shape.
    ContentModelChanged {
        #[serde(default)]
        description: Option<String>,
    },
}

/// Discriminant of a `ChangeEvent`, used for monitor subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    EntitySaved,
    EntityPreviewed,
    EntityDeleted,
    EntityMetaChanged,
    TermCreated,
    TermEdited,
    TermAboutToDelete,
    TermDeleted,
    TermMetaChanged,
    UserSaved,
    UserAboutToDelete,
    UserDeleted,
    UserMetaChanged,
    OptionUpdated,
    MenuLocationsChanged,
    MenuUpdated,
    MenuDeleted,
    MediaAdded,
    MediaEdited,
    MediaDeleted,
    MediaFileSaved,
    ContentModelChanged,
}

impl ChangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChangeEvent::EntitySaved { .. } => EventKind::EntitySaved,
            ChangeEvent::EntityPreviewed { .. } => EventKind::EntityPreviewed,
            ChangeEvent::EntityDeleted { .. } => EventKind::EntityDeleted,
            ChangeEvent::EntityMetaChanged { .. } => EventKind::EntityMetaChanged,
            ChangeEvent::TermCreated { .. } => EventKind::TermCreated,
            ChangeEvent::TermEdited { .. } => EventKind::TermEdited,
            ChangeEvent::TermAboutToDelete { .. } => EventKind::TermAboutToDelete,
            ChangeEvent::TermDeleted { .. } => EventKind::TermDeleted,
            ChangeEvent::TermMetaChanged { .. } => EventKind::TermMetaChanged,
            ChangeEvent::UserSaved { .. } => EventKind::UserSaved,
            ChangeEvent::UserAboutToDelete { .. } => EventKind::UserAboutToDelete,
            ChangeEvent::UserDeleted { .. } => EventKind::UserDeleted,
            ChangeEvent::UserMetaChanged { .. } => EventKind::UserMetaChanged,
            ChangeEvent::OptionUpdated { .. } => EventKind::OptionUpdated,
            ChangeEvent::MenuLocationsChanged { .. } => EventKind::MenuLocationsChanged,
            ChangeEvent::MenuUpdated { .. } => EventKind::MenuUpdated,
            ChangeEvent::MenuDeleted { .. } => EventKind::MenuDeleted,
            ChangeEvent::MediaAdded { .. } => EventKind::MediaAdded,
            ChangeEvent::MediaEdited { .. } => EventKind::MediaEdited,
            ChangeEvent::MediaDeleted { .. } => EventKind::MediaDeleted,
            ChangeEvent::MediaFileSaved { .. } => EventKind::MediaFileSaved,
            ChangeEvent::ContentModelChanged { .. } => EventKind::ContentModelChanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_tagging() {
        let json = r#"{"event": "term_edited", "term_id": 5, "taxonomy": "category", "parent_before": 2}"#;
        let event: ChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ChangeEvent::TermEdited {
                term_id: 5,
                taxonomy: "category".to_string(),
                parent_before: Some(2),
            }
        );
        assert_eq!(event.kind(), EventKind::TermEdited);
    }

    #[test]
    fn test_event_optional_fields_default() {
        let event: ChangeEvent =
            serde_json::from_str(r#"{"event": "entity_saved", "entity_id": 42}"#).unwrap();
        assert_eq!(
            event,
            ChangeEvent::EntitySaved {
                entity_id: 42,
                previous_status: None,
            }
        );

        let event: ChangeEvent =
            serde_json::from_str(r#"{"event": "option_updated", "option_name": "blogname"}"#)
                .unwrap();
        match event {
            ChangeEvent::OptionUpdated { old_value, new_value, .. } => {
                assert!(old_value.is_null());
                assert!(new_value.is_null());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result: Result<ChangeEvent, _> =
            serde_json::from_str(r#"{"event": "comment_posted", "id": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_menu_locations_serialize() {
        let mut new_locations = BTreeMap::new();
        new_locations.insert("primary".to_string(), 3);
        let event = ChangeEvent::MenuLocationsChanged {
            old_locations: BTreeMap::new(),
            new_locations,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "menu_locations_changed");
        assert_eq!(value["new_locations"]["primary"], 3);
    }
}
