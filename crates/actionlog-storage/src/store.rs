//! Persistence abstraction for action records.
//!
//! The engine talks to storage only through `ActionRecordStore`, so tests
//! can swap in a failing or recording implementation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use actionlog_core::error::Result;
use actionlog_core::types::{ActionRecord, ActionType, Visibility};

use crate::dedup::DedupKey;
use crate::queries::ActionFilter;

/// Metadata key for the referenced entity's status.
pub const META_STATUS: &str = "referenced_node_status";
/// Metadata key for the referenced entity's routing hint.
pub const META_REST_BASE: &str = "referenced_node_rest_base";
/// Metadata key for the action type.
pub const META_ACTION_TYPE: &str = "action_type";
/// Metadata key for the referenced entity id.
pub const META_NODE_ID: &str = "referenced_node_id";
/// Metadata key for the referenced entity type.
pub const META_NODE_TYPE: &str = "referenced_node_type";

/// Relationship tag taxonomies attached to every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagTaxonomy {
    NodeDbid,
    NodeType,
    ActionType,
    StreamType,
}

impl TagTaxonomy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagTaxonomy::NodeDbid => "node_dbid",
            TagTaxonomy::NodeType => "node_type",
            TagTaxonomy::ActionType => "action_type",
            TagTaxonomy::StreamType => "stream_type",
        }
    }
}

impl fmt::Display for TagTaxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values needed to insert a fresh record.
#[derive(Debug, Clone)]
pub struct NewActionRecord {
    pub key: DedupKey,
    pub title: String,
    pub action_type: ActionType,
    pub now: DateTime<Utc>,
}

/// Queryable collection of action records.
pub trait ActionRecordStore: Send + Sync {
    /// Look up the record owning `key`.
    fn find_by_key(&self, key: &DedupKey) -> Result<Option<ActionRecord>>;

    /// Insert a private record tagged with its key facets and action type.
    ///
    /// If a record for the same key was written concurrently, that record is
    /// updated instead and its id returned.
    fn insert(&self, record: &NewActionRecord) -> Result<Uuid>;

    /// Replace the title and bump `modified_at`.
    fn update_title(&self, id: Uuid, title: &str, now: DateTime<Utc>) -> Result<()>;

    /// Set the single term for `taxonomy` on a record.
    fn set_tag(&self, id: Uuid, taxonomy: TagTaxonomy, term: &str) -> Result<()>;

    /// Upsert one auxiliary metadata value.
    fn set_meta(&self, id: Uuid, key: &str, value: &str) -> Result<()>;

    fn set_visibility(&self, id: Uuid, visibility: Visibility) -> Result<()>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<ActionRecord>>;

    /// All raw metadata rows of a record.
    fn metadata(&self, id: Uuid) -> Result<BTreeMap<String, String>>;

    fn list(&self, filter: &ActionFilter) -> Result<Vec<ActionRecord>>;

    fn count(&self) -> Result<u64>;

    /// Delete records last modified strictly before `cutoff`. Returns the
    /// number of records removed.
    fn delete_modified_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
