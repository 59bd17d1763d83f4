//! Domain types shared by every action log crate.
//!
//! Covers the persisted `ActionRecord`, the `ActionDescriptor` accepted by
//! the engine, and the host snapshot types monitors read while translating
//! change notifications.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Kind of change an action record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    RefetchAll,
    NonNodeRootFields,
    DiffSchemas,
}

impl ActionType {
    /// Actions that are not tied to a single entity and carry sentinel ids.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            ActionType::RefetchAll | ActionType::NonNodeRootFields | ActionType::DiffSchemas
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Create => write!(f, "CREATE"),
            ActionType::Update => write!(f, "UPDATE"),
            ActionType::Delete => write!(f, "DELETE"),
            ActionType::RefetchAll => write!(f, "REFETCH_ALL"),
            ActionType::NonNodeRootFields => write!(f, "NON_NODE_ROOT_FIELDS"),
            ActionType::DiffSchemas => write!(f, "DIFF_SCHEMAS"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(ActionType::Create),
            "UPDATE" => Ok(ActionType::Update),
            "DELETE" => Ok(ActionType::Delete),
            "REFETCH_ALL" => Ok(ActionType::RefetchAll),
            "NON_NODE_ROOT_FIELDS" => Ok(ActionType::NonNodeRootFields),
            "DIFF_SCHEMAS" => Ok(ActionType::DiffSchemas),
            _ => Err(format!("Unknown action type: {}", s)),
        }
    }
}

/// Partition of the log. Content and preview changes never share a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    #[default]
    Content,
    Preview,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Content => write!(f, "CONTENT"),
            StreamType::Preview => write!(f, "PREVIEW"),
        }
    }
}

impl std::str::FromStr for StreamType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONTENT" => Ok(StreamType::Content),
            "PREVIEW" => Ok(StreamType::Preview),
            _ => Err(format!("Unknown stream type: {}", s)),
        }
    }
}

/// Publication state of the action record itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    #[serde(rename = "publish")]
    Public,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Private => write!(f, "private"),
            Visibility::Public => write!(f, "publish"),
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Visibility::Private),
            "publish" => Ok(Visibility::Public),
            _ => Err(format!("Unknown visibility: {}", s)),
        }
    }
}

// =============================================================================
// Node identifiers
// =============================================================================

/// Identifier of the entity an action refers to.
///
/// Usually a numeric database id, but non-entity actions use sentinel
/// strings such as `refetch_all`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric id, when this node id refers to a stored entity.
    pub fn as_numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// Action descriptor
// =============================================================================

/// Input to the engine's `log_action`.
///
/// The four required fields are optional here so an incomplete descriptor
/// can be built and then rejected by validation rather than by the type
/// system at every call site.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action_type: Option<ActionType>,
    pub title: Option<String>,
    pub node_id: Option<NodeId>,
    pub status: Option<String>,
    pub node_type: Option<String>,
    pub rest_base: Option<String>,
    pub stream_type: Option<StreamType>,
    #[serde(default)]
    pub skip_webhook: bool,
}

impl ActionDescriptor {
    /// Descriptor with every required field set.
    pub fn new(
        action_type: ActionType,
        title: impl Into<String>,
        node_id: impl Into<NodeId>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            action_type: Some(action_type),
            title: Some(title.into()),
            node_id: Some(node_id.into()),
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_rest_base(mut self, rest_base: impl Into<String>) -> Self {
        self.rest_base = Some(rest_base.into());
        self
    }

    pub fn with_stream(mut self, stream_type: StreamType) -> Self {
        self.stream_type = Some(stream_type);
        self
    }

    pub fn skip_webhook(mut self) -> Self {
        self.skip_webhook = true;
        self
    }

    /// Fill every unset field from `defaults`. Fields already set win.
    pub fn merged_over(self, defaults: ActionDescriptor) -> Self {
        Self {
            action_type: self.action_type.or(defaults.action_type),
            title: self.title.or(defaults.title),
            node_id: self.node_id.or(defaults.node_id),
            status: self.status.or(defaults.status),
            node_type: self.node_type.or(defaults.node_type),
            rest_base: self.rest_base.or(defaults.rest_base),
            stream_type: self.stream_type.or(defaults.stream_type),
            skip_webhook: self.skip_webhook || defaults.skip_webhook,
        }
    }

    /// Name of the first missing required field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.action_type.is_none() {
            return Some("action_type");
        }
        if self.title.is_none() {
            return Some("title");
        }
        if self.node_id.as_ref().map_or(true, NodeId::is_empty) {
            return Some("node_id");
        }
        if self.status.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return Some("status");
        }
        None
    }
}

// =============================================================================
// Action record
// =============================================================================

/// A persisted, deduplicated log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub action_type: ActionType,
    pub node_id: NodeId,
    pub node_type: String,
    pub status: String,
    pub rest_base: Option<String>,
    pub stream_type: StreamType,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

// =============================================================================
// Host snapshots
// =============================================================================

/// A document-like entity in the host repository (post, page, attachment).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntity {
    pub id: u64,
    pub entity_type: String,
    #[serde(default)]
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub author: Option<u64>,
}

impl ContentEntity {
    pub fn is_published(&self) -> bool {
        self.status == "publish"
    }
}

/// Registration details of a document type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTypeInfo {
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub publicly_queryable: bool,
    #[serde(default)]
    pub show_in_rest: bool,
    #[serde(default)]
    pub rest_base: Option<String>,
}

/// Registration details of a taxonomy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyInfo {
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub show_in_rest: bool,
    #[serde(default)]
    pub hierarchical: bool,
    #[serde(default)]
    pub rest_base: Option<String>,
}

/// A taxonomy term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: u64,
    pub taxonomy: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<u64>,
}

/// A user account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub display_name: String,
}

/// A navigation menu.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavMenu {
    pub id: u64,
    pub name: String,
}
