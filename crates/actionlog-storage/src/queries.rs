//! Read-side filters for listing action records.

use chrono::{DateTime, Utc};

use actionlog_core::types::{ActionType, StreamType};

/// Default page size for listings.
pub const DEFAULT_LIMIT: u32 = 50;
/// Upper bound on a single listing page.
pub const MAX_LIMIT: u32 = 500;

/// Filters applied when listing records, newest `modified_at` first.
#[derive(Debug, Clone)]
pub struct ActionFilter {
    pub limit: u32,
    pub offset: u32,
    pub stream_type: Option<StreamType>,
    pub action_type: Option<ActionType>,
    /// Only records modified at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Exclude records still in the private state.
    pub public_only: bool,
}

impl Default for ActionFilter {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            stream_type: None,
            action_type: None,
            since: None,
            public_only: true,
        }
    }
}

impl ActionFilter {
    /// Build the WHERE clause and its positional parameters.
    ///
    /// The clause refers to the records table as `r`.
    pub(crate) fn where_clause(&self) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if self.public_only {
            conditions.push("r.visibility = 'publish'".to_string());
        }
        if let Some(stream) = self.stream_type {
            params.push(Box::new(stream.to_string()));
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM action_record_tags t
                         WHERE t.record_id = r.id AND t.taxonomy = 'stream_type' AND t.term = ?{})",
                params.len()
            ));
        }
        if let Some(action) = self.action_type {
            params.push(Box::new(action.to_string()));
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM action_record_tags t
                         WHERE t.record_id = r.id AND t.taxonomy = 'action_type' AND t.term = ?{})",
                params.len()
            ));
        }
        if let Some(since) = self.since {
            params.push(Box::new(since.timestamp()));
            conditions.push(format!("r.modified_at >= ?{}", params.len()));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, params)
    }

    /// Limit clamped to `1..=MAX_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_LIMIT)
    }
}
