//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use actionlog_core::events::ChangeEvent;
use actionlog_core::types::{ActionRecord, ActionType, NodeId, StreamType, Visibility};
use actionlog_monitor::{ContentHost, DispatchReport, HostCatalog};
use actionlog_storage::{ActionFilter, ActionRecordStore, GarbageCollector, DEFAULT_LIMIT};

use crate::auth::is_authenticated;
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// `CONTENT` or `PREVIEW`, case-insensitive.
    pub stream: Option<String>,
    pub action_type: Option<String>,
    /// Epoch seconds.
    pub since: Option<i64>,
}

impl ListParams {
    /// Translate query parameters into a storage filter. Private records are
    /// only included for authenticated callers.
    pub fn to_filter(&self, authenticated: bool) -> Result<ActionFilter, ApiError> {
        let stream_type = self
            .stream
            .as_deref()
            .map(|s| s.to_ascii_uppercase().parse::<StreamType>())
            .transpose()
            .map_err(ApiError::BadRequest)?;
        let action_type = self
            .action_type
            .as_deref()
            .map(|s| s.to_ascii_uppercase().parse::<ActionType>())
            .transpose()
            .map_err(ApiError::BadRequest)?;
        let since = match self.since {
            Some(secs) => Some(DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
                ApiError::BadRequest(format!("'since' out of range: {}", secs))
            })?),
            None => None,
        };

        Ok(ActionFilter {
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
            offset: self.offset.unwrap_or(0),
            stream_type,
            action_type,
            since,
            public_only: !authenticated,
        })
    }
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencedNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub status: String,
    pub rest_base: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecordResponse {
    pub id: Uuid,
    pub title: String,
    pub action_type: ActionType,
    pub stream_type: StreamType,
    pub modified_at: DateTime<Utc>,
    pub referenced_node: ReferencedNode,
    /// Raw metadata rows, only present in debug mode.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionListResponse {
    pub actions: Vec<ActionRecordResponse>,
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub public_records: u64,
    pub private_records: u64,
    pub webhook_configured: bool,
    pub monitors: Vec<String>,
}

/// Request body for POST /events.
///
/// One body is one request lifetime. `*_about_to_delete` events must travel
/// in the same batch as their `*_deleted` follow-up, since the snapshots
/// they take are dropped when the request ends.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Host snapshot merged into the mirror before any event is handled.
    #[serde(default)]
    pub catalog: Option<HostCatalog>,
    #[serde(default)]
    pub events: Vec<ChangeEvent>,
}

/// Response for POST /events.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Events received in the batch.
    pub events: usize,
    /// Monitor callbacks run across all events.
    pub deliveries: usize,
    /// Records created or updated.
    pub logged: usize,
    pub dispatch: DispatchReport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GcResponse {
    pub deleted: usize,
}

// =============================================================================
// Record rendering
// =============================================================================

/// Renders stored records into their public JSON shape.
struct RecordRenderer<'a> {
    state: &'a AppState,
    tracked_post_types: Vec<String>,
}

impl<'a> RecordRenderer<'a> {
    fn new(state: &'a AppState) -> Self {
        Self {
            state,
            tracked_post_types: state.engine().tracked_post_types(),
        }
    }

    /// Fixed rest bases for menus, tags and users; tracked post types use
    /// the host registration; everything else keeps what was stored.
    fn rest_base(&self, record: &ActionRecord) -> Option<String> {
        match record.node_type.as_str() {
            "menu" => Some("menus".to_string()),
            "post_tag" => Some("tags".to_string()),
            "user" => Some("users".to_string()),
            node_type if self.tracked_post_types.iter().any(|t| t == node_type) => {
                self.state
                    .host
                    .post_type(node_type)
                    .and_then(|p| p.rest_base)
                    .or_else(|| record.rest_base.clone())
            }
            _ => record.rest_base.clone(),
        }
    }

    fn render(&self, record: ActionRecord) -> Result<ActionRecordResponse, ApiError> {
        let metadata = if self.state.config.settings.debug {
            Some(self.state.repo.metadata(record.id)?)
        } else {
            None
        };
        let rest_base = self.rest_base(&record);
        Ok(ActionRecordResponse {
            id: record.id,
            title: record.title,
            action_type: record.action_type,
            stream_type: record.stream_type,
            modified_at: record.modified_at,
            referenced_node: ReferencedNode {
                id: record.node_id,
                node_type: record.node_type,
                status: record.status,
                rest_base,
            },
            metadata,
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let (public_records, private_records) = state.repo.count_by_visibility()?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        public_records,
        private_records,
        webhook_configured: state.config.settings.has_webhook(),
        monitors: state
            .registry
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }))
}

/// GET /actions - list records, newest first.
pub async fn list_actions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<ActionListResponse>, ApiError> {
    let filter = params.to_filter(is_authenticated(&headers, &state))?;
    let records = state.repo.list(&filter)?;

    let renderer = RecordRenderer::new(&state);
    let actions = records
        .into_iter()
        .map(|r| renderer.render(r))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ActionListResponse {
        actions,
        offset: filter.offset,
        limit: filter.effective_limit(),
    }))
}

/// GET /actions/{id} - one record. Private records are hidden from
/// unauthenticated callers.
pub async fn get_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ActionRecordResponse>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid record id: {}", id)))?;
    let not_found = || ApiError::NotFound(format!("Action record {} not found", id));

    let record = state.repo.find_by_id(id)?.ok_or_else(not_found)?;
    if record.visibility != Visibility::Public && !is_authenticated(&headers, &state) {
        return Err(not_found());
    }

    Ok(Json(RecordRenderer::new(&state).render(record)?))
}

/// POST /events - handle one batch of host change events as a single
/// request lifetime.
pub async fn ingest_events(
    State(state): State<AppState>,
    Json(body): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let catalog = body.catalog.filter(|c| !c.is_empty());
    if catalog.is_none() && body.events.is_empty() {
        return Err(ApiError::BadRequest(
            "Request must carry a catalog or at least one event".to_string(),
        ));
    }
    if let Some(catalog) = catalog {
        state.host.merge(catalog);
    }

    let engine = state.engine();
    let deliveries = {
        let monitors = state.registry.build(&engine);
        let mut deliveries = 0;
        for event in &body.events {
            let handled = monitors.handle(event);
            if handled == 0 {
                debug!(event = ?event.kind(), "No monitor subscribed to event");
            }
            deliveries += handled;
            state.host.forget(event);
        }
        deliveries
    };

    let dispatch = state.dispatcher.on_request_end(&engine).await;
    let logged = engine.logged_count();
    info!(
        events = body.events.len(),
        logged,
        dispatched = dispatch.fired(),
        "Ingested change events"
    );

    Ok(Json(IngestResponse {
        events: body.events.len(),
        deliveries,
        logged,
        dispatch,
    }))
}

/// POST /actions/gc - prune records past the retention window.
pub async fn run_gc(State(state): State<AppState>) -> Result<Json<GcResponse>, ApiError> {
    let deleted = GarbageCollector::new().sweep(state.repo.as_ref())?;
    Ok(Json(GcResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_to_filter() {
        let params = ListParams {
            limit: Some(10),
            offset: Some(5),
            stream: Some("preview".to_string()),
            action_type: Some("delete".to_string()),
            since: Some(1_700_000_000),
        };
        let filter = params.to_filter(false).unwrap();
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.offset, 5);
        assert_eq!(filter.stream_type, Some(StreamType::Preview));
        assert_eq!(filter.action_type, Some(ActionType::Delete));
        assert_eq!(filter.since.unwrap().timestamp(), 1_700_000_000);
        assert!(filter.public_only);

        assert!(!ListParams::default().to_filter(true).unwrap().public_only);
    }

    #[test]
    fn test_list_params_rejects_unknown_values() {
        let params = ListParams {
            stream: Some("draft".to_string()),
            ..ListParams::default()
        };
        assert!(matches!(params.to_filter(false), Err(ApiError::BadRequest(_))));

        let params = ListParams {
            since: Some(i64::MAX),
            ..ListParams::default()
        };
        assert!(matches!(params.to_filter(false), Err(ApiError::BadRequest(_))));
    }
}
