//! SQLite-backed `ActionRecordStore`.
//!
//! Records live in `action_records`; their dedup facets and action type are
//! relationship tags in `action_record_tags`, and referenced-entity details
//! are rows in `action_record_meta`. Both side tables cascade on delete.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;
use uuid::Uuid;

use actionlog_core::error::{ActionLogError, Result};
use actionlog_core::types::{ActionRecord, ActionType, NodeId, StreamType, Visibility};

use crate::db::Database;
use crate::dedup::DedupKey;
use crate::queries::ActionFilter;
use crate::store::{ActionRecordStore, NewActionRecord, TagTaxonomy};

const SELECT_RECORD: &str = "SELECT r.id, r.title, r.slug, r.visibility, r.created_at, r.modified_at,
        (SELECT term FROM action_record_tags WHERE record_id = r.id AND taxonomy = 'action_type'),
        (SELECT term FROM action_record_tags WHERE record_id = r.id AND taxonomy = 'stream_type'),
        (SELECT term FROM action_record_tags WHERE record_id = r.id AND taxonomy = 'node_dbid'),
        (SELECT term FROM action_record_tags WHERE record_id = r.id AND taxonomy = 'node_type'),
        (SELECT meta_value FROM action_record_meta WHERE record_id = r.id AND meta_key = 'referenced_node_status'),
        (SELECT meta_value FROM action_record_meta WHERE record_id = r.id AND meta_key = 'referenced_node_rest_base')
     FROM action_records r";

/// Repository for action records.
pub struct ActionRecordRepository {
    db: Arc<Database>,
}

impl ActionRecordRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Count records grouped by visibility: `(public, private)`.
    pub fn count_by_visibility(&self) -> Result<(u64, u64)> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN visibility = 'publish' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN visibility = 'private' THEN 1 ELSE 0 END), 0)
                 FROM action_records",
                [],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
            )
            .map_err(|e| ActionLogError::Storage(format!("Visibility count failed: {}", e)))
        })
    }

    fn query_one(&self, where_sql: &str, param: String) -> Result<Option<ActionRecord>> {
        self.db.with_conn(|conn| {
            let sql = format!("{} {}", SELECT_RECORD, where_sql);
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| ActionLogError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![param], |row| Ok(row_to_action_record(row)))
                .optional()
                .map_err(|e| ActionLogError::Storage(e.to_string()))?;

            match result {
                Some(record) => Ok(Some(record?)),
                None => Ok(None),
            }
        })
    }
}

impl ActionRecordStore for ActionRecordRepository {
    fn find_by_key(&self, key: &DedupKey) -> Result<Option<ActionRecord>> {
        self.query_one("WHERE r.dedup_key = ?1", key.encode())
    }

    fn insert(&self, record: &NewActionRecord) -> Result<Uuid> {
        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| ActionLogError::Storage(format!("Failed to begin insert: {}", e)))?;

            let now = record.now.timestamp();
            let slug = slugify(&format!("{}-{}", record.title, now));
            let id_str: String = tx
                .query_row(
                    "INSERT INTO action_records (id, dedup_key, title, slug, visibility, created_at, modified_at)
                     VALUES (?1, ?2, ?3, ?4, 'private', ?5, ?5)
                     ON CONFLICT(dedup_key) DO UPDATE SET
                        title = excluded.title,
                        modified_at = excluded.modified_at
                     RETURNING id",
                    rusqlite::params![
                        Uuid::new_v4().to_string(),
                        record.key.encode(),
                        record.title,
                        slug,
                        now,
                    ],
                    |row| row.get(0),
                )
                .map_err(|e| ActionLogError::Storage(format!("Failed to insert action record: {}", e)))?;

            let tags = [
                (TagTaxonomy::NodeDbid, record.key.node_id.to_string()),
                (TagTaxonomy::NodeType, record.key.node_type.clone()),
                (TagTaxonomy::StreamType, record.key.stream_type.to_string()),
                (TagTaxonomy::ActionType, record.action_type.to_string()),
            ];
            for (taxonomy, term) in &tags {
                upsert_tag(&tx, &id_str, *taxonomy, term)?;
            }

            tx.commit()
                .map_err(|e| ActionLogError::Storage(format!("Failed to commit insert: {}", e)))?;

            debug!(id = %id_str, key = %record.key, "Action record written");
            parse_uuid(&id_str)
        })
    }

    fn update_title(&self, id: Uuid, title: &str, now: DateTime<Utc>) -> Result<()> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE action_records SET title = ?1, modified_at = ?2 WHERE id = ?3",
                    rusqlite::params![title, now.timestamp(), id.to_string()],
                )
                .map_err(|e| ActionLogError::Storage(format!("Failed to update action record: {}", e)))?;
            if changed == 0 {
                return Err(ActionLogError::Storage(format!(
                    "Action record not found: {}",
                    id
                )));
            }
            Ok(())
        })
    }

    fn set_tag(&self, id: Uuid, taxonomy: TagTaxonomy, term: &str) -> Result<()> {
        self.db
            .with_conn(|conn| upsert_tag(conn, &id.to_string(), taxonomy, term))
    }

    fn set_meta(&self, id: Uuid, key: &str, value: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO action_record_meta (record_id, meta_key, meta_value)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(record_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value",
                rusqlite::params![id.to_string(), key, value],
            )
            .map_err(|e| ActionLogError::Storage(format!("Failed to set meta {}: {}", key, e)))?;
            Ok(())
        })
    }

    fn set_visibility(&self, id: Uuid, visibility: Visibility) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE action_records SET visibility = ?1 WHERE id = ?2",
                rusqlite::params![visibility.to_string(), id.to_string()],
            )
            .map_err(|e| ActionLogError::Storage(format!("Failed to set visibility: {}", e)))?;
            Ok(())
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<ActionRecord>> {
        self.query_one("WHERE r.id = ?1", id.to_string())
    }

    fn metadata(&self, id: Uuid) -> Result<BTreeMap<String, String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT meta_key, meta_value FROM action_record_meta
                     WHERE record_id = ?1 ORDER BY meta_key",
                )
                .map_err(|e| ActionLogError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![id.to_string()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| ActionLogError::Storage(e.to_string()))?;

            let mut meta = BTreeMap::new();
            for row in rows {
                let (key, value) = row.map_err(|e| ActionLogError::Storage(e.to_string()))?;
                meta.insert(key, value);
            }
            Ok(meta)
        })
    }

    fn list(&self, filter: &ActionFilter) -> Result<Vec<ActionRecord>> {
        self.db.with_conn(|conn| {
            let (where_sql, mut params) = filter.where_clause();
            let next = params.len();
            let sql = format!(
                "{} {} ORDER BY r.modified_at DESC, r.created_at DESC LIMIT ?{} OFFSET ?{}",
                SELECT_RECORD,
                where_sql,
                next + 1,
                next + 2,
            );
            params.push(Box::new(filter.effective_limit() as i64));
            params.push(Box::new(filter.offset as i64));

            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| ActionLogError::Storage(format!("List query prepare: {}", e)))?;

            let rows = stmt
                .query_map(params_refs.as_slice(), |row| Ok(row_to_action_record(row)))
                .map_err(|e| ActionLogError::Storage(format!("List query: {}", e)))?;

            let mut records = Vec::new();
            for row in rows {
                let record = row.map_err(|e| ActionLogError::Storage(e.to_string()))??;
                records.push(record);
            }
            Ok(records)
        })
    }

    fn count(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM action_records", [], |row| row.get(0))
                .map_err(|e| ActionLogError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    fn delete_modified_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM action_records WHERE modified_at < ?1",
                rusqlite::params![cutoff.timestamp()],
            )
            .map_err(|e| ActionLogError::Storage(format!("Failed to delete stale records: {}", e)))
        })
    }
}

fn upsert_tag(
    conn: &rusqlite::Connection,
    record_id: &str,
    taxonomy: TagTaxonomy,
    term: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO action_record_tags (record_id, taxonomy, term)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(record_id, taxonomy) DO UPDATE SET term = excluded.term",
        rusqlite::params![record_id, taxonomy.as_str(), term],
    )
    .map_err(|e| ActionLogError::Storage(format!("Failed to set {} tag: {}", taxonomy, e)))?;
    Ok(())
}

fn row_to_action_record(row: &rusqlite::Row<'_>) -> Result<ActionRecord> {
    let get_err = |e: rusqlite::Error| ActionLogError::Storage(e.to_string());

    let id_str: String = row.get(0).map_err(get_err)?;
    let title: String = row.get(1).map_err(get_err)?;
    let slug: String = row.get(2).map_err(get_err)?;
    let visibility: String = row.get(3).map_err(get_err)?;
    let created_at: i64 = row.get(4).map_err(get_err)?;
    let modified_at: i64 = row.get(5).map_err(get_err)?;
    let action_type: Option<String> = row.get(6).map_err(get_err)?;
    let stream_type: Option<String> = row.get(7).map_err(get_err)?;
    let node_id: Option<String> = row.get(8).map_err(get_err)?;
    let node_type: Option<String> = row.get(9).map_err(get_err)?;
    let status: Option<String> = row.get(10).map_err(get_err)?;
    let rest_base: Option<String> = row.get(11).map_err(get_err)?;

    let action_type = action_type
        .ok_or_else(|| {
            ActionLogError::Storage(format!("Action record {} has no action_type tag", id_str))
        })?
        .parse::<ActionType>()
        .map_err(ActionLogError::Storage)?;

    let stream_type = match stream_type {
        Some(s) => s.parse::<StreamType>().map_err(ActionLogError::Storage)?,
        None => StreamType::Content,
    };

    Ok(ActionRecord {
        id: parse_uuid(&id_str)?,
        title,
        slug,
        action_type,
        node_id: NodeId::new(node_id.unwrap_or_default()),
        node_type: node_type.unwrap_or_else(|| "unknown".to_string()),
        status: status.unwrap_or_default(),
        rest_base: rest_base.filter(|r| !r.is_empty()),
        stream_type,
        visibility: visibility
            .parse::<Visibility>()
            .map_err(ActionLogError::Storage)?,
        created_at: from_epoch(created_at),
        modified_at: from_epoch(modified_at),
    })
}

fn parse_uuid(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|e| ActionLogError::Storage(format!("Invalid UUID: {}", e)))
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// Lowercase ASCII slug with single dashes between words.
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_end_matches('-');
    trimmed.chars().take(200).collect()
}

trait OptionalExt<T> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{META_NODE_ID, META_REST_BASE, META_STATUS};

    fn make_db() -> Arc<Database> {
        Arc::new(Database::in_memory().unwrap())
    }

    fn make_repo() -> ActionRecordRepository {
        ActionRecordRepository::new(make_db())
    }

    fn key(node_id: u64, stream: StreamType) -> DedupKey {
        DedupKey::new(&NodeId::from(node_id), "post", stream)
    }

    fn new_record(node_id: u64, stream: StreamType, title: &str) -> NewActionRecord {
        NewActionRecord {
            key: key(node_id, stream),
            title: title.to_string(),
            action_type: ActionType::Create,
            now: Utc::now(),
        }
    }

    // ========================================================================
    // Insert and lookup
    // ========================================================================

    #[test]
    fn test_insert_and_find_by_key() {
        let repo = make_repo();
        let id = repo
            .insert(&new_record(42, StreamType::Content, "Hello World"))
            .unwrap();

        let found = repo.find_by_key(&key(42, StreamType::Content)).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.title, "Hello World");
        assert_eq!(found.action_type, ActionType::Create);
        assert_eq!(found.node_id, NodeId::from(42u64));
        assert_eq!(found.node_type, "post");
        assert_eq!(found.stream_type, StreamType::Content);
        assert_eq!(found.visibility, Visibility::Private);
        assert!(found.slug.starts_with("hello-world-"));
    }

    #[test]
    fn test_find_by_key_misses_other_stream() {
        let repo = make_repo();
        repo.insert(&new_record(42, StreamType::Content, "A")).unwrap();
        assert!(repo
            .find_by_key(&key(42, StreamType::Preview))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_insert_same_key_collapses_to_one_record() {
        let repo = make_repo();
        let first = repo.insert(&new_record(7, StreamType::Content, "First")).unwrap();
        let second = repo.insert(&new_record(7, StreamType::Content, "Second")).unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.count().unwrap(), 1);
        let found = repo.find_by_id(first).unwrap().unwrap();
        assert_eq!(found.title, "Second");
    }

    #[test]
    fn test_find_by_id_nonexistent() {
        let repo = make_repo();
        assert!(repo.find_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    // ========================================================================
    // Updates
    // ========================================================================

    #[test]
    fn test_update_title_bumps_modified_at() {
        let repo = make_repo();
        let mut record = new_record(1, StreamType::Content, "Old");
        record.now = Utc::now() - chrono::Duration::days(2);
        let id = repo.insert(&record).unwrap();

        let now = Utc::now();
        repo.update_title(id, "New", now).unwrap();

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.title, "New");
        assert_eq!(found.modified_at.timestamp(), now.timestamp());
        assert!(found.created_at < found.modified_at);
    }

    #[test]
    fn test_update_title_missing_record_errors() {
        let repo = make_repo();
        let result = repo.update_title(Uuid::new_v4(), "x", Utc::now());
        assert!(matches!(result, Err(ActionLogError::Storage(_))));
    }

    #[test]
    fn test_set_tag_replaces_term() {
        let repo = make_repo();
        let id = repo.insert(&new_record(3, StreamType::Content, "T")).unwrap();

        repo.set_tag(id, TagTaxonomy::ActionType, "DELETE").unwrap();
        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.action_type, ActionType::Delete);
    }

    #[test]
    fn test_set_tag_on_missing_record_fails() {
        let repo = make_repo();
        let result = repo.set_tag(Uuid::new_v4(), TagTaxonomy::NodeType, "post");
        assert!(result.is_err());
    }

    #[test]
    fn test_set_meta_and_read_back() {
        let repo = make_repo();
        let id = repo.insert(&new_record(3, StreamType::Content, "T")).unwrap();

        repo.set_meta(id, META_STATUS, "draft").unwrap();
        repo.set_meta(id, META_STATUS, "publish").unwrap();
        repo.set_meta(id, META_REST_BASE, "posts").unwrap();
        repo.set_meta(id, META_NODE_ID, "3").unwrap();

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.status, "publish");
        assert_eq!(found.rest_base.as_deref(), Some("posts"));

        let meta = repo.metadata(id).unwrap();
        assert_eq!(meta.len(), 3);
        assert_eq!(meta.get(META_NODE_ID).map(String::as_str), Some("3"));
    }

    #[test]
    fn test_set_visibility() {
        let repo = make_repo();
        let id = repo.insert(&new_record(5, StreamType::Content, "T")).unwrap();
        repo.set_visibility(id, Visibility::Public).unwrap();
        assert_eq!(
            repo.find_by_id(id).unwrap().unwrap().visibility,
            Visibility::Public
        );
        assert_eq!(repo.count_by_visibility().unwrap(), (1, 0));
    }

    // ========================================================================
    // Listing
    // ========================================================================

    #[test]
    fn test_list_public_only_by_default() {
        let repo = make_repo();
        let public = repo.insert(&new_record(1, StreamType::Content, "Public")).unwrap();
        repo.set_visibility(public, Visibility::Public).unwrap();
        repo.insert(&new_record(1, StreamType::Preview, "Preview")).unwrap();

        let listed = repo.list(&ActionFilter::default()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, public);

        let all = repo
            .list(&ActionFilter {
                public_only: false,
                ..ActionFilter::default()
            })
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_list_filters_stream_and_action() {
        let repo = make_repo();
        repo.insert(&new_record(1, StreamType::Content, "A")).unwrap();
        let preview = repo.insert(&new_record(2, StreamType::Preview, "B")).unwrap();
        repo.set_tag(preview, TagTaxonomy::ActionType, "UPDATE").unwrap();

        let filter = ActionFilter {
            public_only: false,
            stream_type: Some(StreamType::Preview),
            ..ActionFilter::default()
        };
        let listed = repo.list(&filter).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, preview);

        let filter = ActionFilter {
            public_only: false,
            action_type: Some(ActionType::Create),
            ..ActionFilter::default()
        };
        let listed = repo.list(&filter).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "A");
    }

    #[test]
    fn test_list_orders_newest_first_and_paginates() {
        let repo = make_repo();
        for i in 0..5u64 {
            let mut record = new_record(i, StreamType::Content, &format!("R{}", i));
            record.now = Utc::now() - chrono::Duration::minutes(10 - i as i64);
            repo.insert(&record).unwrap();
        }

        let filter = ActionFilter {
            public_only: false,
            limit: 2,
            offset: 1,
            ..ActionFilter::default()
        };
        let listed = repo.list(&filter).unwrap();
        let titles: Vec<_> = listed.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["R3", "R2"]);
    }

    #[test]
    fn test_list_since() {
        let repo = make_repo();
        let mut old = new_record(1, StreamType::Content, "Old");
        old.now = Utc::now() - chrono::Duration::days(3);
        repo.insert(&old).unwrap();
        repo.insert(&new_record(2, StreamType::Content, "New")).unwrap();

        let filter = ActionFilter {
            public_only: false,
            since: Some(Utc::now() - chrono::Duration::days(1)),
            ..ActionFilter::default()
        };
        let listed = repo.list(&filter).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "New");
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    #[test]
    fn test_delete_modified_before_cascades() {
        let repo = make_repo();
        let mut stale = new_record(1, StreamType::Content, "Stale");
        stale.now = Utc::now() - chrono::Duration::days(10);
        let stale_id = repo.insert(&stale).unwrap();
        repo.set_meta(stale_id, META_STATUS, "publish").unwrap();
        let fresh_id = repo.insert(&new_record(2, StreamType::Content, "Fresh")).unwrap();

        let deleted = repo
            .delete_modified_before(Utc::now() - chrono::Duration::days(7))
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.find_by_id(stale_id).unwrap().is_none());
        assert!(repo.metadata(stale_id).unwrap().is_empty());
        assert!(repo.find_by_id(fresh_id).unwrap().is_some());

        let orphan_tags: i64 = repo
            .database()
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM action_record_tags WHERE record_id = ?1",
                    rusqlite::params![stale_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| ActionLogError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(orphan_tags, 0);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!-1700000000"), "hello-world-1700000000");
        assert_eq!(slugify("  --Café  "), "caf");
        assert_eq!(slugify(""), "");
    }
}
