//! Turso Embedded / libSQL content store.
//!
//! The [`Storage`] struct wraps a libSQL database holding content items,
//! their metadata, taxonomy assignments, and media attachments, and
//! implements the [`ContentStore`] contract.
//!
//! **Access rules:**
//! - Provisioning hosts: read-write via [`Storage::open`]
//! - Reporting tools: read-only via [`Storage::open_readonly`]

mod contract;
mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, Value as SqlValue, params, params_from_iter};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use pageforge_shared::{
    ContentItem, ContentStatus, ContentType, ItemFilter, ItemId, ItemPatch, Keyword, Location,
    MediaRef, Metadata, NewContentItem, PageForgeError, Result, Taxonomy,
};

pub use contract::ContentStore;

/// Metadata key holding the featured media id.
pub const THUMBNAIL_META_KEY: &str = "_thumbnail_id";

const ITEM_COLUMNS: &str = "id, content_type, title, body, slug, excerpt, status, author, \
     parent_id, keyword_term, keyword_value, location_name, auto_generated, created_at, updated_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    /// Serializes multi-statement writes on the shared connection.
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PageForgeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
            write_lock: Mutex::new(()),
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
            write_lock: Mutex::new(()),
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    PageForgeError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PageForgeError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Item writes
    // -----------------------------------------------------------------------

    /// Insert an item and its metadata in one transaction.
    ///
    /// Returns `None` when the landing dedup index already holds the key.
    /// Caller must hold `write_lock`.
    async fn insert_item(&self, item: &NewContentItem) -> Result<Option<ItemId>> {
        let base = item
            .slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| pageforge_sanitize::sanitize_title(&item.title));
        let slug = self.unique_slug(&base).await?;
        let now = timestamp(Utc::now());

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        let inserted = tx
            .execute(
                "INSERT INTO content_items (content_type, title, body, slug, excerpt, status, author,
                    parent_id, keyword_term, keyword_value, location_name, auto_generated, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(keyword_term, location_name)
                   WHERE content_type = 'landing' AND auto_generated = 1
                 DO NOTHING",
                params_from_iter(vec![
                    SqlValue::Text(item.kind().as_str().to_string()),
                    SqlValue::Text(item.title.clone()),
                    SqlValue::Text(item.body.clone()),
                    slug.map_or(SqlValue::Null, SqlValue::Text),
                    opt_text(item.excerpt.as_deref()),
                    SqlValue::Text(item.status.as_str().to_string()),
                    opt_text(item.author.as_deref()),
                    item.parent_id.map_or(SqlValue::Null, |p| SqlValue::Integer(p.0)),
                    opt_text(item.keyword.as_ref().map(|k| k.term.as_str())),
                    item.keyword.as_ref().map_or(SqlValue::Null, |k| SqlValue::Real(k.value)),
                    opt_text(item.location.as_ref().map(|l| l.name.as_str())),
                    SqlValue::Integer(i64::from(item.auto_generated)),
                    SqlValue::Text(now.clone()),
                    SqlValue::Text(now),
                ]),
            )
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        if inserted == 0 {
            return Ok(None);
        }

        let id = ItemId(tx.last_insert_rowid());
        for (key, value) in &item.metadata {
            tx.execute(
                "INSERT INTO item_meta (item_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
                params![id.0, key.as_str(), encode_meta(value)?],
            )
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        debug!(%id, content_type = %item.kind(), "content item inserted");
        Ok(Some(id))
    }

    /// Pick a free slug: `base`, then `base-2`, `base-3`, ...
    async fn unique_slug(&self, base: &str) -> Result<Option<String>> {
        if base.is_empty() {
            return Ok(None);
        }
        let mut candidate = base.to_string();
        let mut suffix = 2;
        while self.slug_taken(&candidate).await? {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        Ok(Some(candidate))
    }

    async fn slug_taken(&self, slug: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM content_items WHERE slug = ?1", params![slug])
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;
        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(PageForgeError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Item reads
    // -----------------------------------------------------------------------

    /// Run an item query and hydrate metadata for every row.
    async fn query_items(&self, sql: &str, values: Vec<SqlValue>) -> Result<Vec<ContentItem>> {
        let mut rows = self
            .conn
            .query(sql, params_from_iter(values))
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        let mut items = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?
        {
            items.push(row_to_item(&row)?);
        }

        for item in &mut items {
            item.metadata = self.load_metadata(item.id).await?;
        }
        Ok(items)
    }

    async fn load_metadata(&self, id: ItemId) -> Result<Metadata> {
        let mut rows = self
            .conn
            .query(
                "SELECT meta_key, meta_value FROM item_meta WHERE item_id = ?1",
                params![id.0],
            )
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        let mut metadata = Metadata::new();
        while let Ok(Some(row)) = rows.next().await {
            let key: String = row
                .get(0)
                .map_err(|e| PageForgeError::Storage(e.to_string()))?;
            let raw: String = row
                .get(1)
                .map_err(|e| PageForgeError::Storage(e.to_string()))?;
            let value = serde_json::from_str(&raw)
                .map_err(|e| PageForgeError::Storage(format!("corrupt metadata '{key}': {e}")))?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }

    /// Term names assigned to an item under `taxonomy`, sorted.
    pub async fn get_terms(&self, id: ItemId, taxonomy: Taxonomy) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT t.name FROM item_terms it JOIN terms t ON t.id = it.term_id
                 WHERE it.item_id = ?1 AND it.taxonomy = ?2 ORDER BY t.name",
                params![id.0, taxonomy.as_str()],
            )
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        let mut names = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            names.push(
                row.get::<String>(0)
                    .map_err(|e| PageForgeError::Storage(e.to_string()))?,
            );
        }
        Ok(names)
    }

    /// Media attached to an item, oldest first.
    pub async fn list_media(&self, id: ItemId) -> Result<Vec<MediaRef>> {
        let mut rows = self
            .conn
            .query(
                "SELECT file_path, file_name, mime_type, sha256, source_url, byte_len
                 FROM media WHERE item_id = ?1 ORDER BY id",
                params![id.0],
            )
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        let mut media = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            media.push(MediaRef {
                file_path: row
                    .get(0)
                    .map_err(|e| PageForgeError::Storage(e.to_string()))?,
                file_name: row
                    .get(1)
                    .map_err(|e| PageForgeError::Storage(e.to_string()))?,
                mime_type: row
                    .get(2)
                    .map_err(|e| PageForgeError::Storage(e.to_string()))?,
                sha256: row
                    .get(3)
                    .map_err(|e| PageForgeError::Storage(e.to_string()))?,
                source_url: row
                    .get(4)
                    .map_err(|e| PageForgeError::Storage(e.to_string()))?,
                byte_len: row.get::<i64>(5).map(|v| v as u64).unwrap_or(0),
            });
        }
        Ok(media)
    }
}

#[async_trait]
impl ContentStore for Storage {
    #[instrument(skip_all, fields(content_type = %item.kind(), title = %item.title))]
    async fn create(&self, item: NewContentItem) -> Result<ItemId> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;
        self.insert_item(&item).await?.ok_or_else(|| {
            PageForgeError::Storage(format!(
                "an auto-generated landing item already exists for '{}'",
                item.title
            ))
        })
    }

    #[instrument(skip_all, fields(content_type = %item.kind(), title = %item.title))]
    async fn create_if_absent(
        &self,
        filter: &ItemFilter,
        item: NewContentItem,
    ) -> Result<(ContentItem, bool)> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.find(filter).await?.into_iter().next() {
            return Ok((existing, false));
        }

        match self.insert_item(&item).await? {
            Some(id) => {
                let created = self
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| PageForgeError::Storage(format!("item {id} vanished after insert")))?;
                Ok((created, true))
            }
            None => {
                // Another writer on the same file won the dedup index.
                let existing = self.find(filter).await?.into_iter().next().ok_or_else(|| {
                    PageForgeError::Storage("dedup conflict without a matching item".into())
                })?;
                Ok((existing, false))
            }
        }
    }

    async fn get_by_id(&self, id: ItemId) -> Result<Option<ContentItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM content_items WHERE id = ?1");
        Ok(self
            .query_items(&sql, vec![SqlValue::Integer(id.0)])
            .await?
            .into_iter()
            .next())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ContentItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM content_items
             WHERE slug = ?1 AND content_type IN ('post', 'page') ORDER BY id LIMIT 1"
        );
        Ok(self
            .query_items(&sql, vec![SqlValue::Text(slug.to_string())])
            .await?
            .into_iter()
            .next())
    }

    #[instrument(skip(self, patch), fields(%id))]
    async fn update(&self, id: ItemId, patch: ItemPatch) -> Result<()> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;
        let mut sets = vec!["updated_at = ?1".to_string()];
        let mut values = vec![SqlValue::Text(timestamp(Utc::now()))];

        if let Some(title) = patch.title {
            values.push(SqlValue::Text(title));
            sets.push(format!("title = ?{}", values.len()));
        }
        if let Some(body) = patch.body {
            values.push(SqlValue::Text(body));
            sets.push(format!("body = ?{}", values.len()));
        }
        if let Some(status) = patch.status {
            values.push(SqlValue::Text(status.as_str().to_string()));
            sets.push(format!("status = ?{}", values.len()));
        }
        values.push(SqlValue::Integer(id.0));
        let sql = format!(
            "UPDATE content_items SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len()
        );

        let changed = self
            .conn
            .execute(&sql, params_from_iter(values))
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;
        if changed == 0 {
            return Err(PageForgeError::not_found(format!("content item {id} not found")));
        }
        Ok(())
    }

    async fn find(&self, filter: &ItemFilter) -> Result<Vec<ContentItem>> {
        let (clause, values) = filter_clause(filter);
        let sql = format!("SELECT {ITEM_COLUMNS} FROM content_items{clause} ORDER BY id");
        self.query_items(&sql, values).await
    }

    async fn count(&self, filter: &ItemFilter) -> Result<usize> {
        let (clause, values) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM content_items{clause}");
        let mut rows = self
            .conn
            .query(&sql, params_from_iter(values))
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;
        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) as usize),
            Ok(None) => Ok(0),
            Err(e) => Err(PageForgeError::Storage(e.to_string())),
        }
    }

    #[instrument(skip(self, terms), fields(%id, taxonomy = taxonomy.as_str(), count = terms.len()))]
    async fn set_taxonomy(&self, id: ItemId, taxonomy: Taxonomy, terms: &[String]) -> Result<()> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        tx.execute(
            "DELETE FROM item_terms WHERE item_id = ?1 AND taxonomy = ?2",
            params![id.0, taxonomy.as_str()],
        )
        .await
        .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        for name in terms {
            tx.execute(
                "INSERT OR IGNORE INTO terms (taxonomy, name) VALUES (?1, ?2)",
                params![taxonomy.as_str(), name.as_str()],
            )
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;
            tx.execute(
                "INSERT OR IGNORE INTO item_terms (item_id, term_id, taxonomy)
                 SELECT ?1, id, taxonomy FROM terms WHERE taxonomy = ?2 AND name = ?3",
                params![id.0, taxonomy.as_str(), name.as_str()],
            )
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self, media), fields(%id, file = %media.file_name))]
    async fn attach_media(&self, id: ItemId, media: &MediaRef) -> Result<i64> {
        self.check_writable()?;
        if self.get_by_id(id).await?.is_none() {
            return Err(PageForgeError::not_found(format!("content item {id} not found")));
        }

        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        tx.execute(
            "INSERT INTO media (item_id, file_path, file_name, mime_type, sha256, source_url, byte_len, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.0,
                media.file_path.as_str(),
                media.file_name.as_str(),
                media.mime_type.as_str(),
                media.sha256.as_str(),
                media.source_url.as_str(),
                media.byte_len as i64,
                timestamp(Utc::now()),
            ],
        )
        .await
        .map_err(|e| PageForgeError::Storage(e.to_string()))?;
        let media_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO item_meta (item_id, meta_key, meta_value) VALUES (?1, ?2, ?3)
             ON CONFLICT(item_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value",
            params![id.0, THUMBNAIL_META_KEY, encode_meta(&Value::from(media_id))?],
        )
        .await
        .map_err(|e| PageForgeError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))?;
        Ok(media_id)
    }

    async fn set_metadata(&self, id: ItemId, key: &str, value: Value) -> Result<()> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;
        self.conn
            .execute(
                "INSERT INTO item_meta (item_id, meta_key, meta_value)
                 SELECT id, ?2, ?3 FROM content_items WHERE id = ?1
                 ON CONFLICT(item_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value",
                params![id.0, key, encode_meta(&value)?],
            )
            .await
            .map_err(|e| PageForgeError::Storage(e.to_string()))
            .and_then(|changed| {
                if changed == 0 {
                    Err(PageForgeError::not_found(format!("content item {id} not found")))
                } else {
                    Ok(())
                }
            })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 so text comparison orders chronologically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_text(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, |v| SqlValue::Text(v.to_string()))
}

fn encode_meta(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| PageForgeError::Storage(e.to_string()))
}

/// Build a `WHERE` clause and its positional values from a filter.
fn filter_clause(filter: &ItemFilter) -> (String, Vec<SqlValue>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();

    if let Some(content_type) = filter.content_type {
        values.push(SqlValue::Text(content_type.as_str().to_string()));
        conditions.push(format!("content_type = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(SqlValue::Text(status.as_str().to_string()));
        conditions.push(format!("status = ?{}", values.len()));
    }
    if let Some(auto) = filter.auto_generated {
        values.push(SqlValue::Integer(i64::from(auto)));
        conditions.push(format!("auto_generated = ?{}", values.len()));
    }
    if let Some(term) = &filter.keyword_term {
        values.push(SqlValue::Text(term.clone()));
        conditions.push(format!("keyword_term = ?{}", values.len()));
    }
    if let Some(name) = &filter.location_name {
        values.push(SqlValue::Text(name.clone()));
        conditions.push(format!("location_name = ?{}", values.len()));
    }
    if let Some(since) = filter.created_since {
        values.push(SqlValue::Text(timestamp(since)));
        conditions.push(format!("created_at >= ?{}", values.len()));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PageForgeError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`ContentItem`] with empty metadata.
fn row_to_item(row: &libsql::Row) -> Result<ContentItem> {
    let content_type: String = row
        .get(1)
        .map_err(|e| PageForgeError::Storage(e.to_string()))?;
    let status: String = row
        .get(6)
        .map_err(|e| PageForgeError::Storage(e.to_string()))?;
    let keyword = match row.get::<String>(9).ok() {
        Some(term) => Some(Keyword::new(term, row.get::<f64>(10).unwrap_or(0.0))),
        None => None,
    };

    Ok(ContentItem {
        id: ItemId(
            row.get::<i64>(0)
                .map_err(|e| PageForgeError::Storage(e.to_string()))?,
        ),
        content_type: content_type
            .parse::<ContentType>()
            .map_err(|e| PageForgeError::Storage(e.to_string()))?,
        title: row
            .get::<String>(2)
            .map_err(|e| PageForgeError::Storage(e.to_string()))?,
        body: row
            .get::<String>(3)
            .map_err(|e| PageForgeError::Storage(e.to_string()))?,
        slug: row.get::<String>(4).ok(),
        excerpt: row.get::<String>(5).ok(),
        status: status
            .parse::<ContentStatus>()
            .map_err(|e| PageForgeError::Storage(e.to_string()))?,
        author: row.get::<String>(7).ok(),
        parent_id: row.get::<i64>(8).ok().map(ItemId),
        keyword,
        location: row.get::<String>(11).ok().map(Location::new),
        metadata: Metadata::new(),
        auto_generated: row.get::<i64>(12).unwrap_or(0) != 0,
        created_at: parse_time(
            &row.get::<String>(13)
                .map_err(|e| PageForgeError::Storage(e.to_string()))?,
        )?,
        updated_at: parse_time(
            &row.get::<String>(14)
                .map_err(|e| PageForgeError::Storage(e.to_string()))?,
        )?,
    })
}
