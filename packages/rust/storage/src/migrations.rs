//! SQL migration definitions for the PageForge content database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: content_items, item_meta, terms, item_terms, media",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Provisioned content
CREATE TABLE IF NOT EXISTS content_items (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    content_type   TEXT NOT NULL,
    title          TEXT NOT NULL,
    body           TEXT NOT NULL,
    slug           TEXT UNIQUE,
    excerpt        TEXT,
    status         TEXT NOT NULL,
    author         TEXT,
    parent_id      INTEGER,
    keyword_term   TEXT,
    keyword_value  REAL,
    location_name  TEXT,
    auto_generated INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- At most one auto-generated landing item per (keyword, location)
CREATE UNIQUE INDEX IF NOT EXISTS idx_landing_dedup
    ON content_items(keyword_term, location_name)
    WHERE content_type = 'landing' AND auto_generated = 1;

CREATE INDEX IF NOT EXISTS idx_items_type_status ON content_items(content_type, status);
CREATE INDEX IF NOT EXISTS idx_items_created_at ON content_items(created_at);

-- Per-item metadata; values are JSON-encoded
CREATE TABLE IF NOT EXISTS item_meta (
    item_id    INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
    meta_key   TEXT NOT NULL,
    meta_value TEXT NOT NULL,
    PRIMARY KEY (item_id, meta_key)
);

-- Taxonomy terms (categories, tags)
CREATE TABLE IF NOT EXISTS terms (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    taxonomy TEXT NOT NULL,
    name     TEXT NOT NULL,
    UNIQUE(taxonomy, name)
);

CREATE TABLE IF NOT EXISTS item_terms (
    item_id  INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
    term_id  INTEGER NOT NULL REFERENCES terms(id) ON DELETE CASCADE,
    taxonomy TEXT NOT NULL,
    PRIMARY KEY (item_id, term_id)
);

CREATE INDEX IF NOT EXISTS idx_item_terms_item ON item_terms(item_id, taxonomy);

-- Sideloaded media attachments
CREATE TABLE IF NOT EXISTS media (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id    INTEGER NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
    file_path  TEXT NOT NULL,
    file_name  TEXT NOT NULL,
    mime_type  TEXT NOT NULL,
    sha256     TEXT NOT NULL,
    source_url TEXT NOT NULL,
    byte_len   INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_media_item ON media(item_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
