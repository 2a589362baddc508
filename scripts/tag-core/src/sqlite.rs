use crate::error::{Result, TagError};
use crate::model::{MergeSnapshot, Tag, TagKind, TagMergeRecord};
use crate::normalize::normalize;
use crate::store::TagStore;
use log::{debug, warn};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    normalizedName TEXT NOT NULL,
    type TEXT NOT NULL CHECK(type IN ('ai', 'manual', 'ai_detailed')),
    confidence REAL,
    parentId TEXT,
    createdAt INTEGER NOT NULL,
    FOREIGN KEY (parentId) REFERENCES tags(id) ON DELETE SET NULL
);
CREATE INDEX IF NOT EXISTS idx_tags_parent ON tags(parentId);
CREATE INDEX IF NOT EXISTS idx_tags_normalized ON tags(normalizedName, type);

CREATE TABLE IF NOT EXISTS item_tags (
    itemId TEXT NOT NULL,
    tagId TEXT NOT NULL,
    addedAt INTEGER NOT NULL,
    PRIMARY KEY (itemId, tagId),
    FOREIGN KEY (tagId) REFERENCES tags(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_item_tags_item ON item_tags(itemId);
CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags(tagId);

CREATE TABLE IF NOT EXISTS tag_merges (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    targetTagId TEXT NOT NULL,
    sourceTagId TEXT NOT NULL,
    sourceTagName TEXT NOT NULL,
    sourceKind TEXT NOT NULL,
    sourceParentId TEXT,
    sourceConfidence REAL,
    sourceCreatedAt INTEGER NOT NULL,
    mergedAt INTEGER NOT NULL,
    itemIdsJson TEXT
);
CREATE INDEX IF NOT EXISTS idx_tag_merges_target ON tag_merges(targetTagId);
CREATE INDEX IF NOT EXISTS idx_tag_merges_merged_at ON tag_merges(mergedAt);

CREATE TABLE IF NOT EXISTS tag_merge_undos (
    mergeId TEXT PRIMARY KEY,
    undoneAt INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tag_aliases (
    aliasName TEXT PRIMARY KEY,
    targetTagId TEXT NOT NULL,
    createdAt INTEGER NOT NULL,
    FOREIGN KEY (targetTagId) REFERENCES tags(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_tag_aliases_target ON tag_aliases(targetTagId);
";

const TAG_COLUMNS: &str = "id, name, normalizedName, type, confidence, parentId, createdAt";

impl FromSql for TagKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err: TagError| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for TagKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Tag store backed by a SQLite database file.
pub struct SqliteTagStore {
    conn: Connection,
}

impl SqliteTagStore {
    pub fn open(path: &Path) -> Result<Self> {
        debug!("opening tag database {:?}", path);
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn tag_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM tags WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn query_ids(&self, sql: &str, key: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([key], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        normalized_name: row.get(2)?,
        kind: row.get(3)?,
        confidence: row.get(4)?,
        parent_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl TagStore for SqliteTagStore {
    fn tag(&self, id: &str) -> Result<Option<Tag>> {
        let sql = format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = ?1");
        Ok(self.conn.query_row(&sql, [id], tag_from_row).optional()?)
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        let sql = format!("SELECT {TAG_COLUMNS} FROM tags ORDER BY createdAt, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], tag_from_row)?;
        let mut tags = Vec::new();
        for tag in rows {
            tags.push(tag?);
        }
        Ok(tags)
    }

    fn find_tag(&self, normalized_name: &str, kind: TagKind) -> Result<Option<Tag>> {
        let sql = format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE normalizedName = ?1 AND type = ?2
             ORDER BY createdAt, id LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![normalized_name, kind], tag_from_row)
            .optional()?)
    }

    fn children_of(&self, id: &str) -> Result<Vec<String>> {
        self.query_ids(
            "SELECT id FROM tags WHERE parentId = ?1 ORDER BY createdAt, id",
            id,
        )
    }

    fn insert_tag(&mut self, tag: &Tag) -> Result<()> {
        if self.tag_exists(&tag.id)? {
            return Err(TagError::TagAlreadyExists(tag.id.clone()));
        }
        self.conn.execute(
            "INSERT INTO tags (id, name, normalizedName, type, confidence, parentId, createdAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tag.id,
                tag.name,
                tag.normalized_name,
                tag.kind,
                tag.confidence,
                tag.parent_id,
                tag.created_at
            ],
        )?;
        debug!("tag created: {} ({})", tag.name, tag.kind);
        Ok(())
    }

    fn rename_tag(&mut self, id: &str, name: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE tags SET name = ?1, normalizedName = ?2 WHERE id = ?3",
            params![name, normalize(name), id],
        )?;
        if changed == 0 {
            return Err(TagError::TagNotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_parent(&mut self, id: &str, parent_id: Option<&str>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE tags SET parentId = ?1 WHERE id = ?2",
            params![parent_id, id],
        )?;
        if changed == 0 {
            return Err(TagError::TagNotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_tag(&mut self, id: &str) -> Result<()> {
        // item_tags and tag_aliases follow through ON DELETE CASCADE.
        self.conn.execute("DELETE FROM tags WHERE id = ?1", [id])?;
        debug!("tag deleted: {}", id);
        Ok(())
    }

    fn items_with_tag(&self, tag_id: &str) -> Result<Vec<String>> {
        self.query_ids(
            "SELECT itemId FROM item_tags WHERE tagId = ?1 ORDER BY itemId",
            tag_id,
        )
    }

    fn tags_for_item(&self, item_id: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .query_ids("SELECT tagId FROM item_tags WHERE itemId = ?1", item_id)?
            .into_iter()
            .collect())
    }

    fn add_tag_to_item(&mut self, item_id: &str, tag_id: &str) -> Result<()> {
        if !self.tag_exists(tag_id)? {
            return Err(TagError::TagNotFound(tag_id.to_string()));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO item_tags (itemId, tagId, addedAt) VALUES (?1, ?2, ?3)",
            params![item_id, tag_id, now_millis()],
        )?;
        Ok(())
    }

    fn remove_tag_from_item(&mut self, item_id: &str, tag_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM item_tags WHERE itemId = ?1 AND tagId = ?2",
            params![item_id, tag_id],
        )?;
        Ok(())
    }

    fn clear_item(&mut self, item_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM item_tags WHERE itemId = ?1", [item_id])?;
        Ok(())
    }

    fn append_merge(&mut self, record: &TagMergeRecord) -> Result<()> {
        let snapshot_json = record
            .snapshot
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO tag_merges (id, targetTagId, sourceTagId, sourceTagName, sourceKind,
                                     sourceParentId, sourceConfidence, sourceCreatedAt,
                                     mergedAt, itemIdsJson)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.target_tag_id,
                record.source_tag_id,
                record.source_tag_name,
                record.source_kind,
                record.source_parent_id,
                record.source_confidence,
                record.source_created_at,
                record.merged_at,
                snapshot_json
            ],
        )?;
        Ok(())
    }

    fn merges(&self) -> Result<Vec<TagMergeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, targetTagId, sourceTagId, sourceTagName, sourceKind, sourceParentId,
                    sourceConfidence, sourceCreatedAt, mergedAt, itemIdsJson
             FROM tag_merges ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            let record = TagMergeRecord {
                id: row.get(0)?,
                target_tag_id: row.get(1)?,
                source_tag_id: row.get(2)?,
                source_tag_name: row.get(3)?,
                source_kind: row.get(4)?,
                source_parent_id: row.get(5)?,
                source_confidence: row.get(6)?,
                source_created_at: row.get(7)?,
                merged_at: row.get(8)?,
                snapshot: None,
            };
            let snapshot_json: Option<String> = row.get(9)?;
            Ok((record, snapshot_json))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (mut record, snapshot_json) = row?;
            if let Some(json) = snapshot_json {
                match serde_json::from_str::<MergeSnapshot>(&json) {
                    Ok(snapshot) => record.snapshot = Some(snapshot),
                    Err(err) => warn!("merge {} has an unreadable snapshot: {}", record.id, err),
                }
            }
            records.push(record);
        }
        Ok(records)
    }

    fn record_undo(&mut self, merge_id: &str, undone_at: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tag_merge_undos (mergeId, undoneAt) VALUES (?1, ?2)",
            params![merge_id, undone_at],
        )?;
        Ok(())
    }

    fn is_undone(&self, merge_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT undoneAt FROM tag_merge_undos WHERE mergeId = ?1",
                [merge_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn put_alias(&mut self, key: &str, tag_id: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tag_aliases (aliasName, targetTagId, createdAt) VALUES (?1, ?2, ?3)
             ON CONFLICT(aliasName) DO UPDATE SET targetTagId = excluded.targetTagId",
            params![key, tag_id, now_millis()],
        )?;
        Ok(())
    }

    fn alias(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT targetTagId FROM tag_aliases WHERE aliasName = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn aliases_for(&self, tag_id: &str) -> Result<Vec<String>> {
        self.query_ids(
            "SELECT aliasName FROM tag_aliases WHERE targetTagId = ?1 ORDER BY aliasName",
            tag_id,
        )
    }

    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!("rollback failed: {rollback}");
                }
                Err(err)
            }
        }
    }
}
