use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::types::{ExtractedEntity, Item, LogEntry, Match, Site, SiteConfig};

use super::{InsertOutcome, ItemStore, LogPage, LogStore, MatchStore, SiteStore, StoreError};

/// Single shared `rusqlite::Connection`, guarding every table in this
/// crate's schema. A `Mutex<Connection>` single-writer pattern, with
/// `initialize_schema` applying idempotent `CREATE TABLE IF NOT EXISTS`
/// statements plus best-effort `ALTER TABLE ... ADD COLUMN` migrations
/// ignored via `let _ = ...` for columns added by a later schema revision.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL UNIQUE,
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                display_name TEXT,
                config TEXT,
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                matched_title TEXT NOT NULL,
                matched_url TEXT NOT NULL,
                source_site TEXT NOT NULL,
                magnet_uri TEXT,
                file_size TEXT,
                entities TEXT,
                created TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_matches_dedup
                ON matches(item_id, matched_url, source_site);

            CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                description TEXT NOT NULL,
                success INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp DESC);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        // Migration: earlier schema revisions lacked `updated` on items/sites.
        let _ = conn.execute("ALTER TABLE items ADD COLUMN updated TEXT", []);
        let _ = conn.execute("ALTER TABLE sites ADD COLUMN updated TEXT", []);

        Ok(())
    }

    fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        let created_str: String = row.get(2)?;
        Ok(Item {
            id: row.get(0)?,
            text: row.get(1)?,
            created: parse_timestamp(&created_str),
        })
    }

    fn row_to_site(row: &rusqlite::Row) -> rusqlite::Result<Site> {
        let config_json: Option<String> = row.get(3)?;
        let created_str: String = row.get(4)?;
        let updated_str: String = row.get(5)?;
        let config: Option<SiteConfig> = config_json.and_then(|j| serde_json::from_str(&j).ok());
        Ok(Site {
            id: row.get(0)?,
            url: row.get(1)?,
            display_name: row.get(2)?,
            config,
            created: parse_timestamp(&created_str),
            updated: parse_timestamp(&updated_str),
        })
    }

    fn row_to_match(row: &rusqlite::Row) -> rusqlite::Result<Match> {
        let entities_json: Option<String> = row.get(7)?;
        let created_str: String = row.get(8)?;
        let entities: Option<Vec<ExtractedEntity>> =
            entities_json.and_then(|j| serde_json::from_str(&j).ok());
        Ok(Match {
            id: row.get(0)?,
            item_id: row.get(1)?,
            matched_title: row.get(2)?,
            matched_url: row.get(3)?,
            source_site: row.get(4)?,
            magnet_uri: row.get(5)?,
            file_size: row.get(6)?,
            entities,
            created: parse_timestamp(&created_str),
        })
    }

    fn row_to_log(row: &rusqlite::Row) -> rusqlite::Result<LogEntry> {
        let timestamp_str: String = row.get(1)?;
        let success: i64 = row.get(3)?;
        Ok(LogEntry {
            id: row.get(0)?,
            timestamp: parse_timestamp(&timestamp_str),
            description: row.get(2)?,
            success: success != 0,
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn list(&self) -> Result<Vec<Item>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, text, created FROM items ORDER BY created DESC")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_item)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn insert(&self, text: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO items (text, created, updated) VALUES (?, ?, ?)",
            params![text, now, now],
        )
        .map_err(|e| {
            if Self::is_constraint_violation(&e) {
                StoreError::Duplicate
            } else {
                StoreError::Database(e.to_string())
            }
        })?;
        Ok(conn.last_insert_rowid())
    }

    async fn update(&self, id: i64, text: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let changed = conn
            .execute(
                "UPDATE items SET text = ?, updated = ? WHERE id = ?",
                params![text, now, id],
            )
            .map_err(|e| {
                if Self::is_constraint_violation(&e) {
                    StoreError::Duplicate
                } else {
                    StoreError::Database(e.to_string())
                }
            })?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM items WHERE id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SiteStore for SqliteStore {
    async fn list(&self) -> Result<Vec<Site>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, url, display_name, config, created, updated FROM sites ORDER BY created DESC")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_site)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn insert(
        &self,
        url: &str,
        display_name: Option<&str>,
        config: Option<SiteConfig>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let config_json = config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO sites (url, display_name, config, created, updated) VALUES (?, ?, ?, ?, ?)",
            params![url, display_name, config_json, now, now],
        )
        .map_err(|e| {
            if Self::is_constraint_violation(&e) {
                StoreError::Duplicate
            } else {
                StoreError::Database(e.to_string())
            }
        })?;
        Ok(conn.last_insert_rowid())
    }

    async fn update(
        &self,
        id: i64,
        url: &str,
        display_name: Option<&str>,
        config: Option<SiteConfig>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let config_json = config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        let changed = conn
            .execute(
                "UPDATE sites SET url = ?, display_name = ?, config = ?, updated = ? WHERE id = ?",
                params![url, display_name, config_json, now, id],
            )
            .map_err(|e| {
                if Self::is_constraint_violation(&e) {
                    StoreError::Duplicate
                } else {
                    StoreError::Database(e.to_string())
                }
            })?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM sites WHERE id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl MatchStore for SqliteStore {
    async fn insert(
        &self,
        item_id: i64,
        matched_title: &str,
        matched_url: &str,
        source_site: &str,
        magnet_uri: Option<&str>,
        file_size: Option<&str>,
        entities: Option<&[ExtractedEntity]>,
    ) -> Result<InsertOutcome, StoreError> {
        let conn = self.conn.lock().unwrap();
        let entities_json = entities
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT OR IGNORE INTO matches (item_id, matched_title, matched_url, source_site, magnet_uri, file_size, entities, created) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![item_id, matched_title, matched_url, source_site, magnet_uri, file_size, entities_json, now],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if conn.changes() == 0 {
            return Ok(InsertOutcome {
                id: None,
                inserted: false,
            });
        }
        Ok(InsertOutcome {
            id: Some(conn.last_insert_rowid()),
            inserted: true,
        })
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Match>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, item_id, matched_title, matched_url, source_site, magnet_uri, file_size, entities, created FROM matches ORDER BY created DESC LIMIT ?",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64], Self::row_to_match)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM matches WHERE id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl LogStore for SqliteStore {
    async fn insert(&self, description: &str, success: bool) -> Result<LogEntry, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO logs (timestamp, description, success) VALUES (?, ?, ?)",
            params![now.to_rfc3339(), description, success as i64],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(LogEntry {
            id: conn.last_insert_rowid(),
            timestamp: now,
            description: description.to_string(),
            success,
        })
    }

    async fn list_page(&self, page: usize, page_size: usize) -> Result<LogPage, StoreError> {
        let conn = self.conn.lock().unwrap();
        let page = page.max(1);
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let total = total as usize;
        let total_pages = total.div_ceil(page_size).max(1);
        let offset = (page - 1) * page_size;

        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, description, success FROM logs ORDER BY timestamp DESC LIMIT ? OFFSET ?",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![page_size as i64, offset as i64], Self::row_to_log)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let logs = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(LogPage {
            logs,
            page,
            page_size,
            total,
            total_pages,
        })
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM logs", [])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(changed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[tokio::test]
    async fn item_insert_and_list() {
        let s = store();
        let id = ItemStore::insert(&s, "Dune 2021").await.unwrap();
        assert!(id > 0);
        let items = ItemStore::list(&s).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Dune 2021");
    }

    #[tokio::test]
    async fn duplicate_item_text_is_rejected() {
        let s = store();
        ItemStore::insert(&s, "Dune 2021").await.unwrap();
        let result = ItemStore::insert(&s, "Dune 2021").await;
        assert!(matches!(result, Err(StoreError::Duplicate)));
    }

    #[tokio::test]
    async fn deleting_item_cascades_to_matches() {
        let s = store();
        let item_id = ItemStore::insert(&s, "Dune 2021").await.unwrap();
        MatchStore::insert(
            &s,
            item_id,
            "Dune.2021.1080p",
            "https://example.test/t/1",
            "example",
            None,
            None,
            None,
        )
        .await
        .unwrap();

        ItemStore::delete(&s, item_id).await.unwrap();
        let remaining = MatchStore::list_recent(&s, 10).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn duplicate_match_insert_reports_not_inserted() {
        let s = store();
        let item_id = ItemStore::insert(&s, "Dune 2021").await.unwrap();
        let first = MatchStore::insert(
            &s,
            item_id,
            "Dune.2021.1080p",
            "https://example.test/t/1",
            "example",
            None,
            None,
            None,
        )
        .await
        .unwrap();
        assert!(first.inserted);

        let second = MatchStore::insert(
            &s,
            item_id,
            "Dune.2021.1080p (mirror title)",
            "https://example.test/t/1",
            "example",
            None,
            None,
            None,
        )
        .await
        .unwrap();
        assert!(!second.inserted);
        assert_eq!(MatchStore::list_recent(&s, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn log_pagination_reports_totals() {
        let s = store();
        for i in 0..30 {
            LogStore::insert(&s, &format!("run {i}"), true).await.unwrap();
        }
        let page = LogStore::list_page(&s, 1, 25).await.unwrap();
        assert_eq!(page.logs.len(), 25);
        assert_eq!(page.total, 30);
        assert_eq!(page.total_pages, 2);

        let page2 = LogStore::list_page(&s, 2, 25).await.unwrap();
        assert_eq!(page2.logs.len(), 5);
    }

    #[tokio::test]
    async fn site_update_of_missing_id_is_not_found() {
        let s = store();
        let result = SiteStore::update(&s, 999, "https://example.test", None, None).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
