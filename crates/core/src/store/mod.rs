//! Persistence traits. Four small `async_trait` capabilities —
//! `ItemStore`, `SiteStore`, `MatchStore`, `LogStore` — backed by a single
//! shared connection in [`sqlite::SqliteStore`], since the matches table's
//! `ON DELETE CASCADE` foreign key requires every table to live in one
//! database.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ExtractedEntity, Item, LogEntry, Match, Site, SiteConfig};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found")]
    NotFound,

    #[error("duplicate")]
    Duplicate,
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Item>, StoreError>;
    async fn insert(&self, text: &str) -> Result<i64, StoreError>;
    async fn update(&self, id: i64, text: &str) -> Result<(), StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Site>, StoreError>;
    async fn insert(
        &self,
        url: &str,
        display_name: Option<&str>,
        config: Option<SiteConfig>,
    ) -> Result<i64, StoreError>;
    async fn update(
        &self,
        id: i64,
        url: &str,
        display_name: Option<&str>,
        config: Option<SiteConfig>,
    ) -> Result<(), StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

/// Result of an insert-or-ignore: `inserted=false` means a row with the same
/// `(item_id, matched_url, source_site)` already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: Option<i64>,
    pub inserted: bool,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn insert(
        &self,
        item_id: i64,
        matched_title: &str,
        matched_url: &str,
        source_site: &str,
        magnet_uri: Option<&str>,
        file_size: Option<&str>,
        entities: Option<&[ExtractedEntity]>,
    ) -> Result<InsertOutcome, StoreError>;

    async fn list_recent(&self, limit: usize) -> Result<Vec<Match>, StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogPage {
    pub logs: Vec<LogEntry>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert(&self, description: &str, success: bool) -> Result<LogEntry, StoreError>;
    async fn list_page(&self, page: usize, page_size: usize) -> Result<LogPage, StoreError>;
    async fn delete_all(&self) -> Result<u64, StoreError>;
}
