//! Site adapter and detail-page magnet extractor: the two browser-automated
//! capabilities the worker drives. Modeled as small `async_trait`
//! capabilities rather than a shared config blob dispatched imperatively —
//! `SiteAdapter` is "anything that, given a query, yields a lazy sequence of
//! (title, absolute URL) pairs"; `MagnetExtractor` is "anything that, given
//! a detail URL, yields an optional magnet URI".

mod browser;
mod chromium;
mod magnet;

pub use browser::SiteError;
pub use chromium::ChromiumSiteAdapter;
pub use magnet::{extract_magnet_from_links, ChromiumMagnetExtractor};

use async_trait::async_trait;

use crate::types::{Candidate, Site};

/// Boilerplate link text rejected during enumeration: exact equality plus
/// the "page N" prefix.
pub(crate) const BOILERPLATE_LINK_TEXT: &[&str] = &[
    "home",
    "login",
    "register",
    "about",
    "contact",
    "privacy",
    "terms",
    "dmca",
];

pub(crate) fn is_boilerplate_link_text(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    BOILERPLATE_LINK_TEXT.contains(&lower.as_str()) || lower.starts_with("page ")
}

/// `search(site, query) -> [Candidate]`. The adapter does NOT visit detail
/// pages; magnet extraction is deferred to [`MagnetExtractor`] and only
/// performed for confirmed matches.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    async fn search(&self, site: &Site, query: &str) -> Result<Vec<Candidate>, SiteError>;
}

/// `DISABLE_PLAYWRIGHT=true`: returns no candidates unconditionally. A
/// dedicated adapter rather than an `if` branch inside
/// [`ChromiumSiteAdapter`], so the "adapter is a capability" design stays
/// uniform — the engine picks which adapter to construct once, at startup.
pub struct NullSiteAdapter;

#[async_trait]
impl SiteAdapter for NullSiteAdapter {
    async fn search(&self, _site: &Site, _query: &str) -> Result<Vec<Candidate>, SiteError> {
        Ok(vec![])
    }
}

/// Returns a canned `Vec<Candidate>` configured at construction. The
/// adapter used throughout the worker-orchestrator tests in place of a live
/// browser, exactly as `StaticEntityExtractor` stands in for the LLM.
pub struct FixtureSiteAdapter {
    candidates: Vec<Candidate>,
}

impl FixtureSiteAdapter {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn empty() -> Self {
        Self { candidates: vec![] }
    }
}

#[async_trait]
impl SiteAdapter for FixtureSiteAdapter {
    async fn search(&self, _site: &Site, _query: &str) -> Result<Vec<Candidate>, SiteError> {
        Ok(self.candidates.clone())
    }
}

/// Given a confirmed match's detail URL, return a magnet URI if one can be
/// resolved. `None` rather than an error: "no magnet found" is success, not
/// failure — the match is still persisted with an empty magnet field.
#[async_trait]
pub trait MagnetExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Option<String>;
}

/// Test double returning a canned magnet (or none) regardless of URL.
pub struct FixtureMagnetExtractor {
    magnet: Option<String>,
}

impl FixtureMagnetExtractor {
    pub fn new(magnet: Option<String>) -> Self {
        Self { magnet }
    }
}

#[async_trait]
impl MagnetExtractor for FixtureMagnetExtractor {
    async fn extract(&self, _url: &str) -> Option<String> {
        self.magnet.clone()
    }
}
