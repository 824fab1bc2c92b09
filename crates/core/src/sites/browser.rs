//! Shared `chromiumoxide` launch helper and pure link-enumeration logic used
//! by both [`super::ChromiumSiteAdapter`] and
//! [`super::magnet::ChromiumMagnetExtractor`], avoiding duplicated
//! `BrowserConfig` setup. Per-step timeouts are expressed with
//! `tokio::time::timeout` wrapping each `chromiumoxide` call.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::types::Candidate;

use super::is_boilerplate_link_text;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("search input not visible within timeout")]
    InputNotFound,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("failed to build browser config: {0}")]
    Config(String),
}

/// Launch a fresh headless browser and open a blank page. Callers are
/// responsible for closing the page/browser on every exit path.
pub(super) async fn launch_page() -> Result<(Browser, Page), SiteError> {
    let config = BrowserConfig::builder()
        .build()
        .map_err(SiteError::Config)?;
    let (browser, mut handler) = Browser::launch(config).await?;

    tokio::spawn(async move {
        use futures::StreamExt;
        while handler.next().await.is_some() {}
    });

    let page = browser.new_page("about:blank").await?;
    Ok((browser, page))
}

/// Re-parse a URL to normalize its encoding (percent-encoding
/// canonicalization).
pub(super) fn reparse_url(raw: &str) -> Option<String> {
    Url::parse(raw).ok().map(|u| u.to_string())
}

/// Resolve a relative href against `base`, then re-parse it to normalize
/// encoding. Returns `None` for malformed hrefs, which are logged and
/// dropped rather than propagated.
pub(super) fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let resolved = base.join(href).ok()?;
    Some(resolved.to_string())
}

/// Pure candidate-building step of link enumeration: given raw
/// (href, inner_text) pairs already scraped from the page, apply the
/// filtering/resolution/dedup rules without touching the browser. Kept
/// separate from the `chromiumoxide`-driving code so it is unit-testable
/// without a live browser.
pub(super) fn build_candidates(base: &Url, links: Vec<(String, String)>) -> Vec<Candidate> {
    let mut seen = std::collections::HashSet::new();
    let mut candidates = Vec::new();

    for (href, text) in links {
        if href.is_empty() {
            continue;
        }
        let text = text.trim();
        if text.len() < 10 {
            continue;
        }
        if is_boilerplate_link_text(text) {
            continue;
        }
        let Some(resolved) = resolve_href(base, &href) else {
            warn!(href = %href, "candidate link could not be resolved against base URL");
            continue;
        };
        if !seen.insert(resolved.clone()) {
            continue;
        }
        candidates.push(Candidate {
            title: text.to_string(),
            url: resolved,
        });
    }

    candidates
}

pub(super) async fn with_timeout<T>(
    label: &'static str,
    duration: Duration,
    fut: impl std::future::Future<Output = Result<T, chromiumoxide::error::CdpError>>,
) -> Result<T, SiteError> {
    match tokio::time::timeout(duration, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SiteError::Browser(e)),
        Err(_) => Err(SiteError::Timeout(label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.test/search").unwrap()
    }

    #[test]
    fn rejects_short_text() {
        let links = vec![("/t/1".to_string(), "short".to_string())];
        assert!(build_candidates(&base(), links).is_empty());
    }

    #[test]
    fn rejects_page_n_prefix() {
        let links = vec![("/p/2".to_string(), "page 2 of results".to_string())];
        assert!(build_candidates(&base(), links).is_empty());
    }

    #[test]
    fn resolves_relative_href_against_base() {
        let links = vec![(
            "/torrent/123".to_string(),
            "Dune.2021.1080p.BluRay.x264".to_string(),
        )];
        let candidates = build_candidates(&base(), links);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://example.test/torrent/123");
    }

    #[test]
    fn deduplicates_by_resolved_url() {
        let links = vec![
            (
                "/torrent/123".to_string(),
                "Dune.2021.1080p.BluRay.x264".to_string(),
            ),
            (
                "https://example.test/torrent/123".to_string(),
                "Dune.2021.1080p.BluRay.x264 (mirror)".to_string(),
            ),
        ];
        let candidates = build_candidates(&base(), links);
        assert_eq!(candidates.len(), 1);
    }
}
