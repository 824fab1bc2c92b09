use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::browser::{launch_page, reparse_url, with_timeout};
use super::MagnetExtractor;

/// Production [`MagnetExtractor`], sharing [`super::browser::launch_page`]
/// with [`super::ChromiumSiteAdapter`]. The three-step resolution order —
/// direct link, gateway-encoded redirect, fallback scan — is implemented as
/// three private methods chained with `.or_else(...)`.
pub struct ChromiumMagnetExtractor;

impl ChromiumMagnetExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChromiumMagnetExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MagnetExtractor for ChromiumMagnetExtractor {
    async fn extract(&self, url: &str) -> Option<String> {
        let normalized = reparse_url(url)?;

        let (browser, page) = launch_page().await.ok()?;

        let result = async {
            with_timeout("navigation", Duration::from_secs(10), page.goto(&normalized))
                .await
                .ok()?;
            let _ = tokio::time::timeout(Duration::from_secs(10), page.wait_for_navigation()).await;

            let elements = page.find_elements("a").await.ok()?;
            let mut links = Vec::with_capacity(elements.len());
            for element in elements {
                let href = element.attribute("href").await.ok().flatten();
                let text = element.inner_text().await.ok().flatten().unwrap_or_default();
                if let Some(href) = href {
                    links.push((href, text));
                }
            }
            extract_magnet_from_links(&links)
        }
        .await;

        let _ = page.close().await;
        let mut browser = browser;
        let _ = browser.close().await;

        if result.is_none() {
            warn!(url = %normalized, "no magnet found on detail page");
        }
        result
    }
}

/// Pure anchor-scan logic, independent of the browser, over a list of
/// `(href, text)` pairs already scraped from the detail page. Tested
/// against canned HTML-derived fixtures rather than a live browser.
pub fn extract_magnet_from_links(links: &[(String, String)]) -> Option<String> {
    try_direct(links)
        .or_else(|| try_gateway(links))
        .or_else(|| try_fallback(links))
}

fn try_direct(links: &[(String, String)]) -> Option<String> {
    links
        .iter()
        .find(|(href, text)| {
            href.starts_with("magnet:")
                || text.contains("Magnet Link")
                || text.contains("Magnet Download")
        })
        .and_then(|(href, _)| href.starts_with("magnet:").then(|| href.clone()))
}

fn try_gateway(links: &[(String, String)]) -> Option<String> {
    let (href, _) = links.iter().find(|(href, _)| href.contains("keepshare.org"))?;
    let idx = href.find("/magnet:")?;
    let raw = &href[idx + 1..];
    urlencoding::decode(raw).ok().map(|s| s.into_owned())
}

fn try_fallback(links: &[(String, String)]) -> Option<String> {
    let (href, _) = links
        .iter()
        .find(|(href, _)| href.contains("magnet:") || href.contains("magnet%3A"))?;
    if href.starts_with("magnet:") {
        return Some(href.clone());
    }
    if href.contains("magnet:") || href.contains("magnet%3A") {
        let decoded = urlencoding::decode(href).ok()?.into_owned();
        let idx = decoded.find("magnet:")?;
        return Some(decoded[idx..].to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_magnet_link_wins() {
        let links = vec![
            (
                "magnet:?xt=urn:btih:abc".to_string(),
                "Magnet Link".to_string(),
            ),
            ("/torrent/file.torrent".to_string(), "Download".to_string()),
        ];
        assert_eq!(
            extract_magnet_from_links(&links),
            Some("magnet:?xt=urn:btih:abc".to_string())
        );
    }

    #[test]
    fn gateway_encoded_magnet_is_decoded_once() {
        let links = vec![(
            "https://keepshare.org/redirect/magnet:?xt=urn:btih:abc%20def".to_string(),
            "Download via gateway".to_string(),
        )];
        let result = extract_magnet_from_links(&links).unwrap();
        assert!(result.starts_with("magnet:"));
        assert!(result.contains("abc def"));
    }

    #[test]
    fn fallback_decodes_embedded_percent_encoded_magnet() {
        let links = vec![(
            "https://example.test/go?u=magnet%3A%3Fxt%3Durn%3Abtih%3Adeadbeef".to_string(),
            "mirror".to_string(),
        )];
        let result = extract_magnet_from_links(&links).unwrap();
        assert!(result.starts_with("magnet:"));
    }

    #[test]
    fn no_magnet_present_returns_none() {
        let links = vec![("/about".to_string(), "About us".to_string())];
        assert_eq!(extract_magnet_from_links(&links), None);
    }
}
