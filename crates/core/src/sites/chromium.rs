use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::types::{Candidate, Site};

use super::browser::{build_candidates, launch_page, with_timeout, SiteError};
use super::SiteAdapter;

const DEFAULT_SEARCH_INPUT_SELECTOR: &str =
    "input[type='search'], input[name='q'], input[name='query'], input[name='search']";
const DEFAULT_SEARCH_BUTTON_SELECTOR: &str =
    "button[type='submit'], input[type='submit'], button:has-text('Search')";
const DEFAULT_LINK_SELECTOR: &str = "a";

/// Production [`SiteAdapter`], driving a `chromiumoxide`-controlled headless
/// Chromium through the search flow: navigate, locate input, fill, submit,
/// enumerate result links. One fresh browser/page pair is launched per call
/// and released on every exit path.
pub struct ChromiumSiteAdapter;

impl ChromiumSiteAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChromiumSiteAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteAdapter for ChromiumSiteAdapter {
    async fn search(&self, site: &Site, query: &str) -> Result<Vec<Candidate>, SiteError> {
        let config = site.config.clone().unwrap_or_default();
        let input_selector = config
            .search_input_selector
            .as_deref()
            .unwrap_or(DEFAULT_SEARCH_INPUT_SELECTOR);
        let button_selector = config
            .search_button_selector
            .as_deref()
            .unwrap_or(DEFAULT_SEARCH_BUTTON_SELECTOR);
        let link_selector = config
            .link_selector
            .as_deref()
            .unwrap_or(DEFAULT_LINK_SELECTOR);

        let (browser, page) = launch_page().await?;

        let result = self
            .run_search(&page, site, query, input_selector, button_selector, link_selector)
            .await;

        let _ = page.close().await;
        let mut browser = browser;
        let _ = browser.close().await;

        result
    }
}

impl ChromiumSiteAdapter {
    async fn run_search(
        &self,
        page: &chromiumoxide::page::Page,
        site: &Site,
        query: &str,
        input_selector: &str,
        button_selector: &str,
        link_selector: &str,
    ) -> Result<Vec<Candidate>, SiteError> {
        // Step 2: navigate, wait for network idle (best-effort; ≤30s hard timeout).
        with_timeout(
            "navigation",
            Duration::from_secs(30),
            page.goto(&site.url),
        )
        .await?;
        let _ = tokio::time::timeout(Duration::from_secs(30), page.wait_for_navigation()).await;

        // Step 3: locate input, ≤10s or fail this site.
        let input = tokio::time::timeout(Duration::from_secs(10), page.find_element(input_selector))
            .await
            .map_err(|_| SiteError::InputNotFound)?
            .map_err(|_| SiteError::InputNotFound)?;

        // Step 4: fill.
        with_timeout("fill input", Duration::from_secs(10), input.click()).await?;
        with_timeout("type query", Duration::from_secs(10), input.type_str(query)).await?;

        // Step 5: submit — click button if present within 5s, else press Enter.
        let submit_result =
            tokio::time::timeout(Duration::from_secs(5), page.find_element(button_selector)).await;
        match submit_result {
            Ok(Ok(button)) => {
                let _ = button.click().await;
            }
            _ => {
                let _ = input.press_key("Enter").await;
            }
        }

        // Step 6: soft wait.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let _ = tokio::time::timeout(Duration::from_secs(15), page.wait_for_navigation()).await;

        // Step 7: enumerate links.
        let elements = with_timeout(
            "link enumeration",
            Duration::from_secs(10),
            page.find_elements(link_selector),
        )
        .await?;

        let mut links = Vec::with_capacity(elements.len());
        for element in elements {
            let href = element.attribute("href").await.ok().flatten();
            let text = element.inner_text().await.ok().flatten();
            if let (Some(href), Some(text)) = (href, text) {
                links.push((href, text));
            }
        }

        let base = Url::parse(&site.url)
            .map_err(|e| SiteError::Navigation(format!("invalid base URL: {e}")))?;
        Ok(build_candidates(&base, links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `ChromiumSiteAdapter` itself requires a real browser to exercise end
    // to end; its pure link-resolution logic is covered in `browser::tests`
    // and the worker-orchestrator scenarios use `FixtureSiteAdapter` instead.
    #[test]
    fn default_selectors_are_non_empty() {
        assert!(!DEFAULT_SEARCH_INPUT_SELECTOR.is_empty());
        assert!(!DEFAULT_SEARCH_BUTTON_SELECTOR.is_empty());
        assert_eq!(DEFAULT_LINK_SELECTOR, "a");
    }
}
