//! Core domain types shared by the worker, the stores, and the API layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A watchlist target. Owned by the API layer; read-only to the worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: i64,
    pub text: String,
    pub created: DateTime<Utc>,
}

/// A scraping target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Site {
    pub id: i64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SiteConfig>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Site {
    /// Human-readable name for logging; falls back to the base URL.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.url)
    }
}

/// One step of a detail-page extraction recipe, as embedded in a site's
/// config JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionAction {
    Click,
    ClickNewPage,
    Extract,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionStep {
    pub action: ExtractionAction,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// Structured per-site scraping configuration. Every field is optional; an
/// absent field falls back to the default documented per adapter step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_input_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_button_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extraction_steps: Vec<ExtractionStep>,
}

/// An unvetted (title, URL) pair harvested from a site's search results page.
/// Transient; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub url: String,
}

/// The entity type the LLM attached to a span, kept as the raw string the
/// model emitted (e.g. `"FILM_TITLE"`, `"YEAR"`). Matching only ever asks
/// "does this type *contain* FILM TITLE / YEAR" — an open string with
/// predicate helpers expresses that more directly than a closed enum would,
/// and never rejects a type the model invents.
pub type EntityTypeTag = String;

/// Recognized entity-type predicates, matched case-insensitively against
/// either the underscore or spaced form.
pub fn entity_type_is_film_title(ty: &str) -> bool {
    let ty = ty.to_ascii_uppercase();
    ty.contains("FILM TITLE") || ty.contains("FILM_TITLE")
}

pub fn entity_type_is_year(ty: &str) -> bool {
    ty.eq_ignore_ascii_case("YEAR")
}

pub fn entity_type_is_file_size(ty: &str) -> bool {
    let ty = ty.to_ascii_uppercase();
    ty.contains("FILE SIZE") || ty.contains("FILE_SIZE")
}

/// A single field the LLM extracted from a candidate title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedEntity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: EntityTypeTag,
    #[serde(default)]
    pub confidence: f64,
}

impl ExtractedEntity {
    pub fn is_film_title(&self) -> bool {
        entity_type_is_film_title(&self.entity_type)
    }

    pub fn is_year(&self) -> bool {
        entity_type_is_year(&self.entity_type)
    }

    pub fn is_file_size(&self) -> bool {
        entity_type_is_file_size(&self.entity_type)
    }
}

/// A persisted finding: a candidate that passed every filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub id: i64,
    pub item_id: i64,
    pub matched_title: String,
    pub matched_url: String,
    pub source_site: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<ExtractedEntity>>,
    pub created: DateTime<Utc>,
}

/// A per-item worker-run summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn film_title_matches_case_insensitively_and_either_separator() {
        assert!(entity_type_is_film_title("film_title"));
        assert!(entity_type_is_film_title("Film Title"));
        assert!(!entity_type_is_film_title("YEAR"));
    }

    #[test]
    fn year_predicate_is_exact() {
        assert!(entity_type_is_year("year"));
        assert!(entity_type_is_year("YEAR"));
        assert!(!entity_type_is_year("FILM_TITLE"));
    }

    #[test]
    fn site_name_falls_back_to_url() {
        let site = Site {
            id: 1,
            url: "https://example.test".to_string(),
            display_name: None,
            config: None,
            created: Utc::now(),
            updated: Utc::now(),
        };
        assert_eq!(site.name(), "https://example.test");
    }

    #[test]
    fn match_serialization_omits_absent_optionals() {
        let m = Match {
            id: 1,
            item_id: 2,
            matched_title: "Dune 2021".to_string(),
            matched_url: "https://example.test/t/1".to_string(),
            source_site: "example".to_string(),
            magnet_uri: None,
            file_size: None,
            entities: None,
            created: Utc::now(),
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("magnet_uri"));
        assert!(!json.contains("file_size"));
        assert!(!json.contains("entities"));
    }
}
