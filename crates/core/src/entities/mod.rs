//! Entity extractor client: talks to a local LLM HTTP endpoint and parses
//! constrained JSON, tolerating either a wrapped-object or bare-array
//! response shape.

mod ollama;
mod supervisor;

pub use ollama::OllamaEntityExtractor;
pub use supervisor::{LlmSupervisor, SupervisorError};

use async_trait::async_trait;
use thiserror::Error;

use crate::types::ExtractedEntity;

/// Errors surfaced by an [`EntityExtractor`]. Every variant is a recoverable
/// extraction failure — the worker treats all of them as "no entities" and
/// falls back to the fuzzy scorer; callers must not retry.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("LLM endpoint unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM returned an empty or whitespace-only response")]
    EmptyResponse,

    #[error("LLM response was not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Talks to a local LLM to pull structured entities out of a candidate
/// title. A single attempt per candidate; no retry.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, title: &str) -> Result<Vec<ExtractedEntity>, ExtractError>;
}

/// Tolerant intermediate shape: accepts either `{entities:[...]}` or a bare
/// `[...]` before mapping into domain types.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum RawEntityResponse {
    Wrapped { entities: Vec<ExtractedEntity> },
    Bare(Vec<ExtractedEntity>),
}

impl RawEntityResponse {
    fn into_entities(self) -> Vec<ExtractedEntity> {
        match self {
            RawEntityResponse::Wrapped { entities } => entities,
            RawEntityResponse::Bare(entities) => entities,
        }
    }
}

/// Parse a raw LLM completion body into entities, tolerating both
/// documented shapes. Empty/whitespace bodies and JSON errors are mapped to
/// the two corresponding [`ExtractError`] variants.
pub(crate) fn parse_entity_response(body: &str) -> Result<Vec<ExtractedEntity>, ExtractError> {
    if body.trim().is_empty() {
        return Err(ExtractError::EmptyResponse);
    }
    let raw: RawEntityResponse = serde_json::from_str(body)?;
    Ok(raw.into_entities())
}

/// A fixed-response test double, configured at construction with either a
/// canned entity list or a canned failure.
pub struct StaticEntityExtractor {
    result: Result<Vec<ExtractedEntity>, String>,
}

impl StaticEntityExtractor {
    pub fn ok(entities: Vec<ExtractedEntity>) -> Self {
        Self { result: Ok(entities) }
    }

    pub fn failing() -> Self {
        Self {
            result: Err("static extractor configured to fail".to_string()),
        }
    }
}

#[async_trait]
impl EntityExtractor for StaticEntityExtractor {
    async fn extract(&self, _title: &str) -> Result<Vec<ExtractedEntity>, ExtractError> {
        match &self.result {
            Ok(entities) => Ok(entities.clone()),
            Err(_) => Err(ExtractError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_object_shape() {
        let body = r#"{"entities":[{"text":"Dune","type":"FILM_TITLE","confidence":0.9}]}"#;
        let entities = parse_entity_response(body).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "Dune");
    }

    #[test]
    fn parses_bare_array_shape() {
        let body = r#"[{"text":"2021","type":"YEAR","confidence":0.8}]"#;
        let entities = parse_entity_response(body).unwrap();
        assert_eq!(entities.len(), 1);
        assert!(entities[0].is_year());
    }

    #[test]
    fn empty_body_is_a_recoverable_failure() {
        assert!(matches!(
            parse_entity_response("   "),
            Err(ExtractError::EmptyResponse)
        ));
    }

    #[test]
    fn invalid_json_is_a_recoverable_failure() {
        assert!(matches!(
            parse_entity_response("not json"),
            Err(ExtractError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn static_extractor_returns_configured_entities() {
        let extractor = StaticEntityExtractor::ok(vec![ExtractedEntity {
            text: "Dune".to_string(),
            entity_type: "FILM_TITLE".to_string(),
            confidence: 0.9,
        }]);
        let entities = extractor.extract("anything").await.unwrap();
        assert_eq!(entities[0].text, "Dune");
    }

    #[tokio::test]
    async fn failing_extractor_surfaces_as_empty_response() {
        let extractor = StaticEntityExtractor::failing();
        assert!(extractor.extract("anything").await.is_err());
    }
}
