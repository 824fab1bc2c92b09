use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::metrics::{ENTITY_EXTRACTION_ATTEMPTS, ENTITY_EXTRACTION_FAILURES};
use crate::types::ExtractedEntity;

use super::{parse_entity_response, EntityExtractor, ExtractError};

const SYSTEM_PROMPT: &str = "You extract structured entities from torrent release titles. \
Respond with a JSON object of the shape {\"entities\":[{\"text\":str,\"type\":str,\"confidence\":number}]}. \
Recognized types: FILM_TITLE, YEAR, RESOLUTION, VIDEO_FORMAT, FILE_SIZE. \
Respond with JSON only, no commentary.";

/// Production [`EntityExtractor`] talking to an Ollama-compatible local LLM
/// server. Requests `format: "json"` on the generate call so the endpoint
/// returns JSON-only completions wherever it honors that mode.
pub struct OllamaEntityExtractor {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

impl OllamaEntityExtractor {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            model: model.into(),
        }
    }

    async fn extract_inner(&self, title: &str) -> Result<Vec<ExtractedEntity>, ExtractError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: format!("Title: {title}"),
            system: SYSTEM_PROMPT,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.api_base))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: GenerateResponse = response.json().await?;
        parse_entity_response(&body.response)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    system: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl EntityExtractor for OllamaEntityExtractor {
    async fn extract(&self, title: &str) -> Result<Vec<ExtractedEntity>, ExtractError> {
        ENTITY_EXTRACTION_ATTEMPTS.inc();

        let result = self.extract_inner(title).await;
        if result.is_err() {
            ENTITY_EXTRACTION_FAILURES.inc();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn extract_posts_json_mode_and_parses_wrapped_entities() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3",
                "response": "{\"entities\":[{\"text\":\"Dune\",\"type\":\"FILM_TITLE\",\"confidence\":0.95}]}",
                "done": true
            })))
            .mount(&server)
            .await;

        let extractor = OllamaEntityExtractor::new(server.uri(), "llama3");
        let entities = extractor.extract("Dune.2021.1080p").await.unwrap();
        assert_eq!(entities.len(), 1);
        assert!(entities[0].is_film_title());
    }

    #[tokio::test]
    async fn extract_surfaces_empty_reply_as_recoverable_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3",
                "response": "",
                "done": true
            })))
            .mount(&server)
            .await;

        let extractor = OllamaEntityExtractor::new(server.uri(), "llama3");
        assert!(matches!(
            extractor.extract("anything").await,
            Err(ExtractError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn extract_surfaces_unreachable_endpoint_as_http_error() {
        let extractor = OllamaEntityExtractor::new("http://127.0.0.1:1", "llama3");
        assert!(extractor.extract("anything").await.is_err());
    }
}
