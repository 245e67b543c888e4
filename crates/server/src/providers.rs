//! HTTP-backed implementations of the engine's collaborator capabilities.
//!
//! The algorithms behind these endpoints (zero-shot classification, vector
//! similarity, text generation) stay external; these clients only move
//! typed values over the wire.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use helply_agent::{Classification, Generator, IntentClassifier, Retriever};
use helply_core::{ClassifyError, GenerateError, RetrieveError, RetrievedChunk};

pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs.max(1))).build()
}

/// Zero-shot classification via the Hugging Face inference API.
pub struct HfZeroShotClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HfZeroShotClassifier {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Self {
        Self { client, base_url: base_url.into(), model: model.into(), api_key }
    }
}

#[derive(Debug, Deserialize)]
struct HfZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f32>,
}

#[async_trait]
impl IntentClassifier for HfZeroShotClassifier {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
        hypothesis_template: &str,
    ) -> Result<Classification, ClassifyError> {
        if text.trim().is_empty() {
            return Ok(Classification::default());
        }

        let url = format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model);
        let mut request = self.client.post(&url).json(&json!({
            "inputs": text,
            "parameters": {
                "candidate_labels": candidate_labels,
                "hypothesis_template": hypothesis_template,
            },
        }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| ClassifyError(format!("request failed: {error}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError(format!("classifier returned status {status}")));
        }

        let payload: HfZeroShotResponse = response
            .json()
            .await
            .map_err(|error| ClassifyError(format!("malformed response: {error}")))?;
        Ok(Classification { labels: payload.labels, scores: payload.scores })
    }
}

/// Retrieval sidecar client. The sidecar owns the embedding model and the
/// vector index; this client only ships the query and the chunk list back.
pub struct HttpRetriever {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRetriever {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    id: serde_json::Value,
    score: f32,
    text: String,
    #[serde(default)]
    source: Option<String>,
}

impl ChunkPayload {
    fn into_chunk(self) -> RetrievedChunk {
        let id = match self.id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };
        RetrievedChunk {
            id,
            score: self.score,
            text: self.text,
            source: self.source.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn search(&self, query: &str, top_k: u32) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({ "query": query, "top_k": top_k }))
            .send()
            .await
            .map_err(|error| RetrieveError(format!("request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrieveError(format!("retriever returned status {status}")));
        }

        let payload: Vec<ChunkPayload> = response
            .json()
            .await
            .map_err(|error| RetrieveError(format!("malformed response: {error}")))?;
        Ok(payload.into_iter().map(ChunkPayload::into_chunk).collect())
    }
}

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Single-turn completion via the Gemini `generateContent` API.
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl GeminiGenerator {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
    ) -> Self {
        Self { client, base_url: base_url.into(), model: model.into(), api_key }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn complete(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<Option<String>, GenerateError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key.expose_secret(),
        );

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "maxOutputTokens": max_output_tokens,
                    "temperature": temperature,
                },
            }))
            .send()
            .await
            .map_err(|error| GenerateError::Other(format!("request failed: {error}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerateError::RateLimited {
                retry_after_secs: retry_after_secs(&response),
            });
        }
        if !status.is_success() {
            return Err(GenerateError::Other(format!("generator returned status {status}")));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|error| GenerateError::Other(format!("malformed response: {error}")))?;

        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let trimmed = text.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChunkPayload, GenerateContentResponse};

    #[test]
    fn chunk_payload_accepts_numeric_and_string_ids() {
        let numeric: ChunkPayload =
            serde_json::from_str(r#"{"id": 12, "score": 0.8, "text": "body"}"#).expect("decode");
        let chunk = numeric.into_chunk();
        assert_eq!(chunk.id, "12");
        assert_eq!(chunk.source, "unknown");

        let string: ChunkPayload = serde_json::from_str(
            r#"{"id": "faq-3", "score": 0.5, "text": "body", "source": "faq.md"}"#,
        )
        .expect("decode");
        let chunk = string.into_chunk();
        assert_eq!(chunk.id, "faq-3");
        assert_eq!(chunk.source, "faq.md");
    }

    #[test]
    fn generate_content_response_tolerates_missing_candidates() {
        let payload: GenerateContentResponse = serde_json::from_str("{}").expect("decode");
        assert!(payload.candidates.is_empty());

        let payload: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "hello"}, {"text": " there"}]}}]}"#,
        )
        .expect("decode");
        let text: String = payload.candidates[0]
            .content
            .as_ref()
            .map(|content| {
                content.parts.iter().filter_map(|part| part.text.clone()).collect::<Vec<_>>().join("")
            })
            .unwrap_or_default();
        assert_eq!(text, "hello there");
    }
}
