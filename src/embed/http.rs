//! HTTP embedding provider.
//!
//! Speaks both the OpenAI `/v1/embeddings` response shape (`data[].embedding`)
//! and Ollama's `/api/embed` shape (`embeddings`). Requests are
//! `{"model": ..., "input": [...]}` for either.
//!
//! - HTTP 429 and 5xx: retried with backoff
//! - other 4xx: fail immediately
//! - network errors and timeouts: retried

use super::{check_batch, EmbeddingProvider, RetryPolicy};
use crate::config::EmbeddingConfig;
use crate::error::{ContextError, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub struct HttpEmbedder {
    client: Client,
    url: String,
    model: String,
    dims: usize,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("dims", &self.dims)
            .finish()
    }
}

impl HttpEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| ContextError::ConfigValidation(vec!["embedding.url is required".into()]))?;
        let model = config
            .model
            .clone()
            .ok_or_else(|| ContextError::ConfigValidation(vec!["embedding.model is required".into()]))?;

        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                ContextError::ConfigValidation(vec![format!("environment variable {var} is not set")])
            })?),
            None => None,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ContextError::provider(format!("building HTTP client: {e}"), false))?;

        Ok(Self {
            client,
            url,
            model,
            dims: config.dims,
            api_key,
            retry: RetryPolicy { max_retries: config.max_retries, ..RetryPolicy::default() },
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({ "model": self.model, "input": texts });
        let mut request = self.client.post(self.url.as_str()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| ContextError::provider(format!("request to {} failed: {e}", self.url), true))?;

        let status = response.status();
        if status.is_success() {
            let json: Value = response
                .json()
                .map_err(|e| ContextError::provider(format!("invalid response body: {e}"), true))?;
            return parse_response(&json);
        }

        let body_text = response.text().unwrap_or_default();
        let retryable = status.as_u16() == 429 || status.is_server_error();
        Err(ContextError::provider(format!("embedding API error {status}: {body_text}"), retryable))
    }
}

impl EmbeddingProvider for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.retry.run(|_| self.request(texts))?;
        check_batch(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}

fn parse_vector(value: &Value) -> Option<Vec<f32>> {
    value.as_array().map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

/// Extract vectors in input order from either response shape.
pub(crate) fn parse_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    if let Some(data) = json.get("data").and_then(Value::as_array) {
        let mut indexed = Vec::with_capacity(data.len());
        for (position, item) in data.iter().enumerate() {
            let vector = item
                .get("embedding")
                .and_then(parse_vector)
                .ok_or_else(|| ContextError::provider("response item missing embedding", false))?;
            let index = item.get("index").and_then(Value::as_u64).map_or(position, |i| i as usize);
            indexed.push((index, vector));
        }
        indexed.sort_by_key(|(index, _)| *index);
        return Ok(indexed.into_iter().map(|(_, v)| v).collect());
    }

    if let Some(embeddings) = json.get("embeddings").and_then(Value::as_array) {
        return embeddings
            .iter()
            .map(|e| parse_vector(e).ok_or_else(|| ContextError::provider("malformed embedding", false)))
            .collect();
    }

    Err(ContextError::provider("response has neither `data` nor `embeddings`", false))
}
