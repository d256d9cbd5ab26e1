//! Extraction model served over HTTP

use super::{ExtractionModel, FieldMap, ModelError, FIELD_NAMES};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for an HTTP extraction service
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub endpoint: url::Url,
    pub api_key: Option<String>,
    pub temperature: f64,
    /// Per-request bound enforced by the HTTP client
    pub request_timeout: Duration,
}

impl ModelConfig {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint).map_err(|e| Error::Config {
            reason: format!("Invalid model endpoint {:?}: {}", endpoint, e),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::Config {
                reason: format!("Unsupported model endpoint scheme: {}", endpoint.scheme()),
            });
        }
        Ok(Self {
            endpoint,
            api_key: None,
            temperature: 0.1,
            request_timeout: Duration::from_secs(30 * 60),
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
    prompt: &'a str,
    fields: &'a [&'a str],
    temperature: f64,
}

#[derive(Deserialize)]
struct ExtractResponse {
    extractions: Vec<Extraction>,
}

#[derive(Deserialize)]
struct Extraction {
    #[serde(alias = "extraction_class")]
    class: String,
    #[serde(alias = "extraction_text")]
    text: String,
}

/// Extraction model reached through a JSON POST endpoint.
///
/// Request: `{text, prompt, fields, temperature}`.
/// Response: `{"extractions": [{"class": field, "text": value}, ...]}`.
pub struct HttpExtractionModel {
    client: reqwest::Client,
    config: ModelConfig,
}

impl HttpExtractionModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }
}

/// Turn a response body into a field map, rejecting unknown fields.
fn parse_response(body: &str) -> std::result::Result<FieldMap, ModelError> {
    let response: ExtractResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Malformed(e.to_string()))?;

    let mut map = FieldMap::new();
    for extraction in response.extractions {
        map.push(&extraction.class, extraction.text)?;
    }
    Ok(map)
}

impl ExtractionModel for HttpExtractionModel {
    async fn extract(&self, text: &str, prompt: &str) -> std::result::Result<FieldMap, ModelError> {
        let body = ExtractRequest {
            text,
            prompt,
            fields: FIELD_NAMES,
            temperature: self.config.temperature,
        };

        let mut request = self.client.post(self.config.endpoint.clone()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout {
                    seconds: self.config.request_timeout.as_secs(),
                }
            } else {
                ModelError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        parse_response(&body)
    }
}
