//! OpenAI-compatible vision client.
//!
//! Works with OpenAI, OpenRouter, and any endpoint exposing
//! `/v1/chat/completions` with image inputs and JSON responses.
//!
//! One client serves two collaborators:
//! - [`SchemaGenerator`]: asks the model which attributes matter for a part
//!   type and how to prompt for them
//! - [`AttributeExtractor`]: reads a product image against that schema and
//!   returns `{attribute: {value, confidence}}`

use async_trait::async_trait;
use forgebom_config::VisionConfig;
use forgebom_core::{
    AdapterError, AttributeExtractor, AttributeReadings, AttributeSchema, AttributeValue,
    SchemaGenerator,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

const SCHEMA_ENGINEER_INSTRUCTION: &str = "\
You are a robotics engineer writing instructions for a vision model that reads \
drone component product images and spec sheets. Given a part_type, decide which \
engineering attributes matter most for physically assembling that part \
(mounting patterns, diameters, widths, sizes). Respond with ONLY a JSON object: \
{\"prompt_text\": string, \"json_schema\": object mapping each attribute name to \
{\"value\": type, \"confidence\": \"float\"}}. Every attribute must carry a \
confidence between 0.0 and 1.0.";

/// An OpenAI-compatible chat completion client with image support.
pub struct OpenAiVisionClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiVisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiVisionClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiVisionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    pub fn from_config(config: &VisionConfig) -> Result<Self, AdapterError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AdapterError::NotConfigured("vision api_key is not set".into()))?;
        Self::new(
            &config.api_url,
            api_key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one JSON-mode chat completion and return the message content.
    async fn complete_json(&self, messages: Value) -> Result<String, AdapterError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.0,
            "response_format": {"type": "json_object"},
        });

        debug!(model = %self.model, "Sending vision request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout(e.to_string())
                } else {
                    AdapterError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(AdapterError::RateLimited {
                service: "vision".into(),
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(AdapterError::ApiError {
                status_code: status,
                message: "Invalid API key or insufficient permissions".into(),
            });
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Vision endpoint returned error");
            return Err(AdapterError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(format!("Failed to parse response: {e}")))?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AdapterError::Parse("No content in response".into()))
    }
}

#[async_trait]
impl SchemaGenerator for OpenAiVisionClient {
    async fn generate_attribute_schema(
        &self,
        part_type: &str,
    ) -> Result<Option<AttributeSchema>, AdapterError> {
        let messages = json!([
            {"role": "system", "content": SCHEMA_ENGINEER_INSTRUCTION},
            {"role": "user", "content": format!("part_type: \"{part_type}\"")},
        ]);
        let content = self.complete_json(messages).await?;
        parse_schema(&content)
    }
}

#[async_trait]
impl AttributeExtractor for OpenAiVisionClient {
    async fn extract_attributes(
        &self,
        image_url: &str,
        part_type: &str,
        schema: &AttributeSchema,
    ) -> Result<AttributeReadings, AdapterError> {
        let system = format!(
            "{}\nRespond with ONLY a JSON object matching this schema: {}\n\
             If the image cannot be read, respond with {{\"error\": \"reason\"}}.",
            schema.prompt_text, schema.json_schema
        );
        let messages = json!([
            {"role": "system", "content": system},
            {"role": "user", "content": [
                {"type": "text", "text": format!("Part type: {part_type}")},
                {"type": "image_url", "image_url": {"url": image_url}},
            ]},
        ]);
        let content = self.complete_json(messages).await?;
        parse_readings(&content)
    }
}

/// Models sometimes wrap JSON in a markdown fence despite JSON mode.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn parse_object(content: &str) -> Result<serde_json::Map<String, Value>, AdapterError> {
    match serde_json::from_str::<Value>(strip_code_fence(content)) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AdapterError::Parse(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(AdapterError::Parse(e.to_string())),
    }
}

/// Parse a schema response. `json_schema` may arrive as an object or as a
/// string holding JSON.
pub fn parse_schema(content: &str) -> Result<Option<AttributeSchema>, AdapterError> {
    let mut map = parse_object(content)?;

    let prompt_text = match map.remove("prompt_text") {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        _ => return Ok(None),
    };
    let json_schema = match map.remove("json_schema") {
        Some(Value::String(s)) => serde_json::from_str(strip_code_fence(&s))
            .map_err(|e| AdapterError::Parse(format!("json_schema is not JSON: {e}")))?,
        Some(v @ Value::Object(_)) => v,
        _ => Value::Object(serde_json::Map::new()),
    };

    Ok(Some(AttributeSchema {
        prompt_text,
        json_schema,
    }))
}

/// Parse an extraction response into readings. A top-level `error` key is
/// the oracle declining; entries that are not `{value, confidence}` objects
/// are skipped.
pub fn parse_readings(content: &str) -> Result<AttributeReadings, AdapterError> {
    let map = parse_object(content)?;

    if let Some(error) = map.get("error") {
        let reason = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(AdapterError::Oracle(reason));
    }

    let mut readings = AttributeReadings::new();
    for (name, entry) in map {
        if !entry.is_object() {
            debug!(attribute = %name, "Skipping malformed reading");
            continue;
        }
        match serde_json::from_value::<AttributeValue>(entry) {
            Ok(reading) => {
                readings.insert(name, reading);
            }
            Err(e) => debug!(attribute = %name, error = %e, "Skipping malformed reading"),
        }
    }
    Ok(readings)
}

// --- OpenAI API response types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}
