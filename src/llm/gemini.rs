use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Generative Language API (`v1beta`).
#[derive(Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(base_url: String, api_key: String, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    fn model_url(&self, model_id: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.base_url,
            model_id.trim_start_matches("models/"),
            method
        )
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, ApiError> {
        let res = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Gemini request failed ({}): {}",
                status, text
            )));
        }

        res.json().await.map_err(ApiError::internal)
    }
}

/// System messages become `systemInstruction`; assistant turns use the
/// `model` role.
fn generate_body(request: &ChatRequest) -> Value {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for message in &request.messages {
        match message.role.as_str() {
            "system" => system_parts.push(json!({ "text": message.content })),
            role => {
                let role = if role == "assistant" { "model" } else { "user" };
                contents.push(json!({
                    "role": role,
                    "parts": [{ "text": message.content }],
                }));
            }
        }
    }

    let mut body = json!({ "contents": contents });
    if let Some(obj) = body.as_object_mut() {
        if !system_parts.is_empty() {
            obj.insert(
                "systemInstruction".to_string(),
                json!({ "parts": system_parts }),
            );
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(t) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(t));
        }
        if !generation_config.is_empty() {
            obj.insert(
                "generationConfig".to_string(),
                Value::Object(generation_config),
            );
        }
    }

    body
}

fn candidate_text(payload: &Value) -> Result<String, ApiError> {
    let parts = payload["candidates"][0]["content"]["parts"]
        .as_array()
        .filter(|parts| !parts.is_empty());

    match parts {
        Some(parts) => Ok(parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join("")),
        None => {
            let reason = payload["promptFeedback"]["blockReason"]
                .as_str()
                .or_else(|| payload["candidates"][0]["finishReason"].as_str())
                .unwrap_or("no candidates");
            Err(ApiError::Internal(format!(
                "Gemini returned no text: {}",
                reason
            )))
        }
    }
}

fn batch_embed_body(inputs: &[String], model_id: &str) -> Value {
    let model = format!("models/{}", model_id.trim_start_matches("models/"));
    let requests: Vec<Value> = inputs
        .iter()
        .map(|text| {
            json!({
                "model": model,
                "content": { "parts": [{ "text": text }] },
            })
        })
        .collect();

    json!({ "requests": requests })
}

fn embedding_values(payload: &Value) -> Vec<Vec<f32>> {
    payload["embeddings"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    item["values"]
                        .as_array()
                        .map(|vals| {
                            vals.iter()
                                .filter_map(|v| v.as_f64().map(|f| f as f32))
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let res = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = self.model_url(model_id, "generateContent");
        let payload = self.post(&url, &generate_body(&request)).await?;
        candidate_text(&payload)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.model_url(model_id, "batchEmbedContents");
        let payload = self.post(&url, &batch_embed_body(inputs, model_id)).await?;
        let vectors = embedding_values(&payload);

        if vectors.len() != inputs.len() {
            return Err(ApiError::Internal(format!(
                "Gemini returned {} embeddings for {} inputs",
                vectors.len(),
                inputs.len()
            )));
        }

        Ok(vectors)
    }
}
