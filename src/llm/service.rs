use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::gemini::GeminiProvider;
use super::openai_compatible::OpenAiCompatibleProvider;
use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};
use crate::core::config::{LlmProviderKind, LlmSettings};
use crate::core::errors::ApiError;
use crate::rag::Embedder;
use crate::tutor::Generator;

/// The configured provider plus the models and sampling values to use with
/// it.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl LlmService {
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        let provider: Arc<dyn LlmProvider> = match settings.provider {
            LlmProviderKind::Gemini => {
                let api_key = settings.api_key.clone().ok_or_else(|| {
                    ApiError::BadRequest(
                        "llm.api_key (or GEMINI_API_KEY) is required for the gemini provider"
                            .to_string(),
                    )
                })?;
                Arc::new(GeminiProvider::new(
                    settings.base_url.clone(),
                    api_key,
                    client,
                ))
            }
            LlmProviderKind::OpenAiCompatible => Arc::new(OpenAiCompatibleProvider::new(
                settings.base_url.clone(),
                settings.api_key.clone(),
                client,
            )),
        };

        tracing::info!(
            "Using {} provider (chat: {}, embeddings: {})",
            provider.name(),
            settings.model,
            settings.embedding_model
        );

        Ok(Self::with_provider(provider, settings.clone()))
    }

    pub fn with_provider(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await.unwrap_or(false)
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<String, ApiError> {
        let request = request.with_settings(&self.settings);
        self.provider.chat(request, &self.settings.model).await
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        self.provider
            .embed(inputs, &self.settings.embedding_model)
            .await
    }
}

#[async_trait]
impl Generator for LlmService {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        self.chat(ChatRequest::new(vec![ChatMessage::user(prompt)]))
            .await
    }
}

#[async_trait]
impl Embedder for LlmService {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        LlmService::embed(self, inputs).await
    }
}
