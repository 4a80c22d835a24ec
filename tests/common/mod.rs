#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use neet_tutor::core::config::{AppPaths, ConfigService, Settings};
use neet_tutor::core::errors::ApiError;
use neet_tutor::llm::{ChatRequest, LlmProvider, LlmService};
use neet_tutor::state::AppState;

pub const GRAVITATION_MCQS: &str = "Here are your questions:

1. What keeps the Moon in orbit around the Earth?
a) Magnetic force
b) Gravitational force (Correct)
c) Friction
d) Buoyancy

2. The value of G is approximately
a) 9.8 m/s²
b) 3.0 × 10⁸ m/s
c) 6.67 × 10⁻¹¹ N·m²/kg² (Correct)
d) 1.6 × 10⁻¹⁹ C";

/// Scripted provider: MCQ prompts get `mcq_reply`, everything else an echo
/// of the question. Embeddings are keyword indicators.
pub struct ScriptedProvider {
    pub mcq_reply: String,
    pub fail_chat: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(mcq_reply: &str) -> Arc<Self> {
        Arc::new(Self {
            mcq_reply: mcq_reply.to_string(),
            fail_chat: false,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            mcq_reply: String::new(),
            fail_chat: true,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

fn keyword_vector(text: &str) -> Vec<f32> {
    let text = text.to_lowercase();
    let hit = |words: &[&str]| f32::from(u8::from(words.iter().any(|w| text.contains(w))));
    vec![
        hit(&["gravit", "orbit"]),
        hit(&["osmosis", "membrane"]),
        hit(&["optic", "lens", "light"]),
        0.05,
    ]
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(!self.fail_chat)
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt.clone());

        if self.fail_chat {
            return Err(ApiError::ServiceUnavailable("quota exhausted".to_string()));
        }

        if prompt.contains("NEET MCQ Generation Task") {
            Ok(self.mcq_reply.clone())
        } else {
            let question = prompt
                .lines()
                .find_map(|line| line.strip_prefix("Question: "))
                .unwrap_or_default();
            Ok(format!("Answer to: {}", question))
        }
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|text| keyword_vector(text)).collect())
    }
}

pub fn write_corpus(root: &Path) {
    let corpus = root.join("Data");
    fs::create_dir_all(&corpus).unwrap();
    fs::write(
        corpus.join("gravitation.txt"),
        "Gravitation is the force of attraction between masses. The Moon stays in orbit because of gravity.",
    )
    .unwrap();
    fs::write(
        corpus.join("biology.md"),
        "Osmosis is the movement of water across a semi-permeable membrane.",
    )
    .unwrap();
}

pub async fn build_state(root: &Path, provider: Arc<ScriptedProvider>) -> Arc<AppState> {
    let paths = Arc::new(AppPaths::with_dirs(root.to_path_buf(), root.join("user-data")));
    let config = ConfigService::new(paths.clone());
    let settings = Settings::from_value(&json!({
        "llm": { "provider": "openai_compatible", "embedding_model": "keywords" },
        "app": { "max_input_length": 200 }
    }));
    let llm = LlmService::with_provider(provider, settings.llm.clone());

    AppState::assemble(paths, config, settings, llm)
        .await
        .unwrap()
}
