//! Typed view over the merged YAML configuration.
//!
//! The raw config stays a `serde_json::Value` (so it can be redacted and
//! echoed back as-is); services read the fields they need through
//! [`Settings::from_value`], which fills in defaults for anything missing.

use std::env;

use serde_json::Value;

pub const DEFAULT_MAX_INPUT_LENGTH: usize = 4000;
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_RETRIEVAL_K: usize = 3;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_COMPATIBLE_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    Gemini,
    OpenAiCompatible,
}

impl LlmProviderKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "openai_compatible" | "openai" | "ollama" | "lmstudio" => Some(Self::OpenAiCompatible),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAiCompatible => "openai_compatible",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => GEMINI_BASE_URL,
            Self::OpenAiCompatible => OPENAI_COMPATIBLE_BASE_URL,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-1.5-pro-latest",
            Self::OpenAiCompatible => "llama3.1",
        }
    }

    fn default_embedding_model(&self) -> &'static str {
        match self {
            Self::Gemini => "text-embedding-004",
            Self::OpenAiCompatible => "nomic-embed-text",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RagSettings {
    pub corpus_dir: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct TutorSettings {
    pub retrieval_k: usize,
    /// Upper bound on the joined context handed to the prompt builder.
    pub max_context_chars: Option<usize>,
}

impl Default for TutorSettings {
    fn default() -> Self {
        Self {
            retrieval_k: DEFAULT_RETRIEVAL_K,
            max_context_chars: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub max_input_length: usize,
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub rag: RagSettings,
    pub tutor: TutorSettings,
}

impl Settings {
    pub fn from_value(config: &Value) -> Self {
        let app = config.get("app");
        let server = config.get("server");
        let llm = config.get("llm");
        let rag = config.get("rag");
        let tutor = config.get("tutor");

        let max_input_length = get_u64(app, "max_input_length")
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_INPUT_LENGTH);

        let port = env::var("PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
            .or_else(|| get_u64(server, "port").map(|v| v as u16))
            .unwrap_or(DEFAULT_PORT);

        let server = ServerSettings {
            host: get_str(server, "host").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            cors_allowed_origins: server
                .and_then(|s| s.get("cors_allowed_origins"))
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };

        let provider = get_str(llm, "provider")
            .and_then(|name| LlmProviderKind::parse(&name))
            .unwrap_or(LlmProviderKind::Gemini);

        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|_| provider == LlmProviderKind::Gemini)
            .or_else(|| env::var("LLM_API_KEY").ok())
            .or_else(|| get_str(llm, "api_key"))
            .filter(|key| !key.trim().is_empty());

        let llm = LlmSettings {
            provider,
            base_url: get_str(llm, "base_url")
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            model: get_str(llm, "model").unwrap_or_else(|| provider.default_model().to_string()),
            embedding_model: get_str(llm, "embedding_model")
                .unwrap_or_else(|| provider.default_embedding_model().to_string()),
            api_key,
            temperature: llm.and_then(|v| v.get("temperature")).and_then(Value::as_f64),
            max_tokens: get_u64(llm, "max_tokens").map(|v| v as u32),
            timeout_secs: get_u64(llm, "timeout_secs").unwrap_or(60),
        };

        let rag = RagSettings {
            corpus_dir: get_str(rag, "corpus_dir"),
            chunk_size: get_u64(rag, "chunk_size").map(|v| v as usize).unwrap_or(1000),
            chunk_overlap: get_u64(rag, "chunk_overlap").map(|v| v as usize).unwrap_or(200),
            embed_batch_size: get_u64(rag, "embed_batch_size")
                .map(|v| v as usize)
                .unwrap_or(32),
        };

        let tutor = TutorSettings {
            retrieval_k: get_u64(tutor, "retrieval_k")
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_RETRIEVAL_K),
            max_context_chars: get_u64(tutor, "max_context_chars").map(|v| v as usize),
        };

        Settings {
            max_input_length,
            server,
            llm,
            rag,
            tutor,
        }
    }
}

fn get_str(section: Option<&Value>, key: &str) -> Option<String> {
    section
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn get_u64(section: Option<&Value>, key: &str) -> Option<u64> {
    section.and_then(|v| v.get(key)).and_then(Value::as_u64)
}
