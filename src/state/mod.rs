use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::security::{init_admin_token, AdminToken, RunToken};
use crate::history::HistoryStore;
use crate::llm::LlmService;
use crate::rag::{DocumentLoader, IndexBuilder, RAGConfig, RAGEngine, RagStore, SqliteRagStore, VectorRetriever};
use crate::tutor::ChatOrchestrator;

pub mod error;

use error::InitializationError;

/// Application state shared across all routes and background tasks.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub admin_token: AdminToken,
    pub run_token: RunToken,
    pub started_at: DateTime<Utc>,
    pub history: HistoryStore,
    pub rag_store: Arc<dyn RagStore>,
    pub llm: Arc<LlmService>,
    pub indexer: Arc<IndexBuilder>,
    pub orchestrator: ChatOrchestrator,
}

impl AppState {
    /// Loads configuration, connects the configured LLM provider and wires
    /// up the rest of the state.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let llm =
            LlmService::from_settings(&settings.llm).map_err(|e| InitializationError::Llm(e.into()))?;

        Self::assemble(paths, config, settings, llm).await
    }

    /// Opens the stores and injects the collaborators into the orchestrator.
    pub async fn assemble(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        llm: LlmService,
    ) -> Result<Arc<Self>, InitializationError> {
        let admin_token = init_admin_token(&paths);
        let run_token = RunToken::generate();
        tracing::info!("Run token {}", run_token.value());

        let history = HistoryStore::new(paths.history_db_path.clone())
            .await
            .map_err(|e| InitializationError::History(e.into()))?;

        let rag_store: Arc<dyn RagStore> = Arc::new(
            SqliteRagStore::new(paths.as_ref())
                .await
                .map_err(|e| InitializationError::Rag(e.into()))?,
        );

        let llm = Arc::new(llm);

        let corpus_dir = settings
            .rag
            .corpus_dir
            .as_deref()
            .map(|dir| paths.resolve(dir))
            .unwrap_or_else(|| paths.corpus_dir.clone());

        let indexer = Arc::new(IndexBuilder::new(
            rag_store.clone(),
            llm.clone(),
            DocumentLoader::new(corpus_dir),
            RAGEngine::new(RAGConfig::from(&settings.rag)),
            settings.llm.embedding_model.clone(),
            settings.rag.embed_batch_size,
        ));

        let retriever = Arc::new(VectorRetriever::new(rag_store.clone(), llm.clone()));
        let orchestrator = ChatOrchestrator::new(retriever, llm.clone(), settings.tutor.clone());

        Ok(Arc::new(AppState {
            paths,
            config,
            settings: Arc::new(settings),
            admin_token,
            run_token,
            started_at: Utc::now(),
            history,
            rag_store,
            llm,
            indexer,
            orchestrator,
        }))
    }
}
