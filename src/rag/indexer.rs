use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::embedder::Embedder;
use super::engine::{RAGEngine, TextChunk};
use super::loader::DocumentLoader;
use super::store::{RagStore, StoredChunk};
use crate::core::errors::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    /// True when an existing index was reused as-is.
    pub reused: bool,
}

/// Builds the similarity index from the corpus once, and again on demand.
pub struct IndexBuilder {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn Embedder>,
    loader: DocumentLoader,
    engine: RAGEngine,
    embedding_model: String,
    batch_size: usize,
    // Serialises ensure/rebuild so two builds never interleave.
    guard: Mutex<()>,
}

pub fn chunk_id(source: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(chunk_index.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

impl IndexBuilder {
    pub fn new(
        store: Arc<dyn RagStore>,
        embedder: Arc<dyn Embedder>,
        loader: DocumentLoader,
        engine: RAGEngine,
        embedding_model: String,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            loader,
            engine,
            embedding_model,
            batch_size: batch_size.max(1),
            guard: Mutex::new(()),
        }
    }

    /// Builds the index unless one already exists for the configured
    /// embedding model. A stale index from another model is discarded.
    pub async fn ensure_index(&self) -> Result<IndexReport, ApiError> {
        let _guard = self.guard.lock().await;

        let existing = self.store.count().await?;
        let model = self.store.embedding_model().await?;
        if existing > 0 && model.as_deref() == Some(self.embedding_model.as_str()) {
            tracing::info!("Reusing existing index with {} chunk(s)", existing);
            return Ok(IndexReport {
                documents: 0,
                chunks: existing,
                reused: true,
            });
        }

        if existing > 0 {
            tracing::warn!(
                "Index was built with {:?}, rebuilding for {}",
                model,
                self.embedding_model
            );
        }

        self.build().await
    }

    /// Builds the index again from the corpus and swaps it in.
    pub async fn rebuild(&self) -> Result<IndexReport, ApiError> {
        let _guard = self.guard.lock().await;
        self.build().await
    }

    /// Embeds the whole corpus, then swaps it in with a single `reindex`.
    /// Until that commit the previous index keeps serving queries; a failed
    /// build leaves it untouched.
    async fn build(&self) -> Result<IndexReport, ApiError> {
        let documents = self.loader.load().await?;
        let chunks: Vec<TextChunk> = documents
            .iter()
            .flat_map(|doc| self.engine.split_into_chunks(&doc.text, &doc.source))
            .collect();

        let mut items = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await.map_err(|err| {
                tracing::warn!(
                    "Index build aborted after {} of {} chunk(s): {}",
                    items.len(),
                    chunks.len(),
                    err
                );
                err
            })?;
            if embeddings.len() != batch.len() {
                return Err(ApiError::Internal(format!(
                    "Embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            items.extend(
                batch
                    .iter()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| (to_stored(chunk), embedding)),
            );
        }

        self.store.reindex(items, &self.embedding_model).await?;

        tracing::info!(
            "Indexed {} chunk(s) from {} document(s)",
            chunks.len(),
            documents.len()
        );

        Ok(IndexReport {
            documents: documents.len(),
            chunks: chunks.len(),
            reused: false,
        })
    }
}

fn to_stored(chunk: &TextChunk) -> StoredChunk {
    StoredChunk {
        chunk_id: chunk_id(&chunk.source, chunk.chunk_index),
        content: chunk.text.clone(),
        source: chunk.source.clone(),
        metadata: Some(json!({
            "chunk_index": chunk.chunk_index,
            "start_offset": chunk.start_offset,
        })),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::rag::engine::RAGConfig;
    use crate::rag::sqlite::SqliteRagStore;

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<SqliteRagStore>,
        embedder: Arc<CountingEmbedder>,
        corpus: std::path::PathBuf,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("Data");
        fs::create_dir_all(&corpus).unwrap();
        fs::write(corpus.join("gravitation.txt"), "Gravity. ".repeat(40)).unwrap();
        fs::write(corpus.join("optics.txt"), "Light bends.").unwrap();

        let store = Arc::new(
            SqliteRagStore::with_path(dir.path().join("index.db"))
                .await
                .unwrap(),
        );

        Fixture {
            _dir: dir,
            store,
            embedder: Arc::new(CountingEmbedder::default()),
            corpus,
        }
    }

    /// Succeeds for the first `ok_calls` calls, then reports a quota error.
    struct QuotaEmbedder {
        ok_calls: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for QuotaEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
                return Err(ApiError::ServiceUnavailable("quota".to_string()));
            }
            Ok(inputs.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    /// Pauses inside its first call until released.
    #[derive(Default)]
    struct GatedEmbedder {
        entered: Notify,
        release: Notify,
        paused: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for GatedEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            if self.paused.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(inputs.iter().map(|_| vec![0.0, 1.0]).collect())
        }
    }

    fn builder(fixture: &Fixture, model: &str) -> IndexBuilder {
        builder_with(fixture, fixture.embedder.clone(), model)
    }

    fn builder_with(fixture: &Fixture, embedder: Arc<dyn Embedder>, model: &str) -> IndexBuilder {
        IndexBuilder::new(
            fixture.store.clone(),
            embedder,
            DocumentLoader::new(fixture.corpus.clone()),
            RAGEngine::new(RAGConfig {
                chunk_size: 100,
                chunk_overlap: 20,
            }),
            model.to_string(),
            2,
        )
    }

    #[test]
    fn chunk_ids_are_stable_hex_digests() {
        let id = chunk_id("physics.pdf", 0);
        assert_eq!(id.len(), 64);
        assert_eq!(id, chunk_id("physics.pdf", 0));
        assert_ne!(id, chunk_id("physics.pdf", 1));
    }

    #[tokio::test]
    async fn ensure_index_builds_once_then_reuses() {
        let fixture = fixture().await;
        let builder = builder(&fixture, "embed-a");

        let first = builder.ensure_index().await.unwrap();
        assert_eq!(first.documents, 2);
        assert!(first.chunks >= 3);
        assert!(!first.reused);
        assert_eq!(fixture.store.count().await.unwrap(), first.chunks);
        let calls = fixture.embedder.calls.load(Ordering::SeqCst);
        assert_eq!(calls, first.chunks.div_ceil(2));

        let second = builder.ensure_index().await.unwrap();
        assert!(second.reused);
        assert_eq!(second.chunks, first.chunks);
        assert_eq!(fixture.embedder.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn model_change_triggers_rebuild() {
        let fixture = fixture().await;
        builder(&fixture, "embed-a").ensure_index().await.unwrap();

        let report = builder(&fixture, "embed-b").ensure_index().await.unwrap();

        assert!(!report.reused);
        assert_eq!(
            fixture.store.embedding_model().await.unwrap().as_deref(),
            Some("embed-b")
        );
    }

    #[tokio::test]
    async fn rebuild_picks_up_new_documents() {
        let fixture = fixture().await;
        let builder = builder(&fixture, "embed-a");
        let before = builder.ensure_index().await.unwrap();

        fs::write(fixture.corpus.join("waves.md"), "Sound is a wave.").unwrap();
        let after = builder.rebuild().await.unwrap();

        assert_eq!(after.documents, 3);
        assert_eq!(after.chunks, before.chunks + 1);
        assert_eq!(fixture.store.count().await.unwrap(), after.chunks);
    }

    #[tokio::test]
    async fn empty_corpus_builds_empty_index() {
        let fixture = fixture().await;
        fs::remove_file(fixture.corpus.join("gravitation.txt")).unwrap();
        fs::remove_file(fixture.corpus.join("optics.txt")).unwrap();

        let report = builder(&fixture, "embed-a").ensure_index().await.unwrap();

        assert_eq!(report, IndexReport::default());
        assert_eq!(fixture.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_first_build_leaves_no_index_to_reuse() {
        let fixture = fixture().await;
        let quota = Arc::new(QuotaEmbedder {
            ok_calls: 1,
            calls: AtomicUsize::new(0),
        });

        let err = builder_with(&fixture, quota, "embed-a")
            .ensure_index()
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));
        assert_eq!(fixture.store.count().await.unwrap(), 0);
        assert_eq!(fixture.store.embedding_model().await.unwrap(), None);

        let retry = builder(&fixture, "embed-a").ensure_index().await.unwrap();
        assert!(!retry.reused);
        assert_eq!(fixture.store.count().await.unwrap(), retry.chunks);
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_the_previous_index() {
        let fixture = fixture().await;
        let before = builder(&fixture, "embed-a").ensure_index().await.unwrap();

        let quota = Arc::new(QuotaEmbedder {
            ok_calls: 1,
            calls: AtomicUsize::new(0),
        });
        assert!(builder_with(&fixture, quota, "embed-b")
            .rebuild()
            .await
            .is_err());

        assert_eq!(fixture.store.count().await.unwrap(), before.chunks);
        assert_eq!(
            fixture.store.embedding_model().await.unwrap().as_deref(),
            Some("embed-a")
        );
    }

    #[tokio::test]
    async fn previous_index_serves_while_rebuilding() {
        let fixture = fixture().await;
        let before = builder(&fixture, "embed-a").ensure_index().await.unwrap();
        let gated = Arc::new(GatedEmbedder::default());
        let rebuilding = builder_with(&fixture, gated.clone(), "embed-a");

        let observe = async {
            gated.entered.notified().await;
            let during = fixture.store.count().await.unwrap();
            gated.release.notify_one();
            during
        };
        let (report, during) = tokio::join!(rebuilding.rebuild(), observe);

        assert_eq!(during, before.chunks);
        assert_eq!(report.unwrap().chunks, before.chunks);
        let hits = fixture.store.search(&[0.0, 1.0], 1).await.unwrap();
        assert!(hits[0].score > 0.99);
    }
}
