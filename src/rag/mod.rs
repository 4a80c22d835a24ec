//! Corpus indexing and similarity retrieval.
//!
//! - `DocumentLoader`: finds corpus files and extracts their text
//! - `RAGEngine`: splits text into overlapping chunks
//! - `RagStore` / `SqliteRagStore`: chunk + embedding storage with cosine search
//! - `IndexBuilder`: loads, chunks, embeds and stores the corpus
//! - `VectorRetriever`: the `Retriever` the tutor queries

mod embedder;
mod engine;
mod indexer;
mod loader;
mod retriever;
mod sqlite;
mod store;

pub use embedder::Embedder;
pub use engine::{RAGConfig, RAGEngine, TextChunk};
pub use indexer::{chunk_id, IndexBuilder, IndexReport};
pub use loader::{DocumentLoader, LoadedDocument};
pub use retriever::VectorRetriever;
pub use sqlite::SqliteRagStore;
pub use store::{ChunkSearchResult, RagStore, StoredChunk};
