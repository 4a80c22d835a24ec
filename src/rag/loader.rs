//! Corpus discovery and text extraction.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::errors::ApiError;

/// Extensions picked up from the corpus directory. PDFs are the real corpus;
/// plain text files are accepted for notes and fixtures.
const PDF_EXTENSIONS: [&str; 1] = ["pdf"];
const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Path relative to the corpus directory, `/`-separated.
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    corpus_dir: PathBuf,
}

impl DocumentLoader {
    pub fn new(corpus_dir: PathBuf) -> Self {
        Self { corpus_dir }
    }

    pub fn corpus_dir(&self) -> &Path {
        &self.corpus_dir
    }

    /// Supported files under the corpus directory, in a stable order.
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.corpus_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| extension_of(path).is_some_and(|ext| is_supported(&ext)))
            .collect();
        files.sort();
        files
    }

    /// Loads every supported file. Files that cannot be read or yield no
    /// text are skipped with a warning.
    pub async fn load(&self) -> Result<Vec<LoadedDocument>, ApiError> {
        if !self.corpus_dir.is_dir() {
            tracing::warn!(
                "Corpus directory {} does not exist; nothing to index",
                self.corpus_dir.display()
            );
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for path in self.discover() {
            let source = self.source_name(&path);
            match extract_text(path.clone()).await {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::debug!("Loaded {} ({} chars)", source, text.chars().count());
                    documents.push(LoadedDocument { source, text });
                }
                Ok(_) => tracing::warn!("No extractable text in {}", source),
                Err(err) => tracing::warn!("Skipping {}: {}", source, err),
            }
        }

        tracing::info!(
            "Loaded {} document(s) from {}",
            documents.len(),
            self.corpus_dir.display()
        );
        Ok(documents)
    }

    fn source_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.corpus_dir)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

fn is_supported(ext: &str) -> bool {
    PDF_EXTENSIONS.contains(&ext) || TEXT_EXTENSIONS.contains(&ext)
}

async fn extract_text(path: PathBuf) -> Result<String, ApiError> {
    let data = tokio::fs::read(&path).await.map_err(ApiError::internal)?;

    if extension_of(&path).is_some_and(|ext| PDF_EXTENSIONS.contains(&ext.as_str())) {
        // pdf-extract is synchronous and may panic on malformed fonts; a
        // panic surfaces here as a JoinError.
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
            .await
            .map_err(|e| ApiError::Internal(format!("PDF extraction aborted: {}", e)))?
            .map_err(|e| ApiError::Internal(format!("PDF extraction failed: {}", e)))
    } else {
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}
