//! Splits extracted document text into overlapping chunks for indexing.

use serde::{Deserialize, Serialize};

use crate::core::config::RagSettings;

/// Chunking parameters, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RAGConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for RAGConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl From<&RagSettings> for RAGConfig {
    fn from(settings: &RagSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }
}

/// A text chunk with source information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    /// Source identifier (file path relative to the corpus)
    pub source: String,
    /// Character offset in original document
    pub start_offset: usize,
    /// Chunk index within the source
    pub chunk_index: usize,
}

pub struct RAGEngine {
    config: RAGConfig,
}

impl RAGEngine {
    pub fn new(config: RAGConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RAGConfig {
        &self.config
    }

    /// Split text into overlapping chunks, cutting at a sentence end when
    /// one falls in the last fifth of the window. Blank chunks are skipped.
    pub fn split_into_chunks(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let chunk_size = self.config.chunk_size.max(1);
        let step = chunk_size.saturating_sub(self.config.chunk_overlap).max(1);

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let window: String = chars[start..end].iter().collect();

            let final_text = if end < total_chars {
                cut_at_sentence_boundary(&window)
            } else {
                window.as_str()
            };

            let trimmed = final_text.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    source: source.to_string(),
                    start_offset: start,
                    chunk_index: chunks.len(),
                });
            }

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

fn cut_at_sentence_boundary(text: &str) -> &str {
    let sentence_endings = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    let skip = text.chars().count() * 80 / 100;
    let search_start = text
        .char_indices()
        .nth(skip)
        .map_or(text.len(), |(offset, _)| offset);
    let search_text = &text[search_start..];

    for ending in sentence_endings.iter() {
        if let Some(pos) = search_text.rfind(ending) {
            return &text[..search_start + pos + ending.len()];
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(chunk_size: usize, chunk_overlap: usize) -> RAGEngine {
        RAGEngine::new(RAGConfig {
            chunk_size,
            chunk_overlap,
        })
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = engine(1000, 200).split_into_chunks("  Newton's first law.  ", "physics.pdf");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Newton's first law.");
        assert_eq!(chunks[0].source, "physics.pdf");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn chunks_overlap_and_advance_by_step() {
        let text = "abcdefghij".repeat(3);
        let chunks = engine(10, 4).split_into_chunks(&text, "doc");

        let offsets: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
        assert_eq!(offsets, vec![0, 6, 12, 18, 24]);
        assert_eq!(chunks[1].text, "ghijabcdef");
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 10));
        assert_eq!(chunks.last().map(|c| c.text.as_str()), Some("efghij"));
    }

    #[test]
    fn chunks_prefer_sentence_ends() {
        let text = "This is a test. ".repeat(20);
        let chunks = engine(100, 20).split_into_chunks(&text, "test");

        assert!(chunks.len() >= 2);
        assert!(chunks[0].text.ends_with("test."));
    }

    #[test]
    fn multibyte_text_does_not_split_inside_characters() {
        let text = "ऊर्जा संरक्षण। ".repeat(50);
        let chunks = engine(64, 16).split_into_chunks(&text, "hindi.pdf");
        assert!(!chunks.is_empty());
    }

    #[test]
    fn sentence_search_window_counts_characters() {
        // 40 chars but 80 bytes; the full stop sits at char 24, outside the last fifth.
        let early_stop = format!("{}xxxx. {}", "ऊ".repeat(20), "y".repeat(14));
        assert_eq!(cut_at_sentence_boundary(&early_stop), early_stop);

        let late_stop = format!("{}. yyyy", "ऊ".repeat(34));
        assert_eq!(
            cut_at_sentence_boundary(&late_stop),
            format!("{}. ", "ऊ".repeat(34))
        );
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(engine(100, 20).split_into_chunks("", "a").is_empty());
        assert!(engine(100, 20).split_into_chunks(" \n\t ", "a").is_empty());
    }
}
