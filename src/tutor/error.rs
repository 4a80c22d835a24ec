use thiserror::Error;

use super::intent::Intent;
use super::mcq::ShapeError;
use crate::core::errors::ApiError;

pub const INVALID_TOPIC_MESSAGE: &str =
    "🔍 Please specify a clear topic like: 'Generate 5 MCQs about Waves'";
pub const SHAPE_FALLBACK_MESSAGE: &str =
    "Couldn't generate valid MCQs. Please try rephrasing your request.";
pub const NOT_COVERED_MESSAGE: &str =
    "❌ This topic isn't covered in my materials. Ask about NEET-related subjects.";
pub const QUESTION_FAILURE_MESSAGE: &str = "❌ Error processing your question. Please try again.";

/// Everything that can stop a single query short of a generated answer.
///
/// None of these escape the orchestrator; each becomes exactly one
/// user-facing message.
#[derive(Debug, Error)]
pub enum TutorError {
    #[error("topic '{0}' is too short to search for")]
    InvalidTopic(String),
    #[error("no content found for topic '{topic}'")]
    NoContent { topic: String },
    #[error("query is not covered by the corpus")]
    NotCovered,
    #[error("retrieval failed: {source}")]
    Retrieval {
        topic: Option<String>,
        #[source]
        source: ApiError,
    },
    #[error("generation failed: {source}")]
    Generation {
        topic: Option<String>,
        #[source]
        source: ApiError,
    },
    #[error("generated MCQs were malformed: {0}")]
    Shape(#[from] ShapeError),
}

impl TutorError {
    /// `topic` is set for MCQ requests and selects the MCQ wording.
    pub fn retrieval(topic: Option<&str>, source: ApiError) -> Self {
        Self::Retrieval {
            topic: topic.map(str::to_string),
            source,
        }
    }

    pub fn generation(topic: Option<&str>, source: ApiError) -> Self {
        Self::Generation {
            topic: topic.map(str::to_string),
            source,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidTopic(_) => INVALID_TOPIC_MESSAGE.to_string(),
            Self::NoContent { topic } => format!(
                "❌ No content found for '{}'. Try: Gravitation, Optics, Electrostatics",
                topic
            ),
            Self::NotCovered => NOT_COVERED_MESSAGE.to_string(),
            Self::Retrieval { topic, .. } | Self::Generation { topic, .. } => match topic {
                Some(topic) => format!(
                    "❌ Failed to generate questions about {}. Please try again.",
                    topic
                ),
                None => QUESTION_FAILURE_MESSAGE.to_string(),
            },
            Self::Shape(_) => SHAPE_FALLBACK_MESSAGE.to_string(),
        }
    }

    /// Intent reported alongside the message. A shape failure drops the MCQ
    /// structuring, so the answer is reported as a plain question.
    pub fn reported_intent(&self, classified: Intent) -> Intent {
        match self {
            Self::Shape(_) => Intent::PlainQuestion,
            _ => classified,
        }
    }

    pub(crate) fn log(&self) {
        match self {
            Self::Retrieval { .. } | Self::Generation { .. } => {
                tracing::warn!("Query degraded to apology: {}", self)
            }
            _ => tracing::debug!("Query answered with guidance: {}", self),
        }
    }
}
