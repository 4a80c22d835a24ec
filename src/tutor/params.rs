//! Question count and topic extraction for MCQ requests.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const MIN_QUESTION_COUNT: u32 = 1;
pub const MAX_QUESTION_COUNT: u32 = 10;
pub const MIN_TOPIC_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqParameters {
    pub question_count: u32,
    pub topic: String,
}

impl McqParameters {
    /// A topic shorter than three characters counts as no topic at all.
    pub fn has_usable_topic(&self) -> bool {
        is_usable_topic(&self.topic)
    }
}

static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(mcq|mcg|questions|qs)").unwrap());

static COUNT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b\d+\s*(mcqs?|mcgs?|questions|qs)\b").unwrap());

static COMMAND_WORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(generate|create|make|get|give me|prepare|mcqs?|mcg|questions|practice|test|about|from chapter|from|on|please|pls)\b\s*(\d+\s*)?",
    )
    .unwrap()
});

static FILLER_WORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(chapter|topic|of|the|on|about)\b").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub fn extract(query: &str) -> McqParameters {
    McqParameters {
        question_count: extract_question_count(query),
        topic: extract_topic(query),
    }
}

pub fn extract_question_count(query: &str) -> u32 {
    let Some(captures) = COUNT_RE.captures(query) else {
        return DEFAULT_QUESTION_COUNT;
    };

    // Digit runs too long for u32 are certainly above the ceiling.
    captures[1]
        .parse::<u32>()
        .unwrap_or(MAX_QUESTION_COUNT)
        .clamp(MIN_QUESTION_COUNT, MAX_QUESTION_COUNT)
}

pub fn extract_topic(query: &str) -> String {
    let without_count = COUNT_TOKEN_RE.replace_all(query, " ");
    let without_commands = COMMAND_WORDS_RE.replace_all(&without_count, " ");
    let without_fillers = FILLER_WORDS_RE.replace_all(&without_commands, " ");
    let collapsed = WHITESPACE_RE.replace_all(&without_fillers, " ");

    collapsed
        .trim()
        .trim_end_matches(['?', '.', '!', ','])
        .trim()
        .to_string()
}

pub fn is_usable_topic(topic: &str) -> bool {
    topic.trim().chars().count() >= MIN_TOPIC_CHARS
}
