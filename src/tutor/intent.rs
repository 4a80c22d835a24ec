//! Query intent classification.
//!
//! Greetings win over MCQ requests; anything else is a plain question.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    McqRequest,
    PlainQuestion,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::McqRequest => "mcq_request",
            Intent::PlainQuestion => "plain_question",
        }
    }
}

static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(hello|hi|hey|greetings|good morning|good afternoon|good evening|bye|goodbye|see you|take care)\b",
    )
    .unwrap()
});

static FAREWELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(bye|goodbye|see you|take care)\b").unwrap());

/// Typo tolerant on purpose ("mcg"); over-matching is accepted.
static MCQ_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(mcqs?|mcg|questions|practice|test)\b",
        r"\b(generate|create|prepare)\s+\d*",
        r"\babout\s+\w+",
        r"\bfrom\s+(chapter\s+)?\w+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

pub fn is_greeting(query: &str) -> bool {
    GREETING_RE.is_match(&normalize(query))
}

pub fn is_mcq_request(query: &str) -> bool {
    let query = normalize(query);
    MCQ_PATTERNS.iter().any(|re| re.is_match(&query))
}

pub fn classify(query: &str) -> Intent {
    if is_greeting(query) {
        Intent::Greeting
    } else if is_mcq_request(query) {
        Intent::McqRequest
    } else {
        Intent::PlainQuestion
    }
}

/// Reply for a query already classified as a greeting.
pub fn greeting_response(query: &str) -> &'static str {
    let query = normalize(query);
    if FAREWELL_RE.is_match(&query) {
        "Goodbye! Let me know if you have any questions later!"
    } else if query.contains("good morning") {
        "Good morning! How can I help you today?"
    } else if query.contains("good afternoon") {
        "Good afternoon! What would you like to know?"
    } else if query.contains("good evening") {
        "Good evening! How can I assist you?"
    } else {
        "Hello! What would you like to know?"
    }
}
