//! MCQ text grammar: parsing, shape validation and rendering.
//!
//! The same line-based parser reads raw model output and re-reads rendered
//! MCQ text stored in chat history, so both paths agree on the grammar:
//!
//! ```text
//! 📚 NEET Practice Questions: Optics        <- header (any other line)
//! 1. Which lens corrects myopia?            <- question: `Q?<n>.`
//!    a) Concave (Correct)                   <- option: `[a-d]` + `)` or `.`
//!    b) Convex
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const OPTIONS_PER_QUESTION: usize = 4;
pub const FALLBACK_HEADER: &str = "NEET Practice Questions";
const CORRECT_MARKER: &str = "(Correct)";

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Q?\d+\.\s*").unwrap());
static OPTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([a-dA-D])[.)]\s*").unwrap());
static CORRECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\(correct\)\s*").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqOption {
    pub letter: char,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqQuestion {
    pub text: String,
    pub options: Vec<McqOption>,
}

impl McqQuestion {
    pub fn correct_count(&self) -> usize {
        self.options.iter().filter(|option| option.is_correct).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("no questions could be parsed")]
    Empty,
    #[error("question {index} has {found} options instead of 4")]
    WrongOptionCount { index: usize, found: usize },
    #[error("no question has exactly one correct option")]
    NoAnswerKey,
}

fn parse_option(line: &str) -> Option<McqOption> {
    let captures = OPTION_RE.captures(line)?;
    let letter = captures[1].chars().next()?.to_ascii_lowercase();
    let body = &line[captures[0].len()..];
    let is_correct = CORRECT_RE.is_match(body);
    let text = CORRECT_RE.replace_all(body, " ").trim().to_string();

    Some(McqOption {
        letter,
        text,
        is_correct,
    })
}

/// Parses MCQ text into questions, in order of appearance.
///
/// Questions without options are dropped, as are options that appear before
/// any question. Lines matching neither pattern are ignored.
pub fn parse(raw_text: &str) -> Vec<McqQuestion> {
    let mut questions = Vec::new();
    let mut current: Option<McqQuestion> = None;

    for line in raw_text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(prefix) = QUESTION_RE.find(line) {
            if let Some(done) = current.take().filter(|q| !q.options.is_empty()) {
                questions.push(done);
            }
            current = Some(McqQuestion {
                text: line[prefix.end()..].trim().to_string(),
                options: Vec::new(),
            });
        } else if let Some(option) = parse_option(line) {
            if let Some(question) = current.as_mut() {
                question.options.push(option);
            }
        }
    }

    if let Some(done) = current.filter(|q| !q.options.is_empty()) {
        questions.push(done);
    }

    questions
}

/// First non-blank line that is neither a question nor an option.
pub fn extract_header(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !QUESTION_RE.is_match(line) && !OPTION_RE.is_match(line))
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_HEADER.to_string())
}

/// Accepts a parsed set only if it is non-empty and every question has
/// exactly four options. Questions without exactly one correct option are
/// then discarded; the set fails if none survive.
pub fn validate_shape(questions: Vec<McqQuestion>) -> Result<Vec<McqQuestion>, ShapeError> {
    if questions.is_empty() {
        return Err(ShapeError::Empty);
    }

    if let Some((index, question)) = questions
        .iter()
        .enumerate()
        .find(|(_, q)| q.options.len() != OPTIONS_PER_QUESTION)
    {
        return Err(ShapeError::WrongOptionCount {
            index: index + 1,
            found: question.options.len(),
        });
    }

    let total = questions.len();
    let keyed: Vec<McqQuestion> = questions
        .into_iter()
        .filter(|q| q.correct_count() == 1)
        .collect();

    if keyed.len() < total {
        tracing::debug!(
            "Discarded {} question(s) without a single correct option",
            total - keyed.len()
        );
    }

    if keyed.is_empty() {
        return Err(ShapeError::NoAnswerKey);
    }

    Ok(keyed)
}

pub fn header_for_topic(topic: &str) -> String {
    format!("📚 {}: {}", FALLBACK_HEADER, topic)
}

/// Canonical text form; `parse` and `extract_header` read it back unchanged.
pub fn render(header: &str, questions: &[McqQuestion]) -> String {
    let mut output = vec![header.to_string()];
    for (index, question) in questions.iter().enumerate() {
        output.push(format!("\n{}. {}", index + 1, question.text));
        for option in &question.options {
            let marker = if option.is_correct {
                format!(" {}", CORRECT_MARKER)
            } else {
                String::new()
            };
            output.push(format!("   {}) {}{}", option.letter, option.text, marker));
        }
    }
    output.join("\n")
}
