use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::collaborators::{Generator, Retriever};
use super::error::TutorError;
use super::intent::{self, Intent};
use super::mcq::{self, McqQuestion};
use super::params::{self, McqParameters};
use super::prompt::{self, PromptInput};
use crate::core::config::TutorSettings;

/// Result of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub intent: Intent,
    pub is_mcq: bool,
    pub header: Option<String>,
    pub questions: Vec<McqQuestion>,
}

impl Answer {
    fn plain(intent: Intent, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            intent,
            is_mcq: false,
            header: None,
            questions: Vec::new(),
        }
    }
}

/// One user submission and the reply it got, as kept in session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user: String,
    pub bot: String,
    pub is_mcq: bool,
    pub mcq_header: Option<String>,
    pub mcq_questions: Vec<McqQuestion>,
}

impl ChatTurn {
    pub fn new(user: impl Into<String>, answer: Answer) -> Self {
        Self {
            user: user.into(),
            bot: answer.text,
            is_mcq: answer.is_mcq,
            mcq_header: answer.header,
            mcq_questions: answer.questions,
        }
    }

    /// Rebuilds a turn from its stored text. MCQ structure is recovered by
    /// parsing the rendered reply again.
    pub fn from_stored(user: String, bot: String, is_mcq: bool) -> Self {
        let (mcq_header, mcq_questions) = if is_mcq {
            (Some(mcq::extract_header(&bot)), mcq::parse(&bot))
        } else {
            (None, Vec::new())
        };

        Self {
            user,
            bot,
            is_mcq,
            mcq_header,
            mcq_questions,
        }
    }
}

/// Classify → extract → retrieve → prompt → generate → parse.
///
/// Never fails: every collaborator or validation failure is turned into a
/// user-facing message.
#[derive(Clone)]
pub struct ChatOrchestrator {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    settings: TutorSettings,
}

impl ChatOrchestrator {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        settings: TutorSettings,
    ) -> Self {
        Self {
            retriever,
            generator,
            settings,
        }
    }

    pub async fn answer(&self, query: &str) -> Answer {
        let intent = intent::classify(query);
        tracing::debug!("Classified query as {}", intent.as_str());

        let outcome = match intent {
            Intent::Greeting => Ok(Answer::plain(intent, intent::greeting_response(query))),
            Intent::McqRequest => self.answer_mcq(query).await,
            Intent::PlainQuestion => self.answer_question(query).await,
        };

        outcome.unwrap_or_else(|err| {
            err.log();
            Answer::plain(err.reported_intent(intent), err.user_message())
        })
    }

    async fn answer_mcq(&self, query: &str) -> Result<Answer, TutorError> {
        let params: McqParameters = params::extract(query);
        if !params.has_usable_topic() {
            return Err(TutorError::InvalidTopic(params.topic));
        }
        let topic = params.topic.as_str();

        let passages = self
            .retriever
            .retrieve(topic, self.settings.retrieval_k)
            .await
            .map_err(|err| TutorError::retrieval(Some(topic), err))?;
        if passages.is_empty() {
            return Err(TutorError::NoContent {
                topic: topic.to_string(),
            });
        }

        let passages = self.cap_context(passages);
        let prompt = prompt::build(PromptInput::Mcq(&params), &passages);
        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|err| TutorError::generation(Some(topic), err))?;

        let questions = mcq::validate_shape(mcq::parse(&raw))?;
        tracing::info!(
            "Generated {} of {} requested MCQs about '{}'",
            questions.len(),
            params.question_count,
            topic
        );

        let header = mcq::header_for_topic(topic);
        Ok(Answer {
            text: mcq::render(&header, &questions),
            intent: Intent::McqRequest,
            is_mcq: true,
            header: Some(header),
            questions,
        })
    }

    async fn answer_question(&self, query: &str) -> Result<Answer, TutorError> {
        let passages = self
            .retriever
            .retrieve(query, self.settings.retrieval_k)
            .await
            .map_err(|err| TutorError::retrieval(None, err))?;
        if passages.iter().all(|passage| passage.trim().is_empty()) {
            return Err(TutorError::NotCovered);
        }

        let passages = self.cap_context(passages);
        let prompt = prompt::build(PromptInput::Question(query), &passages);
        let text = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|err| TutorError::generation(None, err))?;

        Ok(Answer::plain(Intent::PlainQuestion, text))
    }

    fn cap_context(&self, passages: Vec<String>) -> Vec<String> {
        match self.settings.max_context_chars {
            Some(limit) => cap_passages(passages, limit),
            None => passages,
        }
    }
}

/// Keeps passages in rank order until `limit` characters (counting the
/// joining newlines) are used; the passage crossing the limit is cut short.
fn cap_passages(passages: Vec<String>, limit: usize) -> Vec<String> {
    let mut kept = Vec::new();
    let mut used = 0usize;

    for passage in passages {
        let separator = usize::from(!kept.is_empty());
        let remaining = limit.saturating_sub(used + separator);
        if remaining == 0 {
            break;
        }

        let length = passage.chars().count();
        if length <= remaining {
            used += separator + length;
            kept.push(passage);
        } else {
            kept.push(passage.chars().take(remaining).collect());
            break;
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::core::errors::ApiError;
    use crate::tutor::error::{
        INVALID_TOPIC_MESSAGE, NOT_COVERED_MESSAGE, QUESTION_FAILURE_MESSAGE,
        SHAPE_FALLBACK_MESSAGE,
    };

    const TWO_MCQS: &str = "Sure, here you go:
1. What keeps planets in orbit?
a) Friction
b) Gravitation (Correct)
c) Magnetism
d) Buoyancy
2. Escape velocity on Earth is about
a) 11.2 km/s (Correct)
b) 7.9 km/s
c) 3.0 km/s
d) 30 km/s";

    struct FakeRetriever {
        passages: Option<Vec<String>>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl FakeRetriever {
        fn returning(passages: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                passages: Some(passages.iter().map(|p| p.to_string()).collect()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                passages: None,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn retrieve(&self, topic: &str, k: usize) -> Result<Vec<String>, ApiError> {
            self.calls.lock().unwrap().push((topic.to_string(), k));
            self.passages
                .clone()
                .ok_or_else(|| ApiError::internal("index unavailable"))
        }
    }

    struct FakeGenerator {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .ok_or_else(|| ApiError::ServiceUnavailable("quota exceeded".into()))
        }
    }

    fn orchestrator(
        retriever: Arc<FakeRetriever>,
        generator: Arc<FakeGenerator>,
    ) -> ChatOrchestrator {
        ChatOrchestrator::new(retriever, generator, TutorSettings::default())
    }

    #[tokio::test]
    async fn greetings_never_reach_collaborators() {
        let retriever = FakeRetriever::failing();
        let generator = FakeGenerator::failing();
        let orchestrator = orchestrator(retriever.clone(), generator.clone());

        let hello = orchestrator.answer("hi").await;
        assert_eq!(hello.text, "Hello! What would you like to know?");
        assert_eq!(hello.intent, Intent::Greeting);
        assert!(!hello.is_mcq);

        let bye = orchestrator.answer("bye").await;
        assert_eq!(
            bye.text,
            "Goodbye! Let me know if you have any questions later!"
        );

        assert!(retriever.calls.lock().unwrap().is_empty());
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mcq_request_produces_structured_answer() {
        let retriever = FakeRetriever::returning(&["Gravitation holds planets in orbit."]);
        let generator = FakeGenerator::replying(TWO_MCQS);
        let orchestrator = orchestrator(retriever.clone(), generator.clone());

        let answer = orchestrator.answer("Generate 2 MCQs about Gravitation").await;

        assert!(answer.is_mcq);
        assert_eq!(answer.intent, Intent::McqRequest);
        assert_eq!(
            answer.header.as_deref(),
            Some("📚 NEET Practice Questions: Gravitation")
        );
        assert_eq!(answer.questions.len(), 2);
        assert!(answer.questions[0].options[1].is_correct);
        assert!(answer.text.starts_with("📚 NEET Practice Questions: Gravitation\n\n1. "));
        assert!(answer.text.contains("   b) Gravitation (Correct)"));

        assert_eq!(
            retriever.calls.lock().unwrap().as_slice(),
            &[("Gravitation".to_string(), 3)]
        );
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Generate 2 high-quality NEET MCQs about Gravitation"));
        assert!(prompts[0].contains("Gravitation holds planets in orbit."));
    }

    #[tokio::test]
    async fn mcq_request_without_topic_asks_for_one() {
        let retriever = FakeRetriever::returning(&["unused"]);
        let orchestrator = orchestrator(retriever.clone(), FakeGenerator::replying(TWO_MCQS));

        let answer = orchestrator.answer("generate 5 mcqs").await;

        assert_eq!(answer.text, INVALID_TOPIC_MESSAGE);
        assert!(!answer.is_mcq);
        assert!(retriever.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mcq_request_with_no_content_names_the_topic() {
        let orchestrator = orchestrator(
            FakeRetriever::returning(&[]),
            FakeGenerator::replying(TWO_MCQS),
        );

        let answer = orchestrator.answer("Generate 3 MCQs about Xyzzy123").await;

        assert_eq!(
            answer.text,
            "❌ No content found for 'Xyzzy123'. Try: Gravitation, Optics, Electrostatics"
        );
        assert!(!answer.is_mcq);
    }

    #[tokio::test]
    async fn malformed_mcqs_fall_back_to_rephrase_message() {
        let three_options = "1. Q\na) x (Correct)\nb) y\nc) z";
        let orchestrator = orchestrator(
            FakeRetriever::returning(&["content"]),
            FakeGenerator::replying(three_options),
        );

        let answer = orchestrator.answer("Generate 1 MCQ about Optics").await;

        assert_eq!(answer.text, SHAPE_FALLBACK_MESSAGE);
        assert!(!answer.is_mcq);
        assert!(answer.questions.is_empty());
        assert_eq!(answer.intent, Intent::PlainQuestion);
    }

    #[tokio::test]
    async fn mcq_collaborator_failures_become_apologies() {
        let failing_generation = orchestrator(
            FakeRetriever::returning(&["content"]),
            FakeGenerator::failing(),
        );
        assert_eq!(
            failing_generation
                .answer("Generate 3 MCQs about Optics")
                .await
                .text,
            "❌ Failed to generate questions about Optics. Please try again."
        );

        let failing_retrieval =
            orchestrator(FakeRetriever::failing(), FakeGenerator::replying(TWO_MCQS));
        let answer = failing_retrieval.answer("Generate 3 MCQs about Optics").await;
        assert_eq!(
            answer.text,
            "❌ Failed to generate questions about Optics. Please try again."
        );
        assert!(!answer.is_mcq);
    }

    #[tokio::test]
    async fn plain_question_is_answered_from_context() {
        let retriever = FakeRetriever::returning(&["Osmosis is diffusion of water."]);
        let generator = FakeGenerator::replying("Osmosis moves water across membranes.");
        let orchestrator = orchestrator(retriever.clone(), generator.clone());

        let answer = orchestrator.answer("Explain osmosis").await;

        assert_eq!(answer.text, "Osmosis moves water across membranes.");
        assert_eq!(answer.intent, Intent::PlainQuestion);
        assert!(!answer.is_mcq);
        assert_eq!(
            retriever.calls.lock().unwrap()[0].0,
            "Explain osmosis".to_string()
        );
        assert!(generator.prompts.lock().unwrap()[0]
            .contains("Question: Explain osmosis"));
    }

    #[tokio::test]
    async fn plain_question_outside_corpus_is_not_covered() {
        let generator = FakeGenerator::replying("unused");
        let empty = orchestrator(FakeRetriever::returning(&[]), generator.clone());
        assert_eq!(empty.answer("Explain osmosis").await.text, NOT_COVERED_MESSAGE);

        let blank = orchestrator(FakeRetriever::returning(&["  ", "\n"]), generator.clone());
        assert_eq!(blank.answer("Explain osmosis").await.text, NOT_COVERED_MESSAGE);

        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn plain_question_failures_become_apologies() {
        let orchestrator = orchestrator(FakeRetriever::failing(), FakeGenerator::failing());
        assert_eq!(
            orchestrator.answer("Explain osmosis").await.text,
            QUESTION_FAILURE_MESSAGE
        );
    }

    #[tokio::test]
    async fn retrieval_depth_and_context_cap_follow_settings() {
        let retriever = FakeRetriever::returning(&["abcdef", "ghijkl"]);
        let generator = FakeGenerator::replying("ok");
        let orchestrator = ChatOrchestrator::new(
            retriever.clone(),
            generator.clone(),
            TutorSettings {
                retrieval_k: 7,
                max_context_chars: Some(9),
            },
        );

        orchestrator.answer("Explain entropy").await;

        assert_eq!(retriever.calls.lock().unwrap()[0].1, 7);
        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Context: abcdef\ngh\n\nQuestion:"));
    }

    #[test]
    fn cap_passages_respects_char_boundaries() {
        let passages = vec!["αβγ".to_string(), "δεζ".to_string()];
        assert_eq!(cap_passages(passages.clone(), 100), passages);
        assert_eq!(cap_passages(passages.clone(), 5), vec!["αβγ", "δ"]);
        assert_eq!(cap_passages(passages.clone(), 4), vec!["αβγ"]);
        assert_eq!(cap_passages(passages, 2), vec!["αβ"]);
    }

    #[test]
    fn stored_mcq_turn_is_reparsed() {
        let questions = mcq::validate_shape(mcq::parse(TWO_MCQS)).unwrap();
        let header = mcq::header_for_topic("Gravitation");
        let rendered = mcq::render(&header, &questions);

        let turn = ChatTurn::from_stored("Generate 2 MCQs".into(), rendered, true);
        assert_eq!(turn.mcq_header, Some(header));
        assert_eq!(turn.mcq_questions, questions);

        let plain = ChatTurn::from_stored("hi".into(), "Hello!".into(), false);
        assert!(plain.mcq_header.is_none());
        assert!(plain.mcq_questions.is_empty());
    }
}
