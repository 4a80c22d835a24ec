//! Prompt assembly for the generator.

use super::params::McqParameters;

/// What the prompt is being built for.
#[derive(Debug, Clone, Copy)]
pub enum PromptInput<'a> {
    Mcq(&'a McqParameters),
    Question(&'a str),
}

/// Passages in rank order, one per line. No dedup, no cap.
pub fn join_context(passages: &[String]) -> String {
    passages.join("\n")
}

pub fn build(input: PromptInput<'_>, passages: &[String]) -> String {
    let context = join_context(passages);
    match input {
        PromptInput::Mcq(params) => build_mcq_prompt(params, &context),
        PromptInput::Question(query) => build_answer_prompt(query, &context),
    }
}

pub fn build_mcq_prompt(params: &McqParameters, context: &str) -> String {
    let count = params.question_count;
    let topic = &params.topic;

    format!(
        r#"**NEET MCQ Generation Task**

Generate {count} high-quality NEET MCQs about {topic} using this content:
{context}

**Formatting Rules:**
1. Use exactly this structure for each question:
   [QNUMBER]. [QUESTION TEXT]
   a) [OPTION 1]
   b) [OPTION 2]
   c) [OPTION 3] (Correct)
   d) [OPTION 4]

2. Requirements:
   - Only one correct answer per question
   - Use simple, clear language
   - Focus on key {topic} concepts
   - Mark correct answer with "(Correct)"
   - Number questions sequentially (1. 2. 3.)

**Example for {topic}:**
1. What is the gravitational constant value?
a) 6.67 × 10⁻¹¹ N·m²/kg² (Correct)
b) 9.81 m/s²
c) 3.00 × 10⁸ m/s
d) 1.60 × 10⁻¹⁹ C

**Now generate {count} questions:**"#
    )
}

pub fn build_answer_prompt(query: &str, context: &str) -> String {
    format!(
        "NEET Question Answering:\n\n\
         Context: {context}\n\n\
         Question: {query}\n\n\
         Answer concisely with:\n\
         - Key points\n\
         - Important formulas (use LaTeX)\n\
         - Relevant diagrams (describe verbally)\n\
         - NEET exam relevance"
    )
}
