//! NEET exam-prep tutor: a retrieval-augmented chat service that answers
//! questions from a PDF corpus and generates practice MCQs.

pub mod core;
pub mod history;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod tutor;
