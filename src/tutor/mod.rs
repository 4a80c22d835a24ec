//! Query handling core: intent classification, MCQ parameter extraction,
//! prompt building, MCQ parsing and the orchestrator tying them together.
//!
//! The core only knows its collaborators through [`Retriever`] and
//! [`Generator`].

pub mod collaborators;
pub mod error;
pub mod intent;
pub mod mcq;
pub mod orchestrator;
pub mod params;
pub mod prompt;

pub use collaborators::{Generator, Retriever};
pub use error::TutorError;
pub use intent::Intent;
pub use mcq::{McqOption, McqQuestion, ShapeError};
pub use orchestrator::{Answer, ChatOrchestrator, ChatTurn};
pub use params::McqParameters;
