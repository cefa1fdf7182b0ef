//! Prompt construction and the local answer synthesizer

pub mod prompt;
pub mod summarizer;

pub use prompt::{ParsedPrompt, PromptBuilder};
pub use summarizer::summarize;
