//! LLM provider trait for generating answers

use async_trait::async_trait;

use crate::error::Result;

/// Per-request generation parameters taken from the tenant configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Model name; `None` lets the provider pick its default
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.2,
            max_tokens: 700,
        }
    }
}

/// Trait for LLM-based answer generation
///
/// Implementations:
/// - `OllamaLlm`: local Ollama server
/// - `ExtractiveLlm`: deterministic summarizer over the prompt's context
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a fully built prompt
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Model used when the request names none
    fn default_model(&self) -> &str;
}
