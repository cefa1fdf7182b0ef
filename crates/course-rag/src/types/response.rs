//! Answer types returned by the engine and the HTTP adapter

use serde::{Deserialize, Serialize};

/// A source that grounded an answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    /// Display name of the source (filename or video title)
    pub source: String,
    /// `document:<id>` or `video:<id>`
    pub source_id: String,
    pub snippet: String,
    /// Combined retrieval score in [0, 1]
    pub score: f32,
}

/// What the engine actually used to produce an answer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyMetadata {
    pub provider_used: String,
    pub model_used: String,
    pub retrieval_strategy_used: String,
    pub vector_store_used: String,
    pub chunking_strategy_used: String,
    pub embedding_provider_used: String,
    pub top_k_used: usize,
    /// The answer came from the local summarizer instead of the configured LLM
    pub llm_fallback: bool,
    /// Degradations observed while answering
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Set when retrieval could not run at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_error: Option<String>,
}

/// Engine result for one question
///
/// `grounded == false` always comes with empty `sources` and a refusal text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub response_text: String,
    pub grounded: bool,
    pub sources: Vec<SourceRef>,
    pub strategy_metadata: StrategyMetadata,
}

impl AnswerResult {
    /// A grounded answer
    pub fn grounded(
        response_text: String,
        sources: Vec<SourceRef>,
        strategy_metadata: StrategyMetadata,
    ) -> Self {
        Self {
            response_text,
            grounded: true,
            sources,
            strategy_metadata,
        }
    }

    /// An ungrounded answer; sources are always empty
    pub fn refusal(response_text: String, strategy_metadata: StrategyMetadata) -> Self {
        Self {
            response_text,
            grounded: false,
            sources: Vec::new(),
            strategy_metadata,
        }
    }
}

/// Caller-facing answer contract
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub response: String,
    pub sources: Vec<SourceRef>,
    pub grounded: bool,
    pub provider_used: String,
    pub model_used: String,
    pub retrieval_strategy_used: String,
    pub vector_store_used: String,
    pub chunking_strategy_used: String,
    pub top_k_used: usize,
    pub llm_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub cached: bool,
}

impl AskResponse {
    /// Flatten an engine result into the wire contract
    pub fn from_result(result: AnswerResult, cached: bool) -> Self {
        let meta = result.strategy_metadata;
        let warning = if meta.warnings.is_empty() {
            None
        } else {
            Some(meta.warnings.join("; "))
        };

        Self {
            response: result.response_text,
            sources: result.sources,
            grounded: result.grounded,
            provider_used: meta.provider_used,
            model_used: meta.model_used,
            retrieval_strategy_used: meta.retrieval_strategy_used,
            vector_store_used: meta.vector_store_used,
            chunking_strategy_used: meta.chunking_strategy_used,
            top_k_used: meta.top_k_used,
            llm_fallback: meta.llm_fallback,
            warning,
            cached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusal_has_no_sources() {
        let result = AnswerResult::refusal("no".to_string(), StrategyMetadata::default());
        assert!(!result.grounded);
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_ask_response_joins_warnings() {
        let meta = StrategyMetadata {
            warnings: vec!["a".to_string(), "b".to_string()],
            top_k_used: 4,
            ..Default::default()
        };
        let response = AskResponse::from_result(
            AnswerResult::grounded("x".to_string(), Vec::new(), meta),
            true,
        );
        assert_eq!(response.warning.as_deref(), Some("a; b"));
        assert_eq!(response.top_k_used, 4);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["topKUsed"], 4);
        assert_eq!(json["cached"], true);
    }
}
