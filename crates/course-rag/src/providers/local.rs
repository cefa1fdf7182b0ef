//! In-process provider implementations
//!
//! None of these need a network: a feature-hashing embedder, two local LLMs
//! and an in-memory ephemeral vector store.

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::generation::{summarize, PromptBuilder};
use crate::generation::summarizer::DEFAULT_SUMMARY_SENTENCES;
use crate::retrieval::scoring::cosine_similarity;

use super::embedding::EmbeddingProvider;
use super::llm::{GenerationParams, LlmProvider};
use super::vector_store::EphemeralVectorStore;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid regex"));

/// Weight of a character trigram relative to a whole token
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic feature-hashing embedder
///
/// Each lowercased word and each character trigram of the padded word is
/// hashed with SHA-256 into a signed bucket. Vectors are L2-normalized, so
/// texts sharing vocabulary land close under cosine similarity.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embed one text synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for word in WORD.find_iter(&lowered).map(|m| m.as_str()) {
            self.add_feature(&mut vector, word.as_bytes(), 1.0);

            let padded: Vec<char> = format!("#{}#", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, trigram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// LLM that answers with an extractive summary of the prompt's context
pub struct ExtractiveLlm;

#[async_trait]
impl LlmProvider for ExtractiveLlm {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        let answer = match PromptBuilder::parse(prompt) {
            Some(parsed) => summarize(&parsed.question, &parsed.passages, DEFAULT_SUMMARY_SENTENCES),
            None => summarize(prompt, &[prompt.to_string()], DEFAULT_SUMMARY_SENTENCES),
        };
        Ok(answer)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "local"
    }

    fn default_model(&self) -> &str {
        "extractive"
    }
}

/// Echo LLM for tests and demos
pub struct MockLlm;

/// Prompt characters echoed by [`MockLlm`]
const MOCK_ECHO_CHARS: usize = 220;

#[async_trait]
impl LlmProvider for MockLlm {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        let head: String = prompt.chars().take(MOCK_ECHO_CHARS).collect();
        Ok(format!("Grounded answer: {}", head))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock"
    }
}

/// Ephemeral vector store holding one uniquely named collection per query
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: DashMap<String, Vec<(String, Vec<f32>)>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collections currently alive
    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    fn query(&self, collection: &str, query: &[f32], n: usize) -> HashMap<String, f32> {
        let Some(entries) = self.collections.get(collection) else {
            return HashMap::new();
        };
        let mut scored: Vec<(&String, f32)> = entries
            .iter()
            .map(|(id, embedding)| (id, cosine_similarity(query, embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(n)
            .map(|(id, sim)| (id.clone(), sim))
            .collect()
    }
}

#[async_trait]
impl EphemeralVectorStore for InMemoryVectorStore {
    async fn rank(
        &self,
        entries: &[(String, Vec<f32>)],
        query: &[f32],
        n: usize,
    ) -> Result<HashMap<String, f32>> {
        let collection = format!("rag_{}", Uuid::new_v4().simple());
        self.collections.insert(collection.clone(), entries.to_vec());
        let hits = self.query(&collection, query, n);
        self.collections.remove(&collection);
        Ok(hits)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_embedder_is_normalized_and_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_text("Binary search trees");
        assert_eq!(a.len(), 384);
        assert_eq!(a, embedder.embed_text("binary SEARCH trees"));
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);

        assert!(embedder.embed_text("  ...  ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_hashing_embedder_similarity_tracks_vocabulary() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_text("what is a binary search tree");
        let related = embedder.embed_text("A binary search tree orders nodes by key");
        let unrelated = embedder.embed_text("photosynthesis converts sunlight into sugar");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let embedder = HashingEmbedder::new(64);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], embedder.embed_text("beta"));
    }

    #[tokio::test]
    async fn test_mock_llm_echoes_prompt_head() {
        let long = "x".repeat(500);
        let answer = MockLlm.generate(&long, &GenerationParams::default()).await.unwrap();
        assert_eq!(answer, format!("Grounded answer: {}", "x".repeat(220)));
    }

    #[tokio::test]
    async fn test_extractive_llm_uses_context() {
        let prompt = PromptBuilder::build_prompt(
            "What orders nodes?",
            "[1] Source: bst.txt\nA binary search tree orders nodes by key.",
            None,
        );
        let answer = ExtractiveLlm
            .generate(&prompt, &GenerationParams::default())
            .await
            .unwrap();
        assert!(answer.contains("A binary search tree orders nodes by key."));
    }

    #[tokio::test]
    async fn test_in_memory_store_discards_collection() {
        let store = InMemoryVectorStore::new();
        let entries = vec![
            ("a".to_string(), vec![1.0, 0.0]),
            ("b".to_string(), vec![0.0, 1.0]),
            ("c".to_string(), vec![0.6, 0.8]),
        ];
        let hits = store.rank(&entries, &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.contains_key("a") && hits.contains_key("c"));
        assert_eq!(store.collection_count(), 0);
    }
}
