//! Hybrid keyword + vector retrieval over a tenant's course material
//!
//! Candidates are built per request: collect sources, chunk them with the
//! tenant's strategy, score every chunk. Semantic scores come from the
//! persistent SQL index, an ephemeral vector store, or in-memory cosine
//! similarity, whichever is configured and answers first in that order.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::scoring::{best_snippet, combine, cosine_similarity, keyword_score, tokenize, ScoreWeights};
use crate::config::{ChunkingConfig, RetrievalConfig};
use crate::error::Result;
use crate::ingestion::chunking::{Chunker, ChunkingStrategy, Passage};
use crate::ingestion::SourceCollector;
use crate::providers::{content_hash, IndexScope, ProviderRegistry};
use crate::tenant::{TenantRetrievalConfig, VectorStoreKind};
use crate::types::{Chunk, DegradedReason, ScoredChunk, Source};

/// Where semantic scores came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticPath {
    /// Keyword strategy, no semantic scoring attempted
    Skipped,
    /// Precomputed SQL nearest-neighbour index
    VectorIndex,
    /// Ephemeral external-style vector store
    VectorStore,
    /// Cosine similarity computed in process
    InMemory,
    /// Every embedding attempt failed; semantic scores are empty
    Unavailable,
}

/// Candidate chunks of one request, before scoring
#[derive(Debug, Default)]
pub struct Candidates {
    pub chunks: Vec<Chunk>,
    pub degraded: Vec<DegradedReason>,
}

/// Ranked chunks plus what actually happened while scoring them
#[derive(Debug)]
pub struct RetrievalOutcome {
    pub chunks: Vec<ScoredChunk>,
    pub candidate_count: usize,
    /// Effective `top_k` after clamping
    pub top_k: usize,
    pub embedding_provider_used: Option<String>,
    /// Store that produced the semantic scores (`memory` for in-process)
    pub vector_store_used: String,
    pub semantic_path: SemanticPath,
    pub degraded: Vec<DegradedReason>,
}

/// Embeddings plus the provider that produced them
struct Embedded {
    provider: String,
    vectors: Vec<Vec<f32>>,
}

/// Scores and ranks candidate chunks
pub struct HybridRetriever {
    collector: Arc<SourceCollector>,
    registry: Arc<ProviderRegistry>,
    params: RetrievalConfig,
    chunking: ChunkingConfig,
}

impl HybridRetriever {
    pub fn new(
        collector: Arc<SourceCollector>,
        registry: Arc<ProviderRegistry>,
        params: RetrievalConfig,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            collector,
            registry,
            params,
            chunking,
        }
    }

    /// Clamp a requested `top_k` to the retriever's range
    pub fn clamp_top_k(&self, top_k: usize) -> usize {
        top_k.clamp(1, self.params.max_top_k.max(1))
    }

    /// Collect and chunk a tenant's sources
    pub async fn candidates(
        &self,
        tenant_id: i64,
        course_id: Option<i64>,
        strategy: ChunkingStrategy,
    ) -> Result<Candidates> {
        let collected = self.collector.collect(tenant_id, course_id).await?;
        let chunker = strategy.build(&self.chunking);
        Ok(Candidates {
            chunks: self.build_chunks(&collected.sources, chunker.as_ref()),
            degraded: collected.degraded,
        })
    }

    /// Chunk sources in order, up to the chunk budget
    ///
    /// A source whose chunker fails or yields nothing contributes its opening
    /// characters as one passage. Passages without a snippet are skipped but
    /// keep their ordinal, so chunk ids stay stable.
    pub fn build_chunks(&self, sources: &[Source], chunker: &dyn Chunker) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        'sources: for source in sources {
            let passages = match chunker.chunk(&source.raw_text) {
                Ok(passages) if !passages.is_empty() => passages,
                Ok(_) | Err(_) => {
                    tracing::debug!(
                        "{} chunker produced nothing for {}, using leading text",
                        chunker.name(),
                        source.id
                    );
                    let head: String = source
                        .raw_text
                        .chars()
                        .take(self.params.fallback_chars)
                        .collect();
                    vec![Passage::plain(head)]
                }
            };

            for (ordinal, passage) in passages.into_iter().enumerate() {
                if chunks.len() >= self.params.max_chunks {
                    break 'sources;
                }
                let snippet = best_snippet(&passage.text, &[], self.params.snippet_chars);
                if snippet.is_empty() {
                    continue;
                }
                chunks.push(Chunk {
                    id: Chunk::make_id(&source.id, ordinal),
                    source_id: source.id.clone(),
                    source_name: source.name.clone(),
                    course_id: source.course_id,
                    text: passage.text,
                    ordinal,
                    snippet,
                    relation: passage.relation,
                });
            }
        }

        chunks
    }

    /// Rank the tenant's chunks for `query`
    ///
    /// Fails only when sources cannot be listed; every provider failure
    /// degrades instead.
    pub async fn retrieve(
        &self,
        tenant_id: i64,
        course_id: Option<i64>,
        query: &str,
        top_k: usize,
        config: &TenantRetrievalConfig,
    ) -> Result<RetrievalOutcome> {
        let top_k = self.clamp_top_k(top_k);
        let tokens = tokenize(query, self.params.max_query_tokens);
        let Candidates { chunks, mut degraded } = self
            .candidates(tenant_id, course_id, config.chunking_strategy)
            .await?;

        let mut outcome = RetrievalOutcome {
            chunks: Vec::new(),
            candidate_count: chunks.len(),
            top_k,
            embedding_provider_used: None,
            vector_store_used: config.vector_store.as_str().to_string(),
            semantic_path: SemanticPath::Skipped,
            degraded: Vec::new(),
        };
        outcome.degraded.append(&mut degraded);

        if chunks.is_empty() {
            tracing::debug!("No candidate chunks for tenant {} course {:?}", tenant_id, course_id);
            return Ok(outcome);
        }

        let semantic = if config.retrieval_strategy.uses_semantic() {
            let scope = IndexScope {
                tenant_id,
                course_id,
            };
            self.semantic_scores(scope, query, &chunks, top_k, config, &mut outcome)
                .await
        } else {
            HashMap::new()
        };

        // a failed index query can repeat the embedding failures of the fallback path
        let mut seen = HashSet::new();
        outcome.degraded.retain(|r| seen.insert(r.clone()));

        let weights = ScoreWeights {
            semantic: self.params.semantic_weight,
            keyword: self.params.keyword_weight,
        };
        outcome.chunks = self.rank(chunks, &tokens, &semantic, top_k, config, weights);

        tracing::debug!(
            "Ranked {} of {} chunks (strategy {}, path {:?})",
            outcome.chunks.len(),
            outcome.candidate_count,
            config.retrieval_strategy.as_str(),
            outcome.semantic_path
        );
        Ok(outcome)
    }

    fn rank(
        &self,
        chunks: Vec<Chunk>,
        tokens: &[String],
        semantic: &HashMap<String, f32>,
        top_k: usize,
        config: &TenantRetrievalConfig,
        weights: ScoreWeights,
    ) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = chunks
            .into_iter()
            .filter_map(|chunk| {
                let keyword = keyword_score(&chunk.text, tokens, self.params.keyword_cap);
                let semantic = semantic
                    .get(&chunk.id)
                    .copied()
                    .unwrap_or(0.0)
                    .clamp(0.0, 1.0);
                let combined = combine(config.retrieval_strategy, keyword, semantic, weights);
                (combined > 0.0).then_some(ScoredChunk {
                    chunk,
                    keyword_score: keyword,
                    semantic_score: semantic,
                    combined_score: combined,
                })
            })
            .collect();

        // stable: ties keep chunk order
        scored.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k * 2);

        let mut seen = HashSet::new();
        scored.retain(|s| seen.insert((s.chunk.source_id.clone(), s.chunk.snippet.clone())));
        scored.truncate(top_k);
        scored
    }

    async fn semantic_scores(
        &self,
        scope: IndexScope,
        query: &str,
        chunks: &[Chunk],
        top_k: usize,
        config: &TenantRetrievalConfig,
        outcome: &mut RetrievalOutcome,
    ) -> HashMap<String, f32> {
        match config.vector_store {
            VectorStoreKind::Postgres => {
                if let Some(index) = self.registry.vector_index(VectorStoreKind::Postgres.as_str()) {
                    let Some(embedded) = self
                        .embed_with_fallback(&config.embedding_provider, &[query.to_string()], outcome)
                        .await
                    else {
                        outcome.semantic_path = SemanticPath::Unavailable;
                        return HashMap::new();
                    };

                    // stored rows only count while their text matches the current chunk
                    let fingerprints: HashMap<&str, String> = chunks
                        .iter()
                        .map(|c| (c.id.as_str(), content_hash(&c.text)))
                        .collect();
                    let k = (top_k * 2).max(8);
                    match index.nearest(scope, &embedded.vectors[0], k).await {
                        Ok(hits) => {
                            let total = hits.len();
                            let hits: HashMap<String, f32> = hits
                                .into_iter()
                                .filter(|(id, hit)| {
                                    fingerprints.get(id.as_str()) == Some(&hit.content_hash)
                                })
                                .map(|(id, hit)| (id, hit.similarity.clamp(0.0, 1.0)))
                                .collect();
                            if hits.len() < total {
                                tracing::debug!(
                                    "Ignored {} index rows not matching current chunks for tenant {}",
                                    total - hits.len(),
                                    scope.tenant_id
                                );
                            }
                            if !hits.is_empty() {
                                outcome.semantic_path = SemanticPath::VectorIndex;
                                outcome.vector_store_used = index.name().to_string();
                                return hits;
                            }
                            tracing::debug!(
                                "Vector index has no matching chunks for tenant {}, scoring in memory",
                                scope.tenant_id
                            );
                        }
                        Err(e) => {
                            tracing::warn!("Vector index query failed: {}", e);
                            outcome
                                .degraded
                                .push(DegradedReason::VectorIndexUnavailable(e.to_string()));
                        }
                    }
                }
                self.in_memory_scores(query, chunks, config, outcome).await
            }
            VectorStoreKind::Memory => self.in_memory_scores(query, chunks, config, outcome).await,
            kind => {
                let Some(store) = self.registry.vector_store(kind.as_str()) else {
                    outcome.degraded.push(DegradedReason::VectorStoreUnavailable(format!(
                        "{} is not registered",
                        kind.as_str()
                    )));
                    return self.in_memory_scores(query, chunks, config, outcome).await;
                };

                let Some(embedded) = self.embed_query_and_chunks(query, chunks, config, outcome).await
                else {
                    outcome.semantic_path = SemanticPath::Unavailable;
                    return HashMap::new();
                };

                let entries: Vec<(String, Vec<f32>)> = chunks
                    .iter()
                    .map(|c| c.id.clone())
                    .zip(embedded.vectors[1..].iter().cloned())
                    .collect();
                let n = entries.len().min(self.params.ephemeral_neighbours);
                match store.rank(&entries, &embedded.vectors[0], n).await {
                    Ok(hits) if !hits.is_empty() => {
                        outcome.semantic_path = SemanticPath::VectorStore;
                        outcome.vector_store_used = kind.as_str().to_string();
                        return hits
                            .into_iter()
                            .map(|(id, sim)| (id, sim.clamp(0.0, 1.0)))
                            .collect();
                    }
                    Ok(_) => outcome.degraded.push(DegradedReason::VectorStoreUnavailable(format!(
                        "{} returned no neighbours",
                        kind.as_str()
                    ))),
                    Err(e) => {
                        tracing::warn!("Vector store {} failed: {}", kind.as_str(), e);
                        outcome
                            .degraded
                            .push(DegradedReason::VectorStoreUnavailable(e.to_string()));
                    }
                }
                Self::cosine_scores(chunks, &embedded, outcome)
            }
        }
    }

    async fn in_memory_scores(
        &self,
        query: &str,
        chunks: &[Chunk],
        config: &TenantRetrievalConfig,
        outcome: &mut RetrievalOutcome,
    ) -> HashMap<String, f32> {
        match self.embed_query_and_chunks(query, chunks, config, outcome).await {
            Some(embedded) => Self::cosine_scores(chunks, &embedded, outcome),
            None => {
                outcome.semantic_path = SemanticPath::Unavailable;
                HashMap::new()
            }
        }
    }

    fn cosine_scores(
        chunks: &[Chunk],
        embedded: &Embedded,
        outcome: &mut RetrievalOutcome,
    ) -> HashMap<String, f32> {
        outcome.semantic_path = SemanticPath::InMemory;
        outcome.vector_store_used = VectorStoreKind::Memory.as_str().to_string();
        let query = &embedded.vectors[0];
        chunks
            .iter()
            .zip(embedded.vectors[1..].iter())
            .map(|(chunk, vector)| (chunk.id.clone(), cosine_similarity(query, vector)))
            .collect()
    }

    /// One batched call: the query first, then every chunk text
    async fn embed_query_and_chunks(
        &self,
        query: &str,
        chunks: &[Chunk],
        config: &TenantRetrievalConfig,
        outcome: &mut RetrievalOutcome,
    ) -> Option<Embedded> {
        let mut texts = Vec::with_capacity(chunks.len() + 1);
        texts.push(query.to_string());
        texts.extend(chunks.iter().map(|c| c.text.clone()));
        self.embed_with_fallback(&config.embedding_provider, &texts, outcome)
            .await
    }

    async fn embed_with_fallback(
        &self,
        provider: &str,
        texts: &[String],
        outcome: &mut RetrievalOutcome,
    ) -> Option<Embedded> {
        let (embedded, reasons) = embed_texts(&self.registry, provider, texts).await;
        for reason in &reasons {
            tracing::warn!("{}", reason);
        }
        outcome.degraded.extend(reasons);
        if let Some(embedded) = &embedded {
            outcome.embedding_provider_used = Some(embedded.provider.clone());
        }
        embedded
    }

    /// Embed arbitrary texts for indexing, with the same one-shot fallback
    pub async fn embed_for_index(
        &self,
        provider: &str,
        texts: &[String],
    ) -> (Option<(String, Vec<Vec<f32>>)>, Vec<DegradedReason>) {
        let (embedded, reasons) = embed_texts(&self.registry, provider, texts).await;
        (embedded.map(|e| (e.provider, e.vectors)), reasons)
    }
}

/// Embed with the named provider, falling back once to the default provider
///
/// Returns the embeddings, if any attempt succeeded, and every degradation
/// observed along the way.
async fn embed_texts(
    registry: &ProviderRegistry,
    provider: &str,
    texts: &[String],
) -> (Option<Embedded>, Vec<DegradedReason>) {
    let mut reasons = Vec::new();
    let provider = provider.trim().to_lowercase();

    match try_embed(registry, &provider, texts).await {
        Ok(vectors) => return (Some(Embedded { provider, vectors }), reasons),
        Err(e) => reasons.push(DegradedReason::EmbeddingProviderUnavailable(e)),
    }

    let fallback = registry.default_embedder_name().to_string();
    if fallback == provider {
        reasons.push(DegradedReason::EmbeddingFallbackFailed(format!(
            "{} is the default provider",
            fallback
        )));
        return (None, reasons);
    }

    match try_embed(registry, &fallback, texts).await {
        Ok(vectors) => {
            tracing::info!("Embedding fell back from {} to {}", provider, fallback);
            (
                Some(Embedded {
                    provider: fallback,
                    vectors,
                }),
                reasons,
            )
        }
        Err(e) => {
            reasons.push(DegradedReason::EmbeddingFallbackFailed(e));
            (None, reasons)
        }
    }
}

async fn try_embed(
    registry: &ProviderRegistry,
    provider: &str,
    texts: &[String],
) -> std::result::Result<Vec<Vec<f32>>, String> {
    let embedder = registry
        .embedder(provider)
        .ok_or_else(|| format!("{} is not registered", provider))?;
    let vectors = embedder
        .embed_batch(texts)
        .await
        .map_err(|e| format!("{}: {}", provider, e))?;
    if vectors.len() != texts.len() {
        return Err(format!(
            "{} returned {} vectors for {} texts",
            provider,
            vectors.len(),
            texts.len()
        ));
    }
    Ok(vectors)
}
