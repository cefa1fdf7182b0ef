//! Answer orchestration
//!
//! One request runs `resolve config -> check cache -> retrieve -> ground
//! check -> {refuse | prompt LLM} -> cache and return`. Only input validation
//! fails a request; every dependency failure degrades the answer instead.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{cache_key, AnswerCache, SqliteSharedCache};
use crate::config::{RagConfig, RetrievalConfig};
use crate::error::{Error, Result};
use crate::generation::summarizer::DEFAULT_SUMMARY_SENTENCES;
use crate::generation::{summarize, PromptBuilder};
use crate::ingestion::{DocumentTextExtractor, SourceCollector};
use crate::providers::{
    GenerationParams, IndexEntry, IndexScope, NoTranscription, ProviderRegistry,
    StoredTenantSettings, TenantStore,
};
use crate::retrieval::{HybridRetriever, RetrievalOutcome};
use crate::storage::SqliteStore;
use crate::tenant::{TenantConfigResolver, TenantRetrievalConfig};
use crate::types::{
    AnswerResult, AskRequest, DegradedReason, ScoredChunk, SourceRef, StrategyMetadata,
};

/// Provider reported when the local summarizer answered
const FALLBACK_PROVIDER: &str = "local";
const FALLBACK_MODEL: &str = "extractive";

/// Name of the persistent index filled by [`RagEngine::reindex`]
const PRECOMPUTED_INDEX: &str = "postgres";

/// One answered request
#[derive(Debug, Clone)]
pub struct Answer {
    pub result: AnswerResult,
    /// Served from the answer cache
    pub cached: bool,
    /// Everything that degraded while answering, including hidden reasons
    pub degraded: Vec<DegradedReason>,
}

/// Outcome of an index precompute run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexReport {
    pub tenant_id: i64,
    pub course_id: Option<i64>,
    pub chunks_indexed: usize,
    pub embedding_provider_used: Option<String>,
    pub warnings: Vec<String>,
}

/// Dependency health reported by `/ready`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub storage: bool,
    pub default_llm: bool,
}

impl Readiness {
    /// Storage is the only hard dependency
    pub fn is_ready(&self) -> bool {
        self.storage
    }
}

/// The retrieval and grounding engine
pub struct RagEngine {
    resolver: Arc<TenantConfigResolver>,
    retriever: Arc<HybridRetriever>,
    registry: Arc<ProviderRegistry>,
    cache: Arc<AnswerCache>,
    store: Arc<dyn TenantStore>,
    params: RetrievalConfig,
    llm_timeout: Duration,
}

impl RagEngine {
    /// Wire the engine from its collaborators
    pub fn new(
        config: &RagConfig,
        store: Arc<dyn TenantStore>,
        registry: Arc<ProviderRegistry>,
        cache: AnswerCache,
    ) -> Self {
        let extractor = Arc::new(DocumentTextExtractor::new(config.cache.extraction_memo_entries));
        let collector = Arc::new(SourceCollector::new(
            Arc::clone(&store),
            extractor,
            Arc::new(NoTranscription),
            config.retrieval.max_documents,
            config.retrieval.max_videos,
        ));
        let retriever = HybridRetriever::new(
            collector,
            Arc::clone(&registry),
            config.retrieval.clone(),
            config.chunking.clone(),
        );
        let resolver = TenantConfigResolver::new(
            Arc::clone(&store),
            config.defaults.clone(),
            Duration::from_secs(config.cache.tenant_config_ttl_secs),
        );

        Self {
            resolver: Arc::new(resolver),
            retriever: Arc::new(retriever),
            registry,
            cache: Arc::new(cache),
            store,
            params: config.retrieval.clone(),
            llm_timeout: Duration::from_secs(config.llm.timeout_secs.max(1)),
        }
    }

    /// Build the engine and every bundled provider over a SQLite store
    pub fn from_config(config: &RagConfig, store: SqliteStore) -> Result<Self> {
        let registry = Arc::new(ProviderRegistry::from_config(config, Some(store.clone()))?);
        tracing::info!("Provider registry initialized: {:?}", registry.summary());

        let mut cache = AnswerCache::new(
            Duration::from_secs(config.cache.answer_ttl_secs),
            config.cache.answer_max_entries,
        );
        if let Some(path) = &config.cache.shared_cache_path {
            match SqliteSharedCache::new(path) {
                Ok(shared) => {
                    tracing::info!("Shared answer cache at {}", path.display());
                    cache = cache.with_shared(Arc::new(shared));
                }
                Err(e) => tracing::warn!("Shared answer cache disabled: {}", e),
            }
        }

        Ok(Self::new(config, Arc::new(store), registry, cache))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    pub fn resolver(&self) -> &TenantConfigResolver {
        &self.resolver
    }

    pub fn retrieval_params(&self) -> &RetrievalConfig {
        &self.params
    }

    /// Caller `top_k` clamped to the accepted range
    pub fn top_k_used(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.params.default_top_k)
            .clamp(1, self.params.max_request_top_k.max(1))
    }

    /// Answer a question from the tenant's course materials
    ///
    /// Errors only on invalid input.
    pub async fn answer(&self, request: &AskRequest) -> Result<Answer> {
        request.validate()?;
        let question = request.question.trim();
        let tenant_id = request.tenant_id;
        let course_id = request.course_id;
        let top_k_used = self.top_k_used(request.top_k);

        let config = self.resolver.get(tenant_id).await;
        let key = cache_key(
            tenant_id,
            course_id,
            question,
            &config,
            top_k_used,
            self.params.min_grounding_score,
        );

        let mut degraded = Vec::new();
        let lookup = self.cache.get(&key, tenant_id).await;
        degraded.extend(lookup.degraded);
        if let Some(result) = lookup.hit {
            tracing::debug!("Answer cache hit for tenant {}", tenant_id);
            return Ok(Answer {
                result,
                cached: true,
                degraded,
            });
        }

        let mut meta = base_metadata(&config, top_k_used);

        let outcome = match self
            .retriever
            .retrieve(tenant_id, course_id, question, top_k_used, &config)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Retrieval failed for tenant {}: {}", tenant_id, e);
                let result = retrieval_failed(&config, meta, &e);
                return Ok(Answer {
                    result,
                    cached: false,
                    degraded,
                });
            }
        };

        let RetrievalOutcome {
            chunks,
            candidate_count,
            embedding_provider_used,
            vector_store_used,
            degraded: retrieval_degraded,
            ..
        } = outcome;
        degraded.extend(retrieval_degraded);
        meta.vector_store_used = vector_store_used;
        if let Some(provider) = embedding_provider_used {
            meta.embedding_provider_used = provider;
        }

        let grounded: Vec<ScoredChunk> = chunks
            .into_iter()
            .filter(|c| c.combined_score >= self.params.min_grounding_score)
            .collect();

        let result = if grounded.is_empty() {
            tracing::info!(
                "No grounded context for tenant {} ({} candidates), refusing",
                tenant_id,
                candidate_count
            );
            meta.warnings = visible_warnings(&degraded);
            AnswerResult::refusal(refusal_message(course_id), meta)
        } else {
            let context = PromptBuilder::build_context(&grounded);
            let prompt = PromptBuilder::build_prompt(question, &context, course_id);
            let params = GenerationParams {
                model: config.llm_model.clone(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            };

            let text = match self.generate(&config.llm_provider, &prompt, &params).await {
                Ok((text, model)) => {
                    meta.model_used = model;
                    text
                }
                Err(reason) => {
                    tracing::warn!("Falling back to local summarizer: {}", reason);
                    degraded.push(reason);
                    meta.llm_fallback = true;
                    meta.provider_used = FALLBACK_PROVIDER.to_string();
                    meta.model_used = FALLBACK_MODEL.to_string();
                    local_answer(question, &grounded)
                }
            };

            meta.warnings = visible_warnings(&degraded);
            let sources = grounded
                .iter()
                .map(|c| SourceRef {
                    source: c.chunk.source_name.clone(),
                    source_id: c.chunk.source_id.clone(),
                    snippet: c.chunk.snippet.clone(),
                    score: c.combined_score,
                })
                .collect();
            AnswerResult::grounded(text, sources, meta)
        };

        tracing::info!(
            "Answered tenant {} course {:?}: grounded={} sources={} fallback={}",
            tenant_id,
            course_id,
            result.grounded,
            result.sources.len(),
            result.strategy_metadata.llm_fallback
        );

        if is_cacheable(&result, &degraded) {
            if let Some(reason) = self.cache.set(&key, tenant_id, &result).await {
                degraded.push(reason);
            }
        }

        Ok(Answer {
            result,
            cached: false,
            degraded,
        })
    }

    /// Call the tenant's LLM under the engine timeout
    ///
    /// Returns the answer and the model that produced it.
    async fn generate(
        &self,
        provider: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<(String, String), DegradedReason> {
        let llm = self.registry.llm(provider).ok_or_else(|| {
            DegradedReason::LlmUnavailable(format!("{} is not registered", provider))
        })?;
        let model = params
            .model
            .clone()
            .unwrap_or_else(|| llm.default_model().to_string());

        match tokio::time::timeout(self.llm_timeout, llm.generate(prompt, params)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok((text.trim().to_string(), model)),
            Ok(Ok(_)) => Err(DegradedReason::LlmUnavailable(format!(
                "{} returned an empty answer",
                provider
            ))),
            Ok(Err(e)) => Err(DegradedReason::LlmUnavailable(format!("{}: {}", provider, e))),
            Err(_) => Err(DegradedReason::LlmUnavailable(format!(
                "{} timed out after {}s",
                provider,
                self.llm_timeout.as_secs()
            ))),
        }
    }

    /// Embed a tenant's chunks into the persistent vector index
    pub async fn reindex(&self, tenant_id: i64, course_id: Option<i64>) -> Result<ReindexReport> {
        let index = self
            .registry
            .vector_index(PRECOMPUTED_INDEX)
            .ok_or_else(|| Error::vector_index("no persistent vector index is registered"))?;
        let config = self.resolver.get(tenant_id).await;
        let candidates = self
            .retriever
            .candidates(tenant_id, course_id, config.chunking_strategy)
            .await?;

        let mut report = ReindexReport {
            tenant_id,
            course_id,
            chunks_indexed: 0,
            embedding_provider_used: None,
            warnings: visible_warnings(&candidates.degraded),
        };
        if candidates.chunks.is_empty() {
            return Ok(report);
        }

        let texts: Vec<String> = candidates.chunks.iter().map(|c| c.text.clone()).collect();
        let (embedded, reasons) = self
            .retriever
            .embed_for_index(&config.embedding_provider, &texts)
            .await;
        report.warnings.extend(reasons.iter().map(ToString::to_string));
        let Some((provider, vectors)) = embedded else {
            return Err(Error::embedding(
                reasons
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ));
        };

        let entries = candidates
            .chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| IndexEntry {
                chunk_id: chunk.id,
                source_id: chunk.source_id,
                course_id: chunk.course_id,
                content: chunk.text,
                embedding,
            })
            .collect();
        let scope = IndexScope {
            tenant_id,
            course_id,
        };
        report.chunks_indexed = index.upsert(scope, entries).await?;
        report.embedding_provider_used = Some(provider);

        let evicted = self.cache.invalidate_tenant(tenant_id).await;
        tracing::info!(
            "Indexed {} chunks for tenant {} course {:?} ({} cached answers evicted)",
            report.chunks_indexed,
            tenant_id,
            course_id,
            evicted
        );
        Ok(report)
    }

    /// Persist raw tenant settings and return the newly resolved configuration
    pub async fn update_settings(
        &self,
        tenant_id: i64,
        settings: StoredTenantSettings,
    ) -> Result<TenantRetrievalConfig> {
        self.store.save_settings(tenant_id, &settings).await?;
        self.invalidate_tenant(tenant_id).await;
        Ok(self.resolver.get(tenant_id).await)
    }

    /// Drop a tenant's cached configuration and answers
    pub async fn invalidate_tenant(&self, tenant_id: i64) -> bool {
        let had_config = self.resolver.invalidate(tenant_id);
        let evicted = self.cache.invalidate_tenant(tenant_id).await;
        tracing::info!(
            "Invalidated tenant {} (config cached: {}, answers evicted: {})",
            tenant_id,
            had_config,
            evicted
        );
        had_config
    }

    /// Check storage and the default LLM concurrently
    pub async fn readiness(&self) -> Readiness {
        let default_provider = self.resolver.default_config().llm_provider;
        let storage = self.store.health_check();
        let llm = async {
            match self.registry.llm(&default_provider) {
                Some(llm) => llm.health_check().await.unwrap_or(false),
                None => false,
            }
        };
        let (storage, default_llm) = futures::join!(storage, llm);
        Readiness {
            storage: storage.unwrap_or(false),
            default_llm,
        }
    }
}

fn base_metadata(config: &TenantRetrievalConfig, top_k_used: usize) -> StrategyMetadata {
    StrategyMetadata {
        provider_used: config.llm_provider.clone(),
        model_used: config.llm_model.clone().unwrap_or_default(),
        retrieval_strategy_used: config.retrieval_strategy.as_str().to_string(),
        vector_store_used: config.vector_store.as_str().to_string(),
        chunking_strategy_used: config.chunking_strategy.as_str().to_string(),
        embedding_provider_used: config.embedding_provider.clone(),
        top_k_used,
        ..Default::default()
    }
}

/// Answers built on a failed LLM or embedding provider are recomputed on
/// the next request instead of being served from the cache
fn is_cacheable(result: &AnswerResult, degraded: &[DegradedReason]) -> bool {
    !result.strategy_metadata.llm_fallback
        && !degraded.iter().any(|r| {
            matches!(
                r,
                DegradedReason::EmbeddingProviderUnavailable(_)
                    | DegradedReason::EmbeddingFallbackFailed(_)
            )
        })
}

fn visible_warnings(degraded: &[DegradedReason]) -> Vec<String> {
    degraded
        .iter()
        .filter(|r| r.is_user_visible())
        .map(ToString::to_string)
        .collect()
}

/// Refusal naming the scope that was searched
pub fn refusal_message(course_id: Option<i64>) -> String {
    let scope = match course_id {
        Some(id) => format!("the materials for course {}", id),
        None => "your course materials".to_string(),
    };
    format!(
        "I couldn't find anything about that in {}. Try rephrasing your question, or ask \
         about a topic covered in the uploaded documents and videos.",
        scope
    )
}

fn retrieval_failed(
    config: &TenantRetrievalConfig,
    mut meta: StrategyMetadata,
    cause: &Error,
) -> AnswerResult {
    let text = format!(
        "Retrieval failed: course materials could not be loaded ({} retrieval via {}). \
         Please try again shortly.",
        config.retrieval_strategy.as_str(),
        config.vector_store.as_str()
    );
    meta.retrieval_error = Some(cause.to_string());
    AnswerResult::refusal(text, meta)
}

/// Extractive answer over the grounded chunks
fn local_answer(question: &str, grounded: &[ScoredChunk]) -> String {
    let passages: Vec<String> = grounded.iter().map(|c| c.chunk.text.clone()).collect();
    let summary = summarize(question, &passages, DEFAULT_SUMMARY_SENTENCES);
    if summary.is_empty() {
        format!("Based on the course materials: {}", grounded[0].chunk.snippet)
    } else {
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        document_record, registry, store_with_document, test_config, CountingLlm, FailingEmbedder,
        FailingLlm, FailingStore, StalledLlm,
    };
    use std::sync::atomic::Ordering;

    const BST: &str = "A binary search tree orders nodes by key.";
    const BST_QUESTION: &str = "What is a binary search tree?";
    const HEAPS: &str = "A binary heap keeps the smallest key at the root.";
    const HEAP_QUESTION: &str = "What is a binary heap?";

    /// BST document without a course plus a heaps document in course 7
    fn store_with_course_document(dir: &std::path::Path) -> SqliteStore {
        let store = store_with_document(dir, "bst.txt", BST);
        let mut heaps = document_record(dir, 2, "heaps.txt", HEAPS);
        heaps.course_id = Some(7);
        store.insert_document(&heaps).unwrap();
        store
    }

    fn scope(course_id: Option<i64>) -> IndexScope {
        IndexScope {
            tenant_id: 1,
            course_id,
        }
    }

    fn engine(config: &RagConfig, store: &SqliteStore, registry: Arc<ProviderRegistry>) -> RagEngine {
        RagEngine::new(
            config,
            Arc::new(store.clone()),
            registry,
            AnswerCache::default(),
        )
    }

    fn engine_with_llm(
        config: &mut RagConfig,
        store: &SqliteStore,
        name: &str,
        llm: Arc<dyn crate::providers::LlmProvider>,
    ) -> RagEngine {
        config.defaults.llm_provider = name.to_string();
        let mut providers = ProviderRegistry::from_config(config, Some(store.clone())).unwrap();
        providers.register_llm(name, llm);
        engine(config, store, Arc::new(providers))
    }

    #[tokio::test]
    async fn test_answers_from_matching_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let engine = engine(&config, &store, registry(&config, &store));

        let answer = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        let result = answer.result;

        assert!(result.grounded);
        assert!(!answer.cached);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].source, "bst.txt");
        assert_eq!(result.sources[0].source_id, "document:1");
        assert!(result.response_text.contains("binary search tree"));

        let meta = &result.strategy_metadata;
        assert_eq!(meta.provider_used, "local");
        assert_eq!(meta.model_used, "extractive");
        assert_eq!(meta.retrieval_strategy_used, "hybrid");
        assert_eq!(meta.chunking_strategy_used, "semantic");
        assert_eq!(meta.top_k_used, 5);
        assert!(!meta.llm_fallback);
    }

    #[tokio::test]
    async fn test_refuses_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let engine = engine(&config, &store, registry(&config, &store));

        let answer = engine
            .answer(&AskRequest::new(1, "quantum chromodynamics"))
            .await
            .unwrap();
        assert!(!answer.result.grounded);
        assert!(answer.result.sources.is_empty());
        assert!(answer.result.response_text.contains("your course materials"));

        let scoped = engine
            .answer(&AskRequest::new(1, "quantum chromodynamics").with_course(7))
            .await
            .unwrap();
        assert!(scoped.result.response_text.contains("course 7"));
    }

    #[tokio::test]
    async fn test_second_identical_request_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let llm = Arc::new(CountingLlm::new("A BST keeps keys ordered."));
        let engine = engine_with_llm(&mut config, &store, "counting", llm.clone());

        let request = AskRequest::new(1, BST_QUESTION);
        let first = engine.answer(&request).await.unwrap();
        let second = engine
            .answer(&AskRequest::new(1, "  what is a BINARY search tree? "))
            .await
            .unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.result, second.result);
        assert_eq!(llm.calls(), 1);
        assert_eq!(first.result.strategy_metadata.model_used, "counting-1");
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_summarizer() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let llm = Arc::new(FailingLlm::default());
        let engine = engine_with_llm(&mut config, &store, "groq", llm.clone());

        let answer = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        let result = &answer.result;
        assert!(result.grounded);
        assert!(!result.sources.is_empty());
        assert!(result.response_text.starts_with("Based on the course materials:"));

        let meta = &result.strategy_metadata;
        assert!(meta.llm_fallback);
        assert_eq!(meta.provider_used, "local");
        assert!(meta.warnings.iter().any(|w| w.contains("401 unauthorized")));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);

        // fallback answers are not cached
        let again = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        assert!(!again.cached);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_llm_provider_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.defaults.llm_provider = "anthropic".to_string();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let engine = engine(&config, &store, registry(&config, &store));

        let answer = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        assert!(answer.result.grounded);
        assert!(answer.result.strategy_metadata.llm_fallback);
        assert!(answer
            .degraded
            .iter()
            .any(|r| matches!(r, DegradedReason::LlmUnavailable(_))));
    }

    #[tokio::test]
    async fn test_stalled_llm_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.llm.timeout_secs = 1;
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let engine = engine_with_llm(&mut config, &store, "stalled", Arc::new(StalledLlm));

        let answer = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        assert!(answer.result.grounded);
        assert!(answer.result.strategy_metadata.llm_fallback);
        assert!(answer.result.strategy_metadata.warnings[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_storage_failure_yields_retrieval_failed_answer() {
        let config = test_config();
        let store: Arc<dyn TenantStore> = Arc::new(FailingStore);
        let providers = Arc::new(ProviderRegistry::from_config(&config, None).unwrap());
        let engine = RagEngine::new(&config, store, providers, AnswerCache::default());

        let answer = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        let result = &answer.result;
        assert!(!result.grounded);
        assert!(result.sources.is_empty());
        assert!(result.response_text.starts_with("Retrieval failed"));
        assert!(result.response_text.contains("hybrid"));
        assert!(result
            .strategy_metadata
            .retrieval_error
            .as_deref()
            .unwrap()
            .contains("connection refused"));
        assert_eq!(engine.cache().stats().entries, 0);
    }

    #[tokio::test]
    async fn test_invalid_question_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let engine = engine(&config, &store, registry(&config, &store));

        let err = engine.answer(&AskRequest::new(1, "   ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_top_k_is_clamped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let engine = engine(&config, &store, registry(&config, &store));

        assert_eq!(engine.top_k_used(None), 5);
        assert_eq!(engine.top_k_used(Some(0)), 1);
        assert_eq!(engine.top_k_used(Some(100)), 25);

        let answer = engine
            .answer(&AskRequest::new(1, BST_QUESTION).with_top_k(40))
            .await
            .unwrap();
        assert_eq!(answer.result.strategy_metadata.top_k_used, 25);
    }

    #[tokio::test]
    async fn test_settings_change_invalidates_cached_answer() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let engine = engine(&config, &store, registry(&config, &store));

        engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        assert!(engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap().cached);

        let resolved = engine
            .update_settings(
                1,
                StoredTenantSettings {
                    retrieval_strategy: Some("BM25".to_string()),
                    llm_provider: Some("mock".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resolved.llm_provider, "mock");

        let after = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        assert!(!after.cached);
        assert_eq!(after.result.strategy_metadata.retrieval_strategy_used, "keyword");
        assert!(after.result.response_text.starts_with("Grounded answer:"));
    }

    #[tokio::test]
    async fn test_reindex_fills_precomputed_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        store
            .insert_document(&document_record(
                dir.path(),
                2,
                "heaps.txt",
                "A binary heap keeps the smallest key at the root.",
            ))
            .unwrap();
        let engine = engine(&config, &store, registry(&config, &store));

        let report = engine.reindex(1, None).await.unwrap();
        assert_eq!(report.chunks_indexed, 2);
        assert_eq!(report.embedding_provider_used.as_deref(), Some("sentence_transformer"));
        assert_eq!(
            store
                .count_chunks(IndexScope {
                    tenant_id: 1,
                    course_id: None
                })
                .unwrap(),
            2
        );

        let answer = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        assert!(answer.result.grounded);
        assert_eq!(answer.result.strategy_metadata.vector_store_used, "postgres");
    }

    #[tokio::test]
    async fn test_tenant_reindex_serves_course_scoped_questions() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_course_document(dir.path());
        let engine = engine(&config, &store, registry(&config, &store));

        let report = engine.reindex(1, None).await.unwrap();
        assert_eq!(report.chunks_indexed, 2);
        assert_eq!(store.count_chunks(scope(None)).unwrap(), 2);
        assert_eq!(store.count_chunks(scope(Some(7))).unwrap(), 1);

        let answer = engine
            .answer(&AskRequest::new(1, HEAP_QUESTION).with_course(7))
            .await
            .unwrap();
        assert!(answer.result.grounded);
        assert_eq!(answer.result.sources[0].source, "heaps.txt");
        assert_eq!(answer.result.strategy_metadata.vector_store_used, "postgres");
    }

    #[tokio::test]
    async fn test_course_reindex_leaves_other_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_course_document(dir.path());
        let engine = engine(&config, &store, registry(&config, &store));

        let report = engine.reindex(1, Some(7)).await.unwrap();
        assert_eq!(report.course_id, Some(7));
        assert_eq!(report.chunks_indexed, 1);
        assert_eq!(store.count_chunks(scope(None)).unwrap(), 1);

        let answer = engine
            .answer(&AskRequest::new(1, HEAP_QUESTION).with_course(7))
            .await
            .unwrap();
        assert_eq!(answer.result.strategy_metadata.vector_store_used, "postgres");

        engine.reindex(1, None).await.unwrap();
        engine.reindex(1, Some(7)).await.unwrap();
        assert_eq!(store.count_chunks(scope(None)).unwrap(), 2);
        assert_eq!(store.count_chunks(scope(Some(7))).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_chunking_change_ignores_stale_index_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_document(
            dir.path(),
            "trees.txt",
            "# Trees\nA binary search tree orders nodes by key.\n# Heaps\nA binary heap keeps the smallest key at the root.",
        );
        let engine = engine(&config, &store, registry(&config, &store));

        // semantic chunking: one passage per header
        assert_eq!(engine.reindex(1, None).await.unwrap().chunks_indexed, 2);

        engine
            .update_settings(
                1,
                StoredTenantSettings {
                    chunking_strategy: Some("page_based".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // page-based chunking reuses id document:1:0 for the whole text
        let answer = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        let meta = &answer.result.strategy_metadata;
        assert!(answer.result.grounded);
        assert_eq!(meta.chunking_strategy_used, "page_based");
        assert_eq!(meta.vector_store_used, "memory");

        assert_eq!(engine.reindex(1, None).await.unwrap().chunks_indexed, 1);
        assert_eq!(store.count_chunks(scope(None)).unwrap(), 1);
        let answer = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        assert!(answer.result.grounded);
        assert_eq!(answer.result.strategy_metadata.vector_store_used, "postgres");
    }

    #[tokio::test]
    async fn test_answers_with_failed_embeddings_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.defaults.embedding_provider = "openai".to_string();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let failing = Arc::new(FailingEmbedder::default());
        let mut providers = ProviderRegistry::from_config(&config, Some(store.clone())).unwrap();
        providers.register_embedder("openai", failing.clone());
        let engine = engine(&config, &store, Arc::new(providers));

        let first = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        assert!(first.result.grounded);
        assert!(first
            .degraded
            .iter()
            .any(|r| matches!(r, DegradedReason::EmbeddingProviderUnavailable(_))));

        let calls = failing.calls.load(Ordering::SeqCst);
        assert!(calls > 0);

        let second = engine.answer(&AskRequest::new(1, BST_QUESTION)).await.unwrap();
        assert!(!second.cached);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2 * calls);
        assert_eq!(engine.cache().stats().entries, 0);
    }

    #[tokio::test]
    async fn test_reindex_without_index_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.storage.vector_index_enabled = false;
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let engine = engine(&config, &store, registry(&config, &store));

        assert!(matches!(
            engine.reindex(1, None).await,
            Err(Error::VectorIndex(_))
        ));
    }

    #[tokio::test]
    async fn test_readiness_reports_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let store = store_with_document(dir.path(), "bst.txt", BST);
        let engine = engine(&config, &store, registry(&config, &store));
        let ready = engine.readiness().await;
        assert!(ready.is_ready());
        assert!(ready.default_llm);

        let failing = RagEngine::new(
            &config,
            Arc::new(FailingStore),
            registry(&config, &store),
            AnswerCache::default(),
        );
        assert!(!failing.readiness().await.is_ready());
    }

    #[test]
    fn test_refusal_message_names_scope() {
        assert!(refusal_message(Some(3)).contains("course 3"));
        assert!(refusal_message(None).contains("your course materials"));
    }
}
