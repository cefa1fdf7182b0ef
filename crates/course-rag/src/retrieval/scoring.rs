//! Scoring primitives shared by the retriever and the vector index

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::tenant::RetrievalStrategy;

static QUERY_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9_]+").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Minimum query token length
pub const MIN_TOKEN_CHARS: usize = 3;
/// Length of the raw-query fallback token
pub const FALLBACK_TOKEN_CHARS: usize = 64;
/// Characters of context kept before the first token hit in a snippet
const SNIPPET_LEAD_CHARS: usize = 120;

/// Lowercase word tokens of a query, at most `max_tokens`
///
/// Falls back to the lowercased query (first 64 characters) when it has no
/// token of at least three characters.
pub fn tokenize(query: &str, max_tokens: usize) -> Vec<String> {
    let lowered = query.to_lowercase();
    let tokens: Vec<String> = QUERY_TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .take(max_tokens)
        .map(str::to_string)
        .collect();
    if !tokens.is_empty() {
        return tokens;
    }

    let fallback: String = lowered.trim().chars().take(FALLBACK_TOKEN_CHARS).collect();
    if fallback.is_empty() {
        Vec::new()
    } else {
        vec![fallback]
    }
}

/// Fraction of query tokens present in the text, capped at `cap`
pub fn keyword_score(text: &str, tokens: &[String], cap: f32) -> f32 {
    if tokens.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let hits = tokens
        .iter()
        .filter(|t| !t.is_empty() && lowered.contains(t.as_str()))
        .count();
    (hits as f32 / tokens.len() as f32).min(cap).max(0.0)
}

/// Whitespace-collapsed excerpt of at most `max_len` characters
///
/// Starts a little before the earliest token hit, or at the beginning when no
/// token occurs.
pub fn best_snippet(text: &str, tokens: &[String], max_len: usize) -> String {
    let compact = WHITESPACE.replace_all(text, " ");
    let compact = compact.trim();
    if compact.is_empty() {
        return String::new();
    }

    // ASCII lowering keeps byte offsets aligned with `compact`
    let lowered = compact.to_ascii_lowercase();
    let first_hit = tokens
        .iter()
        .filter(|t| !t.is_empty())
        .filter_map(|t| lowered.find(t.as_str()))
        .min();

    let graphemes: Vec<(usize, &str)> = compact.grapheme_indices(true).collect();
    let start = match first_hit {
        Some(offset) => graphemes
            .partition_point(|(i, _)| *i < offset)
            .saturating_sub(SNIPPET_LEAD_CHARS),
        None => 0,
    };
    graphemes
        .iter()
        .skip(start)
        .take(max_len)
        .map(|(_, g)| *g)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Cosine similarity clamped to [0, 1]
///
/// Mismatched lengths, empty vectors and zero norms score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let sim = dot / (norm_a * norm_b);
    if sim.is_finite() {
        sim.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Blend weights of the hybrid strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub semantic: f32,
    pub keyword: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            semantic: 0.65,
            keyword: 0.35,
        }
    }
}

/// Combined score of one chunk under a strategy, clamped to [0, 1]
pub fn combine(strategy: RetrievalStrategy, keyword: f32, semantic: f32, weights: ScoreWeights) -> f32 {
    let score = match strategy {
        RetrievalStrategy::Keyword => keyword,
        RetrievalStrategy::Semantic => semantic,
        RetrievalStrategy::Hybrid => weights.semantic * semantic + weights.keyword * keyword,
    };
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("What is a Binary Search Tree?", 8),
            toks(&["what", "binary", "search", "tree"])
        );
        assert_eq!(tokenize("a b c d e f g h i j k l", 8).len(), 1);
        assert_eq!(tokenize("Is it ok?", 8), toks(&["is it ok?"]));
        assert!(tokenize("   ", 8).is_empty());
        assert_eq!(tokenize("one two three four five six seven eight nine ten", 3).len(), 3);
    }

    #[test]
    fn test_keyword_score() {
        let tokens = toks(&["binary", "search", "tree", "quantum"]);
        let score = keyword_score("A Binary Search Tree orders nodes", &tokens, 0.95);
        assert!((score - 0.75).abs() < 1e-6);

        assert_eq!(keyword_score("binary search tree", &toks(&["binary", "tree"]), 0.95), 0.95);
        assert_eq!(keyword_score("anything", &[], 0.95), 0.0);
        assert_eq!(keyword_score("anything", &toks(&[""]), 0.95), 0.0);
    }

    #[test]
    fn test_best_snippet_centres_on_first_hit() {
        let text = format!("{} binary search trees are ordered", "filler ".repeat(60));
        let snippet = best_snippet(&text, &toks(&["binary"]), 200);
        assert!(snippet.contains("binary search"));
        assert!(snippet.chars().count() <= 200);

        let start = best_snippet("  Hello\n\n world  ", &toks(&["zzz"]), 380);
        assert_eq!(start, "Hello world");
        assert_eq!(best_snippet(" \n ", &[], 380), "");
    }

    #[test]
    fn test_cosine_similarity_edges() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_hybrid_weighting() {
        let score = combine(RetrievalStrategy::Hybrid, 0.5, 0.8, ScoreWeights::default());
        assert!((score - (0.65 * 0.8 + 0.35 * 0.5)).abs() < 1e-6);
        assert_eq!(combine(RetrievalStrategy::Keyword, 0.4, 0.9, ScoreWeights::default()), 0.4);
        assert_eq!(combine(RetrievalStrategy::Semantic, 0.4, 0.9, ScoreWeights::default()), 0.9);
    }

    proptest! {
        #[test]
        fn prop_combined_score_in_unit_range(k in -2.0f32..2.0, s in -2.0f32..2.0, w in 0.0f32..3.0) {
            let weights = ScoreWeights { semantic: w, keyword: 1.0 };
            for strategy in [RetrievalStrategy::Keyword, RetrievalStrategy::Semantic, RetrievalStrategy::Hybrid] {
                let score = combine(strategy, k, s, weights);
                prop_assert!((0.0..=1.0).contains(&score));
            }
        }

        #[test]
        fn prop_snippet_bounded(text in "\\PC{0,600}", max_len in 1usize..400) {
            let snippet = best_snippet(&text, &["the".to_string()], max_len);
            prop_assert!(snippet.graphemes(true).count() <= max_len);
        }
    }
}
