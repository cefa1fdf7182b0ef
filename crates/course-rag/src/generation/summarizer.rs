//! Deterministic extractive summarizer
//!
//! Answers from the grounded passages alone by picking the sentences that
//! share the most query tokens. Used by the `local` LLM provider and as the
//! fallback when the configured LLM fails.

use crate::ingestion::chunking::SentenceChunker;
use crate::retrieval::scoring::tokenize;

/// Sentences quoted per answer
pub const DEFAULT_SUMMARY_SENTENCES: usize = 3;
const MAX_SENTENCE_CHARS: usize = 400;

/// Summarize `passages` with respect to `question`
///
/// Picks up to `max_sentences` sentences by query-token overlap and returns
/// them in passage order. Without any overlap the opening sentence of the
/// first passage is used. Empty passages yield an empty string.
pub fn summarize(question: &str, passages: &[String], max_sentences: usize) -> String {
    let tokens = tokenize(question, 8);
    let sentences: Vec<&str> = passages
        .iter()
        .flat_map(|p| SentenceChunker::split_sentences(p))
        .collect();
    if sentences.is_empty() {
        return String::new();
    }

    let mut ranked: Vec<(usize, usize)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let lowered = s.to_lowercase();
            let hits = tokens
                .iter()
                .filter(|t| !t.is_empty() && lowered.contains(t.as_str()))
                .count();
            (i, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .collect();
    // stable: equal overlap keeps passage order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut picked: Vec<usize> = ranked
        .into_iter()
        .take(max_sentences.max(1))
        .map(|(i, _)| i)
        .collect();
    if picked.is_empty() {
        picked.push(0);
    }
    picked.sort_unstable();

    let body = picked
        .into_iter()
        .map(|i| clip(sentences[i]))
        .collect::<Vec<_>>()
        .join(" ");
    format!("Based on the course materials: {}", body)
}

fn clip(sentence: &str) -> String {
    if sentence.chars().count() <= MAX_SENTENCE_CHARS {
        return sentence.to_string();
    }
    let mut out: String = sentence.chars().take(MAX_SENTENCE_CHARS).collect();
    out.push_str("...");
    out
}
