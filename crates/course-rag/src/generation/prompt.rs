//! Prompt templates for grounded answers

use crate::types::ScoredChunk;

const CONTEXT_HEADER: &str = "CONTEXT FROM COURSE MATERIALS:\n";
const QUESTION_HEADER: &str = "\nQUESTION: ";
const ANSWER_TRAILER: &str = "\n\nAnswer using ONLY the course material above:";
const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Question and context passages recovered from a built prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPrompt {
    pub question: String,
    pub passages: Vec<String>,
}

/// Prompt builder for grounded course questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Numbered context blocks, one per chunk
    pub fn build_context(chunks: &[ScoredChunk]) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, scored)| {
                format!(
                    "[{}] Source: {}\n{}",
                    i + 1,
                    scored.chunk.source_name,
                    scored.chunk.text.trim()
                )
            })
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR)
    }

    /// Full prompt with grounding rules
    pub fn build_prompt(question: &str, context: &str, course_id: Option<i64>) -> String {
        let scope = match course_id {
            Some(id) => format!("course {}", id),
            None => "this tenant's courses".to_string(),
        };
        format!(
            r#"You are a teaching assistant for {scope}. Answer ONLY from the course material below.

RULES:
1. Use only information stated in the context
2. If the context does not contain the answer, say it is not covered by the course material
3. Mention the source name when you rely on a passage
4. Keep the answer concise

{header}{context}
{question_header}{question}{trailer}"#,
            scope = scope,
            header = CONTEXT_HEADER,
            context = context,
            question_header = QUESTION_HEADER,
            question = question.trim(),
            trailer = ANSWER_TRAILER,
        )
    }

    /// Recover question and passages from a prompt built by [`build_prompt`](Self::build_prompt)
    pub fn parse(prompt: &str) -> Option<ParsedPrompt> {
        let context_start = prompt.find(CONTEXT_HEADER)? + CONTEXT_HEADER.len();
        let question_at = prompt.rfind(QUESTION_HEADER)?;
        if question_at < context_start {
            return None;
        }
        let context = &prompt[context_start..question_at];
        let question = prompt[question_at + QUESTION_HEADER.len()..]
            .trim_end_matches(ANSWER_TRAILER)
            .trim()
            .to_string();

        let passages = context
            .split(PASSAGE_SEPARATOR)
            .map(|block| match block.split_once('\n') {
                Some((first, rest)) if first.starts_with('[') => rest.trim(),
                _ => block.trim(),
            })
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Some(ParsedPrompt { question, passages })
    }
}
