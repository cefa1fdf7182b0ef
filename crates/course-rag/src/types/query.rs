//! Ask request type

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest accepted question, in characters
pub const MAX_QUESTION_CHARS: usize = 4000;

/// Caller request to answer a question over a tenant's course materials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub tenant_id: i64,
    /// Restrict retrieval to one course
    #[serde(default)]
    pub course_id: Option<i64>,
    pub question: String,
    /// Number of sources wanted (1-25, clamped)
    #[serde(default, alias = "top_k")]
    pub top_k: Option<usize>,
}

impl AskRequest {
    /// Create a request with the default top-k
    pub fn new(tenant_id: i64, question: impl Into<String>) -> Self {
        Self {
            tenant_id,
            course_id: None,
            question: question.into(),
            top_k: None,
        }
    }

    /// Scope the request to a course
    pub fn with_course(mut self, course_id: i64) -> Self {
        self.course_id = Some(course_id);
        self
    }

    /// Set the requested top-k
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Reject empty and oversized questions
    pub fn validate(&self) -> Result<()> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(Error::invalid_request("question must not be empty"));
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(Error::invalid_request(format!(
                "question exceeds {} characters",
                MAX_QUESTION_CHARS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(AskRequest::new(1, "What is a tree?").validate().is_ok());
        assert!(AskRequest::new(1, "   ").validate().is_err());
        assert!(AskRequest::new(1, "x".repeat(MAX_QUESTION_CHARS + 1)).validate().is_err());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let req: AskRequest =
            serde_json::from_str(r#"{"tenantId": 4, "courseId": 9, "question": "q", "topK": 3}"#)
                .unwrap();
        assert_eq!(req.tenant_id, 4);
        assert_eq!(req.course_id, Some(9));
        assert_eq!(req.top_k, Some(3));
    }
}
