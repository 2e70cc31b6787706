//! Question sources: turn a concept name into one yes/no comprehension question.
//!
//! The diagnostic service treats every source as a black box. A source may
//! have nothing to ask about a concept (`Ok(None)`) or fail outright; both
//! cases drop the concept from the diagnostic queue.

mod gemini;
mod static_source;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{GeminiQuestions, MaterialLibrary};
pub use static_source::StaticQuestions;

/// Errors raised by question sources.
#[derive(Debug, Error)]
pub enum QuestionError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to read learning material: {0}")]
    Material(#[from] std::io::Error),

    #[error("failed to load questions: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Short name used in logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// A single yes/no question about `concept`, or `None` if the source has
    /// nothing for it.
    async fn binary_question(&self, concept: &str) -> Result<Option<String>, QuestionError>;
}

/// Prompt asking a generative model for one reasoning-based yes/no question
/// about `concept`, grounded in `material`.
pub fn build_binary_question_prompt(concept: &str, material: &str) -> String {
    format!(
        r#"
You are an educational assistant helping students assess their understanding of computer science concepts.

**Task**: From the following learning material, generate a **single yes/no question** that tests understanding of the concept: **"{concept}"**.

**Guidelines**:
- Focus on conceptual understanding
- Avoid factual, memory-based, or trivia questions
- Ask reasoning-based questions (e.g., "Can you explain how a stack is used in recursion?")

**Return only the question**, with no explanation or intro.

---

**Learning Content**:
{material}
"#
    )
}

/// Trim a generated question; blank output means no question.
pub(crate) fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_concept_and_material() {
        let prompt = build_binary_question_prompt("Recursion", "A function calling itself.");
        assert!(prompt.contains(r#"**"Recursion"**"#));
        assert!(prompt.contains("A function calling itself."));
        assert!(prompt.contains("single yes/no question"));
    }

    #[test]
    fn blank_text_is_no_question() {
        assert_eq!(non_empty("   \n"), None);
        assert_eq!(non_empty("  Is a queue FIFO?  "), Some("Is a queue FIFO?".to_string()));
    }
}
