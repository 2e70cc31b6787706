use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use super::{non_empty, QuestionError, QuestionSource};

/// Fixed concept → question table, usually loaded from a JSON object file.
#[derive(Debug, Clone, Default)]
pub struct StaticQuestions {
    questions: HashMap<String, String>,
}

impl StaticQuestions {
    pub fn new(questions: HashMap<String, String>) -> Self {
        Self { questions }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, QuestionError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&content)?))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[async_trait]
impl QuestionSource for StaticQuestions {
    fn name(&self) -> &str {
        "static"
    }

    async fn binary_question(&self, concept: &str) -> Result<Option<String>, QuestionError> {
        Ok(self.questions.get(concept).and_then(|q| non_empty(q)))
    }
}
