use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted diagnostic session for one learner and one target concept.
///
/// The prerequisite list is a snapshot taken when the session starts and is
/// never recomputed. The session only moves forward: each accepted answer
/// appends to `answered_questions` and advances `current_index` by one.
/// Sessions are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySession {
    pub id: Uuid,
    pub user_id: String,
    pub target_concept: String,
    pub prerequisites: Vec<String>,
    pub question_queue: Vec<QueuedQuestion>,
    pub answered_questions: Vec<AnsweredQuestion>,
    /// Concepts answered "no", without duplicates, in the order they were found.
    pub weak_concepts: Vec<String>,
    pub current_index: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedQuestion {
    pub concept: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub concept: String,
    pub question: String,
    pub answer: String,
}

/// Strong/weak partition of a session's prerequisites.
///
/// Always derived from the stored session, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResults {
    pub strong_concepts: Vec<String>,
    pub weak_concepts: Vec<String>,
    pub recommended_concepts: Vec<String>,
}

/// Returned when an answer is offered to a session that has no question left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Session already completed")]
pub struct SessionCompleted;

impl PlaySession {
    pub fn new(
        user_id: impl Into<String>,
        target_concept: impl Into<String>,
        prerequisites: Vec<String>,
        question_queue: Vec<QueuedQuestion>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            target_concept: target_concept.into(),
            prerequisites,
            question_queue,
            answered_questions: Vec::new(),
            weak_concepts: Vec::new(),
            current_index: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.question_queue.len()
    }

    /// The question waiting for an answer, if any.
    pub fn current_question(&self) -> Option<&QueuedQuestion> {
        self.question_queue.get(self.current_index)
    }

    /// Record an answer to the current question and advance by one step.
    ///
    /// An answer equal to "no" (case-insensitive) marks the question's concept
    /// as weak. A concept is recorded as weak at most once.
    pub fn record_answer(&mut self, answer: &str) -> Result<(), SessionCompleted> {
        let QueuedQuestion { concept, question } =
            self.current_question().cloned().ok_or(SessionCompleted)?;

        if is_negative(answer) && !self.weak_concepts.contains(&concept) {
            self.weak_concepts.push(concept.clone());
        }

        self.answered_questions.push(AnsweredQuestion {
            concept,
            question,
            answer: answer.to_string(),
        });
        self.current_index += 1;
        self.updated_at = Utc::now();

        Ok(())
    }

    pub fn results(&self) -> DiagnosticResults {
        let strong_concepts = self
            .prerequisites
            .iter()
            .filter(|concept| !self.weak_concepts.contains(concept))
            .cloned()
            .collect();

        DiagnosticResults {
            strong_concepts,
            weak_concepts: self.weak_concepts.clone(),
            recommended_concepts: self.weak_concepts.clone(),
        }
    }
}

fn is_negative(answer: &str) -> bool {
    answer.to_lowercase() == "no"
}

/// Response to starting a diagnostic.
///
/// When no prerequisite produced a question the session is complete from the
/// start: `question` is absent and `results` is filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub session_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<QueuedQuestion>,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<DiagnosticResults>,
}

/// Query parameters for starting a diagnostic.
///
/// Both fields are required; they are optional here so a missing value is
/// reported as a validation error instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQuery {
    #[serde(default)]
    pub concept: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

/// Response to an accepted answer: either the next question or final results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<QueuedQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<DiagnosticResults>,
}

impl AnswerResponse {
    pub fn next(question: QueuedQuestion) -> Self {
        Self {
            is_complete: false,
            question: Some(question),
            results: None,
        }
    }

    pub fn complete(results: DiagnosticResults) -> Self {
        Self {
            is_complete: true,
            question: None,
            results: Some(results),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(concept: &str) -> QueuedQuestion {
        QueuedQuestion {
            concept: concept.to_string(),
            question: format!("Do you understand {}?", concept),
        }
    }

    fn session(prerequisites: &[&str], queue: &[&str]) -> PlaySession {
        PlaySession::new(
            "user-1",
            "Target",
            prerequisites.iter().map(|c| c.to_string()).collect(),
            queue.iter().map(|c| queued(c)).collect(),
        )
    }

    #[test]
    fn new_session_starts_at_first_question() {
        let s = session(&["A", "B"], &["A", "B"]);
        assert_eq!(s.current_index, 0);
        assert!(!s.is_complete());
        assert_eq!(s.current_question(), Some(&queued("A")));
    }

    #[test]
    fn empty_queue_is_complete_immediately() {
        let s = session(&["A"], &[]);
        assert!(s.is_complete());
        assert!(s.current_question().is_none());
    }

    #[test]
    fn each_answer_advances_exactly_one_step() {
        let mut s = session(&["A", "B"], &["A", "B"]);

        s.record_answer("yes").unwrap();
        assert_eq!(s.current_index, 1);
        assert_eq!(s.answered_questions.len(), 1);

        s.record_answer("yes").unwrap();
        assert_eq!(s.current_index, 2);
        assert_eq!(s.answered_questions.len(), 2);
        assert!(s.is_complete());
    }

    #[test]
    fn completed_session_rejects_answers_unchanged() {
        let mut s = session(&["A"], &["A"]);
        s.record_answer("no").unwrap();
        let before = s.clone();

        assert_eq!(s.record_answer("no"), Err(SessionCompleted));
        assert_eq!(s, before);
    }

    #[test]
    fn negative_answer_is_case_insensitive() {
        let mut s = session(&["A", "B", "C"], &["A", "B", "C"]);
        s.record_answer("NO").unwrap();
        s.record_answer("No").unwrap();
        s.record_answer("nope").unwrap();

        assert_eq!(s.weak_concepts, vec!["A", "B"]);
    }

    #[test]
    fn weak_concepts_never_duplicate() {
        let mut s = session(&["A"], &["A", "A", "A"]);
        s.record_answer("no").unwrap();
        s.record_answer("no").unwrap();
        s.record_answer("no").unwrap();

        assert_eq!(s.weak_concepts, vec!["A"]);
        assert_eq!(s.answered_questions.len(), 3);
    }

    #[test]
    fn results_partition_prerequisites() {
        let mut s = session(&["A", "B", "C"], &["A", "B"]);
        s.record_answer("no").unwrap();
        s.record_answer("yes").unwrap();

        let results = s.results();
        assert_eq!(results.weak_concepts, vec!["A"]);
        assert_eq!(results.strong_concepts, vec!["B", "C"]);
        assert_eq!(results.recommended_concepts, results.weak_concepts);

        let mut union: Vec<_> = results
            .strong_concepts
            .iter()
            .chain(results.weak_concepts.iter())
            .cloned()
            .collect();
        union.sort();
        assert_eq!(union, vec!["A", "B", "C"]);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let response = AnswerResponse::complete(DiagnosticResults {
            strong_concepts: vec!["B".into()],
            weak_concepts: vec!["A".into()],
            recommended_concepts: vec!["A".into()],
        });
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["isComplete"], true);
        assert_eq!(json["results"]["strongConcepts"][0], "B");
        assert!(json.get("question").is_none());
    }
}
