//! Diagnostic session manager.
//!
//! [`DiagnosticService`] ties the prerequisite index, a question source and a
//! session store together:
//!
//! - [`start`](DiagnosticService::start) resolves every prerequisite of a
//!   target concept, asks the question source about each one and persists a
//!   new session holding the resulting question queue.
//! - [`answer`](DiagnosticService::answer) advances a session by exactly one
//!   step and returns either the next question or the final results.
//! - [`history`](DiagnosticService::history) summarises a learner's sessions
//!   per target concept.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use uuid::Uuid;

use crate::db::SessionStore;
use crate::graph::PrerequisiteIndex;
use crate::models::*;
use crate::questions::QuestionSource;

pub const DEFAULT_QUESTION_CONCURRENCY: usize = 4;

/// Validation message for an answer request without a session id or answer.
pub const MISSING_ANSWER_FIELDS: &str = "Missing sessionId or answer";

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("{0}")]
    Validation(String),

    #[error("Session not found")]
    NotFound,

    #[error(transparent)]
    AlreadyComplete(#[from] SessionCompleted),

    /// Another answer advanced the session between our read and our write.
    #[error("Session was updated concurrently, fetch the current question and retry")]
    Conflict,

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DiagnosticError>;

/// Per-concept history entry: target concept → results of its latest session.
pub type AttemptHistory = BTreeMap<String, DiagnosticResults>;

#[derive(Clone)]
pub struct DiagnosticService {
    index: Arc<PrerequisiteIndex>,
    questions: Arc<dyn QuestionSource>,
    store: Arc<dyn SessionStore>,
    question_concurrency: usize,
}

impl DiagnosticService {
    pub fn new(
        index: Arc<PrerequisiteIndex>,
        questions: Arc<dyn QuestionSource>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            index,
            questions,
            store,
            question_concurrency: DEFAULT_QUESTION_CONCURRENCY,
        }
    }

    /// Number of question-source calls allowed in flight while starting a session.
    pub fn with_question_concurrency(mut self, limit: usize) -> Self {
        self.question_concurrency = limit.max(1);
        self
    }

    pub fn index(&self) -> &PrerequisiteIndex {
        &self.index
    }

    pub fn prerequisites(&self, concept: &str) -> Vec<String> {
        self.index.all_prerequisites(concept)
    }

    /// Start a diagnostic session for `target_concept` on behalf of `user_id`.
    ///
    /// Prerequisites the question source has no question for (or fails on) are
    /// left out of the queue. If none remain, the session is complete from the
    /// start and the response carries its results instead of a question.
    pub async fn start(&self, target_concept: &str, user_id: &str) -> Result<StartResponse> {
        let target_concept = required(target_concept, "concept")?;
        let user_id = required(user_id, "userId")?;

        let prerequisites = self.index.all_prerequisites(target_concept);
        let question_queue = self.build_queue(&prerequisites).await;

        tracing::info!(
            target_concept,
            user_id,
            prerequisites = prerequisites.len(),
            questions = question_queue.len(),
            "Starting diagnostic session"
        );

        let session = PlaySession::new(user_id, target_concept, prerequisites, question_queue);
        let session_id = self
            .store
            .create_session(&session)
            .map_err(DiagnosticError::Storage)?;

        let is_complete = session.is_complete();
        Ok(StartResponse {
            session_id,
            question: session.current_question().cloned(),
            is_complete,
            results: is_complete.then(|| session.results()),
        })
    }

    /// Answer the current question of a session and advance it by one step.
    pub async fn answer(&self, input: AnswerInput) -> Result<AnswerResponse> {
        let (session_id, answer) = match (input.session_id.as_deref(), input.answer.as_deref()) {
            (Some(id), Some(answer)) if !id.is_empty() && !answer.is_empty() => (id, answer),
            _ => {
                return Err(DiagnosticError::Validation(
                    MISSING_ANSWER_FIELDS.to_string(),
                ))
            }
        };

        // An id that is not a UUID cannot name a stored session.
        let session_id = Uuid::parse_str(session_id).map_err(|_| DiagnosticError::NotFound)?;

        let mut session = self
            .store
            .get_session(session_id)
            .map_err(DiagnosticError::Storage)?
            .ok_or(DiagnosticError::NotFound)?;

        let expected_index = session.current_index;
        session.record_answer(answer)?;

        let saved = self
            .store
            .save_session(&session, expected_index)
            .map_err(DiagnosticError::Storage)?;
        if !saved {
            tracing::warn!(%session_id, expected_index, "Lost race on session answer");
            return Err(DiagnosticError::Conflict);
        }

        tracing::debug!(
            %session_id,
            step = session.current_index,
            total = session.question_queue.len(),
            "Recorded answer"
        );

        match session.current_question() {
            Some(next) => Ok(AnswerResponse::next(next.clone())),
            None => {
                tracing::info!(
                    %session_id,
                    weak = session.weak_concepts.len(),
                    "Diagnostic session complete"
                );
                Ok(AnswerResponse::complete(session.results()))
            }
        }
    }

    /// Results per target concept across every session of `user_id`.
    ///
    /// Sessions are visited oldest first and a later session for the same
    /// target replaces the earlier entry, so each concept shows one attempt.
    pub fn history(&self, user_id: &str) -> Result<AttemptHistory> {
        let sessions = self
            .store
            .get_sessions_by_user(user_id)
            .map_err(DiagnosticError::Storage)?;

        Ok(sessions
            .iter()
            .filter(|s| !s.target_concept.is_empty())
            .map(|s| (s.target_concept.clone(), s.results()))
            .collect())
    }

    pub fn session(&self, id: Uuid) -> Result<PlaySession> {
        self.store
            .get_session(id)
            .map_err(DiagnosticError::Storage)?
            .ok_or(DiagnosticError::NotFound)
    }

    async fn build_queue(&self, prerequisites: &[String]) -> Vec<QueuedQuestion> {
        // Items own their concept and source; the fan-out must not borrow from the caller.
        let source = Arc::clone(&self.questions);

        stream::iter(prerequisites.to_vec())
            .map(move |concept| {
                let source = Arc::clone(&source);
                async move { lookup_question(source.as_ref(), concept).await }
            })
            .buffered(self.question_concurrency)
            .filter_map(|queued| async move { queued })
            .collect()
            .await
    }
}

async fn lookup_question(source: &dyn QuestionSource, concept: String) -> Option<QueuedQuestion> {
    match source.binary_question(&concept).await {
        Ok(Some(question)) => Some(QueuedQuestion { concept, question }),
        Ok(None) => {
            tracing::debug!(concept = %concept, "No question available");
            None
        }
        Err(e) => {
            tracing::warn!(
                concept = %concept,
                source = source.name(),
                "Question source failed, skipping concept: {}",
                e
            );
            None
        }
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(DiagnosticError::Validation(format!("Missing {}", field)));
    }
    Ok(value)
}
