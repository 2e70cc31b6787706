use prereq_playground::db::{Database, SessionStore};
use prereq_playground::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn queued(concept: &str) -> QueuedQuestion {
    QueuedQuestion {
        concept: concept.to_string(),
        question: format!("Do you understand {}?", concept),
    }
}

fn new_session(user_id: &str, target: &str) -> PlaySession {
    PlaySession::new(
        user_id,
        target,
        vec!["A".to_string(), "B".to_string(), "C".to_string()],
        vec![queued("A"), queued("B")],
    )
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "create_session" {
        it "returns the session id" {
            let session = new_session("user-1", "Target");
            let id = db.create_session(&session).expect("Failed to create session");
            assert_eq!(id, session.id);
        }

        it "rejects a duplicate id" {
            let session = new_session("user-1", "Target");
            db.create_session(&session).expect("Failed to create session");
            assert!(db.create_session(&session).is_err());
        }
    }

    describe "get_session" {
        it "returns None for non-existent session" {
            let result = db.get_session(Uuid::new_v4()).expect("Query failed");
            assert!(result.is_none());
        }

        it "round trips every field" {
            let mut session = new_session("user-1", "Target");
            session.record_answer("no").unwrap();
            db.create_session(&session).expect("Failed to create session");

            let found = db.get_session(session.id).expect("Query failed").expect("Session missing");
            assert_eq!(found.user_id, "user-1");
            assert_eq!(found.target_concept, "Target");
            assert_eq!(found.prerequisites, vec!["A", "B", "C"]);
            assert_eq!(found.question_queue, session.question_queue);
            assert_eq!(found.answered_questions, session.answered_questions);
            assert_eq!(found.weak_concepts, vec!["A"]);
            assert_eq!(found.current_index, 1);
        }
    }

    describe "get_sessions_by_user" {
        it "returns empty list for unknown user" {
            let sessions = db.get_sessions_by_user("nobody").expect("Query failed");
            assert!(sessions.is_empty());
        }

        it "returns only the user's sessions, oldest first" {
            let first = new_session("user-1", "Graphs");
            let other = new_session("user-2", "Graphs");
            let second = new_session("user-1", "Trees");
            db.create_session(&first).unwrap();
            db.create_session(&other).unwrap();
            db.create_session(&second).unwrap();

            let sessions = db.get_sessions_by_user("user-1").expect("Query failed");
            let ids: Vec<Uuid> = sessions.iter().map(|s| s.id).collect();
            assert_eq!(ids, vec![first.id, second.id]);
        }
    }

    describe "save_session" {
        it "persists an advanced session" {
            let mut session = new_session("user-1", "Target");
            db.create_session(&session).unwrap();

            session.record_answer("yes").unwrap();
            let saved = db.save_session(&session, 0).expect("Save failed");
            assert!(saved);

            let found = db.get_session(session.id).unwrap().unwrap();
            assert_eq!(found.current_index, 1);
            assert_eq!(found.answered_questions.len(), 1);
            assert!(found.weak_concepts.is_empty());
        }

        it "refuses a stale write and leaves the row unchanged" {
            let session = new_session("user-1", "Target");
            db.create_session(&session).unwrap();

            let mut first = session.clone();
            first.record_answer("no").unwrap();
            assert!(db.save_session(&first, 0).unwrap());

            let mut racing = session.clone();
            racing.record_answer("yes").unwrap();
            assert!(!db.save_session(&racing, 0).unwrap());

            let found = db.get_session(session.id).unwrap().unwrap();
            assert_eq!(found.current_index, 1);
            assert_eq!(found.answered_questions[0].answer, "no");
            assert_eq!(found.weak_concepts, vec!["A"]);
        }

        it "returns false for an unknown session" {
            let session = new_session("user-1", "Target");
            assert!(!db.save_session(&session, 0).unwrap());
        }
    }
}
