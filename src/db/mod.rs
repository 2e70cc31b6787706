mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::*;

/// Persistence boundary for diagnostic sessions.
///
/// The diagnostic service only talks to storage through this trait, so any
/// key-value or document store can stand behind it.
pub trait SessionStore: Send + Sync {
    /// Insert a new session and return its id.
    fn create_session(&self, session: &PlaySession) -> Result<Uuid>;

    fn get_session(&self, id: Uuid) -> Result<Option<PlaySession>>;

    /// All sessions owned by `user_id`, oldest first.
    fn get_sessions_by_user(&self, user_id: &str) -> Result<Vec<PlaySession>>;

    /// Write back a mutated session.
    ///
    /// The write only applies if the stored `current_index` still equals
    /// `expected_index`. Returns `false` when another writer got there first,
    /// in which case nothing is changed.
    fn save_session(&self, session: &PlaySession, expected_index: usize) -> Result<bool>;
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "prereq-playground")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("playground.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }
}

impl SessionStore for Database {
    fn create_session(&self, session: &PlaySession) -> Result<Uuid> {
        let conn = self.conn.lock().expect("database lock poisoned");

        conn.execute(
            "INSERT INTO play_sessions (id, user_id, target_concept, prerequisites, question_queue,
                answered_questions, weak_concepts, current_index, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                session.id.to_string(),
                &session.user_id,
                &session.target_concept,
                serde_json::to_string(&session.prerequisites)?,
                serde_json::to_string(&session.question_queue)?,
                serde_json::to_string(&session.answered_questions)?,
                serde_json::to_string(&session.weak_concepts)?,
                session.current_index as i64,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ),
        )?;

        Ok(session.id)
    }

    fn get_session(&self, id: Uuid) -> Result<Option<PlaySession>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, target_concept, prerequisites, question_queue,
                    answered_questions, weak_concepts, current_index, created_at, updated_at
             FROM play_sessions WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(session_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn get_sessions_by_user(&self, user_id: &str) -> Result<Vec<PlaySession>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, target_concept, prerequisites, question_queue,
                    answered_questions, weak_concepts, current_index, created_at, updated_at
             FROM play_sessions WHERE user_id = ? ORDER BY created_at, rowid",
        )?;

        let mut rows = stmt.query([user_id])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(session_from_row(row)?);
        }

        Ok(sessions)
    }

    fn save_session(&self, session: &PlaySession, expected_index: usize) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let rows = conn.execute(
            "UPDATE play_sessions
             SET answered_questions = ?, weak_concepts = ?, current_index = ?, updated_at = ?
             WHERE id = ? AND current_index = ?",
            (
                serde_json::to_string(&session.answered_questions)?,
                serde_json::to_string(&session.weak_concepts)?,
                session.current_index as i64,
                session.updated_at.to_rfc3339(),
                session.id.to_string(),
                expected_index as i64,
            ),
        )?;

        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn session_from_row(row: &Row<'_>) -> Result<PlaySession> {
    Ok(PlaySession {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: row.get(1)?,
        target_concept: row.get(2)?,
        prerequisites: serde_json::from_str(&row.get::<_, String>(3)?)?,
        question_queue: serde_json::from_str(&row.get::<_, String>(4)?)?,
        answered_questions: serde_json::from_str(&row.get::<_, String>(5)?)?,
        weak_concepts: serde_json::from_str(&row.get::<_, String>(6)?)?,
        current_index: row.get::<_, i64>(7)?.max(0) as usize,
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
