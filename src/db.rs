use chrono::{SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Result, Row};
use std::path::Path;

use crate::engine::{FlashcardStore, SessionStore};
use crate::error::PersistenceError;
use crate::models::{CardStatsUpdate, Flashcard, SessionCompletion, StudyMode, StudySession};

const CARD_COLUMNS: &str = "id, front_content, back_content, times_reviewed, times_correct, \
                            last_reviewed_at, difficulty_level, created_at";

const SESSION_COLUMNS: &str = "id, session_type, card_ids, total_cards, correct_answers, \
                               incorrect_answers, session_duration_seconds, created_at, completed_at";

pub struct Database {
    conn: Connection,
}

fn timestamp(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS flashcards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                front_content TEXT NOT NULL,
                back_content TEXT NOT NULL,
                times_reviewed INTEGER NOT NULL DEFAULT 0,
                times_correct INTEGER NOT NULL DEFAULT 0,
                last_reviewed_at TEXT,
                difficulty_level INTEGER,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS study_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_type TEXT NOT NULL CHECK(session_type IN ('recognition', 'forced_choice', 'timed_forced_choice')),
                card_ids TEXT NOT NULL,
                total_cards INTEGER NOT NULL,
                correct_answers INTEGER,
                incorrect_answers INTEGER,
                session_duration_seconds INTEGER,
                created_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_type ON study_sessions(session_type);
            CREATE INDEX IF NOT EXISTS idx_sessions_created ON study_sessions(created_at);
            "#,
        )?;

        Ok(())
    }

    // Flashcard operations
    pub fn add_card(&self, front: &str, back: &str, difficulty: Option<i32>) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO flashcards (front_content, back_content, difficulty_level, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![front, back, difficulty, timestamp(Utc::now())],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_card(&self, id: i64) -> Result<Option<Flashcard>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM flashcards WHERE id = ?1", CARD_COLUMNS))?;

        match stmt.query_row(params![id], card_from_row) {
            Ok(card) => Ok(Some(card)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn list_cards(&self) -> Result<Vec<Flashcard>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM flashcards ORDER BY id", CARD_COLUMNS))?;
        let rows = stmt.query_map([], card_from_row)?;
        rows.collect()
    }

    pub fn delete_card(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM flashcards WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Study session operations
    pub fn create_session(&self, mode: StudyMode, card_ids: &[i64]) -> Result<i64> {
        let encoded = serde_json::to_string(card_ids)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        self.conn.execute(
            r#"
            INSERT INTO study_sessions (session_type, card_ids, total_cards, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                mode.as_str(),
                encoded,
                card_ids.len() as i64,
                timestamp(Utc::now())
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_session(&self, session_id: i64) -> Result<Option<StudySession>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM study_sessions WHERE id = ?1",
            SESSION_COLUMNS
        ))?;

        match stmt.query_row(params![session_id], session_from_row) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn list_sessions(
        &self,
        mode: Option<StudyMode>,
        pending_only: bool,
    ) -> Result<Vec<StudySession>> {
        let mut query = format!("SELECT {} FROM study_sessions WHERE 1 = 1", SESSION_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(m) = mode {
            query.push_str(" AND session_type = ?1");
            params_vec.push(Box::new(m.as_str()));
        }
        if pending_only {
            query.push_str(" AND completed_at IS NULL");
        }
        query.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), session_from_row)?;
        rows.collect()
    }

    pub fn get_stats(&self) -> Result<Stats> {
        let total_cards: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM flashcards", [], |row| row.get(0))?;

        let (total_sessions, completed_sessions): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(completed_at) FROM study_sessions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let (correct_answers, incorrect_answers, total_study_seconds): (i64, i64, i64) =
            self.conn.query_row(
                r#"
                SELECT COALESCE(SUM(correct_answers), 0),
                       COALESCE(SUM(incorrect_answers), 0),
                       COALESCE(SUM(session_duration_seconds), 0)
                FROM study_sessions
                WHERE completed_at IS NOT NULL
                "#,
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        Ok(Stats {
            total_cards,
            total_sessions,
            completed_sessions,
            pending_sessions: total_sessions - completed_sessions,
            correct_answers,
            incorrect_answers,
            total_study_seconds,
        })
    }
}

impl FlashcardStore for Database {
    fn update_card_stats(
        &self,
        card_id: i64,
        update: &CardStatsUpdate,
    ) -> std::result::Result<(), PersistenceError> {
        let rows = self.conn.execute(
            r#"
            UPDATE flashcards
            SET times_reviewed = ?1,
                times_correct = ?2,
                last_reviewed_at = ?3
            WHERE id = ?4
            "#,
            params![
                update.times_reviewed,
                update.times_correct,
                timestamp(update.last_reviewed_at),
                card_id
            ],
        )?;

        if rows == 0 {
            return Err(PersistenceError::CardNotFound(card_id));
        }
        Ok(())
    }
}

impl SessionStore for Database {
    fn complete_session(
        &self,
        session_id: i64,
        completion: &SessionCompletion,
    ) -> std::result::Result<(), PersistenceError> {
        // A session is completed once; later attempts match no row
        let rows = self.conn.execute(
            r#"
            UPDATE study_sessions
            SET correct_answers = ?1,
                incorrect_answers = ?2,
                session_duration_seconds = ?3,
                completed_at = ?4
            WHERE id = ?5 AND completed_at IS NULL
            "#,
            params![
                completion.correct_answers,
                completion.incorrect_answers,
                completion.session_duration_seconds,
                timestamp(completion.completed_at),
                session_id
            ],
        )?;

        if rows == 0 {
            return Err(PersistenceError::AlreadyCompleted(session_id));
        }
        Ok(())
    }
}

fn card_from_row(row: &Row<'_>) -> Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        front_content: row.get(1)?,
        back_content: row.get(2)?,
        times_reviewed: row.get(3)?,
        times_correct: row.get(4)?,
        last_reviewed_at: row.get(5)?,
        difficulty_level: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn session_from_row(row: &Row<'_>) -> Result<StudySession> {
    let session_type_str: String = row.get(1)?;
    let session_type = StudyMode::from_str(&session_type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown session type '{}'", session_type_str).into(),
        )
    })?;

    let card_ids_str: String = row.get(2)?;
    let card_ids: Vec<i64> = serde_json::from_str(&card_ids_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(StudySession {
        id: row.get(0)?,
        session_type,
        card_ids,
        total_cards: row.get(3)?,
        correct_answers: row.get(4)?,
        incorrect_answers: row.get(5)?,
        session_duration_seconds: row.get(6)?,
        created_at: row.get(7)?,
        completed_at: row.get(8)?,
    })
}

#[derive(Debug, Clone)]
pub struct Stats {
    pub total_cards: i64,
    pub total_sessions: i64,
    pub completed_sessions: i64,
    pub pending_sessions: i64,
    pub correct_answers: i64,
    pub incorrect_answers: i64,
    pub total_study_seconds: i64,
}

impl Stats {
    pub fn accuracy(&self) -> f64 {
        let answered = self.correct_answers + self.incorrect_answers;
        if answered == 0 {
            0.0
        } else {
            (self.correct_answers as f64 / answered as f64) * 100.0
        }
    }
}
