use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: i64,
    pub front_content: String,
    pub back_content: String,
    pub times_reviewed: i64,
    pub times_correct: i64,
    pub last_reviewed_at: Option<String>,
    pub difficulty_level: Option<i32>,
    pub created_at: String,
}

impl Flashcard {
    pub fn success_rate(&self) -> f64 {
        if self.times_reviewed == 0 {
            0.0
        } else {
            (self.times_correct as f64 / self.times_reviewed as f64) * 100.0
        }
    }
}

// The three ways a session can be run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    Recognition,
    ForcedChoice,
    TimedForcedChoice,
}

impl StudyMode {
    #[cfg(test)]
    pub const ALL: [StudyMode; 3] = [
        StudyMode::Recognition,
        StudyMode::ForcedChoice,
        StudyMode::TimedForcedChoice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudyMode::Recognition => "recognition",
            StudyMode::ForcedChoice => "forced_choice",
            StudyMode::TimedForcedChoice => "timed_forced_choice",
        }
    }

    /// Only the canonical identifiers are accepted.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "recognition" => Some(StudyMode::Recognition),
            "forced_choice" => Some(StudyMode::ForcedChoice),
            "timed_forced_choice" => Some(StudyMode::TimedForcedChoice),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StudyMode::Recognition => "Recognition",
            StudyMode::ForcedChoice => "Multiple Choice",
            StudyMode::TimedForcedChoice => "Timed Challenge",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StudyMode::Recognition => "Flip each card and grade your own recall",
            StudyMode::ForcedChoice => "Pick the right answer out of four",
            StudyMode::TimedForcedChoice => "Pick the right answer before the clock runs out",
        }
    }

    /// Pause between a finalized answer and the next card.
    pub fn advance_delay(&self) -> Duration {
        match self {
            StudyMode::Recognition => Duration::from_millis(500),
            StudyMode::ForcedChoice => Duration::from_millis(1500),
            // Longer so the revealed answer can be read
            StudyMode::TimedForcedChoice => Duration::from_millis(2000),
        }
    }

    /// Number of one-second ticks a card may stay unanswered.
    pub fn countdown_ticks(&self) -> Option<u32> {
        match self {
            StudyMode::Recognition | StudyMode::ForcedChoice => None,
            StudyMode::TimedForcedChoice => Some(30),
        }
    }

    pub fn uses_choices(&self) -> bool {
        match self {
            StudyMode::Recognition => false,
            StudyMode::ForcedChoice | StudyMode::TimedForcedChoice => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: i64,
    pub session_type: StudyMode,
    pub card_ids: Vec<i64>,
    pub total_cards: i64,
    pub correct_answers: Option<i64>,
    pub incorrect_answers: Option<i64>,
    pub session_duration_seconds: Option<i64>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl StudySession {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn accuracy(&self) -> Option<f64> {
        let correct = self.correct_answers?;
        let incorrect = self.incorrect_answers?;
        let answered = correct + incorrect;
        if answered == 0 {
            Some(0.0)
        } else {
            Some((correct as f64 / answered as f64) * 100.0)
        }
    }
}

// How an answer was given. TimedOut is the sentinel for an expired countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    SelfGraded,
    Chose(usize),
    TimedOut,
}

impl Response {
    pub fn selected_option(&self) -> Option<usize> {
        match self {
            Response::Chose(index) => Some(*index),
            Response::SelfGraded | Response::TimedOut => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub card_id: i64,
    pub is_correct: bool,
    pub response: Response,
    pub answered_at: DateTime<Utc>,
}

/// Ordered, append-only record of the answers given in one session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnswerLog {
    records: Vec<AnswerRecord>,
}

impl AnswerLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: AnswerRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&AnswerRecord> {
        self.records.last()
    }

    /// Latest answer recorded for a card.
    #[cfg(test)]
    pub fn for_card(&self, card_id: i64) -> Option<&AnswerRecord> {
        self.records.iter().rev().find(|r| r.card_id == card_id)
    }

    pub fn correct_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_correct).count()
    }

    #[cfg(test)]
    pub fn incorrect_count(&self) -> usize {
        self.len() - self.correct_count()
    }
}

// Absolute counter values written back to the flashcard store
#[derive(Debug, Clone, PartialEq)]
pub struct CardStatsUpdate {
    pub times_reviewed: i64,
    pub times_correct: i64,
    pub last_reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    pub correct_answers: i64,
    pub incorrect_answers: i64,
    pub session_duration_seconds: i64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: i64,
    pub mode: StudyMode,
    pub correct_answers: i64,
    pub incorrect_answers: i64,
    pub duration_seconds: i64,
}

impl SessionSummary {
    pub fn answered(&self) -> i64 {
        self.correct_answers + self.incorrect_answers
    }

    pub fn accuracy(&self) -> f64 {
        if self.answered() == 0 {
            0.0
        } else {
            (self.correct_answers as f64 / self.answered() as f64) * 100.0
        }
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
