use thiserror::Error;

/// Unknown mode identifier. Raised before any session lookup happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported study mode '{identifier}'. Use: recognition, forced_choice, or timed_forced_choice")]
pub struct ModeError {
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("The provided session has no cards to study")]
    EmptyPayload,

    #[error("No unfinished {mode} session with available cards was found")]
    NoMatchingSession { mode: &'static str },
}

// A stored session whose card ids no longer match any known card
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Session {session_id} references {missing} card(s), none of which are available")]
pub struct DataMismatch {
    pub session_id: i64,
    pub missing: usize,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Card {0} not found")]
    CardNotFound(i64),

    #[error("Session {0} not found or already completed")]
    AlreadyCompleted(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}
