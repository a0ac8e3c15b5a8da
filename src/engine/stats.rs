use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::PersistenceError;
use crate::models::{
    AnswerLog, CardStatsUpdate, Flashcard, SessionCompletion, SessionSummary, StudySession,
};

pub trait FlashcardStore {
    fn update_card_stats(
        &self,
        card_id: i64,
        update: &CardStatsUpdate,
    ) -> Result<(), PersistenceError>;
}

pub trait SessionStore {
    fn complete_session(
        &self,
        session_id: i64,
        completion: &SessionCompletion,
    ) -> Result<(), PersistenceError>;
}

impl<T: FlashcardStore + ?Sized> FlashcardStore for &T {
    fn update_card_stats(
        &self,
        card_id: i64,
        update: &CardStatsUpdate,
    ) -> Result<(), PersistenceError> {
        (**self).update_card_stats(card_id, update)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn complete_session(
        &self,
        session_id: i64,
        completion: &SessionCompletion,
    ) -> Result<(), PersistenceError> {
        (**self).complete_session(session_id, completion)
    }
}

/// Side effects of a running session, kept apart from the state machine so
/// the machine can be driven against a recording fake.
pub trait StudyRecorder {
    fn record_answer(&mut self, card_id: i64, is_correct: bool);

    fn finalize_session(&mut self, session: &StudySession, log: &AnswerLog) -> SessionSummary;
}

#[derive(Debug, Clone, Copy)]
struct CardCounters {
    times_reviewed: i64,
    times_correct: i64,
}

pub struct StatisticsAggregator<S> {
    store: S,
    counters: HashMap<i64, CardCounters>,
    started_at: DateTime<Utc>,
}

impl<S> StatisticsAggregator<S>
where
    S: FlashcardStore + SessionStore,
{
    pub fn new(store: S, cards: &[Flashcard]) -> Self {
        Self::with_start(store, cards, Utc::now())
    }

    pub fn with_start(store: S, cards: &[Flashcard], started_at: DateTime<Utc>) -> Self {
        let counters = cards
            .iter()
            .map(|c| {
                (
                    c.id,
                    CardCounters {
                        times_reviewed: c.times_reviewed,
                        times_correct: c.times_correct,
                    },
                )
            })
            .collect();

        Self {
            store,
            counters,
            started_at,
        }
    }

    pub fn record_answer_at(&mut self, card_id: i64, is_correct: bool, now: DateTime<Utc>) {
        let Some(counters) = self.counters.get_mut(&card_id) else {
            tracing::warn!(card_id, "answer recorded for a card outside this session");
            return;
        };

        counters.times_reviewed += 1;
        if is_correct {
            counters.times_correct += 1;
        }

        let update = CardStatsUpdate {
            times_reviewed: counters.times_reviewed,
            times_correct: counters.times_correct,
            last_reviewed_at: now,
        };

        // The session keeps going whether or not the write lands
        if let Err(error) = self.store.update_card_stats(card_id, &update) {
            tracing::warn!(card_id, %error, "failed to persist card statistics");
        }
    }

    pub fn finalize_session_at(
        &mut self,
        session: &StudySession,
        log: &AnswerLog,
        now: DateTime<Utc>,
    ) -> SessionSummary {
        let correct_answers = log.correct_count() as i64;
        let incorrect_answers = log.len() as i64 - correct_answers;
        let duration_seconds = now.signed_duration_since(self.started_at).num_seconds().max(0);

        let completion = SessionCompletion {
            correct_answers,
            incorrect_answers,
            session_duration_seconds: duration_seconds,
            completed_at: now,
        };

        match self.store.complete_session(session.id, &completion) {
            Ok(()) => tracing::info!(
                session_id = session.id,
                correct_answers,
                incorrect_answers,
                duration_seconds,
                "study session completed"
            ),
            Err(error) => tracing::warn!(
                session_id = session.id,
                %error,
                "failed to persist session completion"
            ),
        }

        SessionSummary {
            session_id: session.id,
            mode: session.session_type,
            correct_answers,
            incorrect_answers,
            duration_seconds,
        }
    }
}

impl<S> StudyRecorder for StatisticsAggregator<S>
where
    S: FlashcardStore + SessionStore,
{
    fn record_answer(&mut self, card_id: i64, is_correct: bool) {
        self.record_answer_at(card_id, is_correct, Utc::now());
    }

    fn finalize_session(&mut self, session: &StudySession, log: &AnswerLog) -> SessionSummary {
        self.finalize_session_at(session, log, Utc::now())
    }
}
