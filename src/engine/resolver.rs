use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};

use crate::error::{DataMismatch, ResolutionError};
use crate::models::{Flashcard, StudyMode, StudySession};

/// A session supplied directly by the caller, bypassing stored lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplicitSession {
    pub session: StudySession,
    pub cards: Vec<Flashcard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Explicit,
    Stored,
}

/// A session paired with the cards it will actually run. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSession {
    session: StudySession,
    cards: Vec<Flashcard>,
    source: ResolutionSource,
}

impl ResolvedSession {
    #[cfg(test)]
    pub fn new(session: StudySession, cards: Vec<Flashcard>) -> Option<Self> {
        if cards.is_empty() {
            return None;
        }
        Some(Self {
            session,
            cards,
            source: ResolutionSource::Explicit,
        })
    }

    /// The mode the session was created for.
    pub fn mode(&self) -> StudyMode {
        self.session.session_type
    }

    pub fn session(&self) -> &StudySession {
        &self.session
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn source(&self) -> ResolutionSource {
        self.source
    }

    pub fn into_parts(self) -> (StudyMode, StudySession, Vec<Flashcard>) {
        (self.session.session_type, self.session, self.cards)
    }
}

pub struct SessionResolver<'a> {
    sessions: &'a [StudySession],
    card_pool: &'a [Flashcard],
}

impl<'a> SessionResolver<'a> {
    pub fn new(sessions: &'a [StudySession], card_pool: &'a [Flashcard]) -> Self {
        Self {
            sessions,
            card_pool,
        }
    }

    /// Picks the session to run.
    ///
    /// An explicit payload always wins, even when a matching stored
    /// session exists. Otherwise the newest unfinished stored session of
    /// `mode` whose cards are still available is used. Sessions whose
    /// cards have all disappeared are skipped with a warning.
    pub fn resolve(
        &self,
        mode: StudyMode,
        explicit: Option<ExplicitSession>,
    ) -> Result<ResolvedSession, ResolutionError> {
        if let Some(payload) = explicit {
            if payload.cards.is_empty() {
                return Err(ResolutionError::EmptyPayload);
            }
            if payload.session.session_type != mode {
                tracing::info!(
                    session_id = payload.session.id,
                    requested = mode.as_str(),
                    session_type = payload.session.session_type.as_str(),
                    "explicit session overrides requested mode"
                );
            }
            tracing::debug!(session_id = payload.session.id, "using explicit session");
            return Ok(ResolvedSession {
                session: payload.session,
                cards: payload.cards,
                source: ResolutionSource::Explicit,
            });
        }

        let by_id: HashMap<i64, &Flashcard> = self.card_pool.iter().map(|c| (c.id, c)).collect();

        for candidate in self.candidates(mode) {
            let cards: Vec<Flashcard> = candidate
                .card_ids
                .iter()
                .filter_map(|id| by_id.get(id).map(|c| (*c).clone()))
                .collect();

            if cards.is_empty() {
                let mismatch = DataMismatch {
                    session_id: candidate.id,
                    missing: candidate.card_ids.len(),
                };
                tracing::warn!(%mismatch, "skipping stored session");
                continue;
            }

            if cards.len() < candidate.card_ids.len() {
                tracing::debug!(
                    session_id = candidate.id,
                    requested = candidate.card_ids.len(),
                    available = cards.len(),
                    "running stored session with the cards still available"
                );
            }

            return Ok(ResolvedSession {
                session: candidate.clone(),
                cards,
                source: ResolutionSource::Stored,
            });
        }

        Err(ResolutionError::NoMatchingSession {
            mode: mode.as_str(),
        })
    }

    // Unfinished sessions of `mode`, newest first
    fn candidates(&self, mode: StudyMode) -> Vec<&'a StudySession> {
        let mut matching: Vec<&StudySession> = self
            .sessions
            .iter()
            .filter(|s| s.session_type == mode && s.completed_at.is_none())
            .collect();
        matching.sort_by_key(|s| std::cmp::Reverse((created_at(s), s.id)));
        matching
    }
}

// Unparseable timestamps sort as the oldest
fn created_at(session: &StudySession) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(&session.created_at).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: i64) -> Flashcard {
        Flashcard {
            id,
            front_content: format!("q{}", id),
            back_content: format!("a{}", id),
            times_reviewed: 0,
            times_correct: 0,
            last_reviewed_at: None,
            difficulty_level: None,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn session(id: i64, mode: StudyMode, card_ids: Vec<i64>, created_at: &str) -> StudySession {
        StudySession {
            id,
            session_type: mode,
            total_cards: card_ids.len() as i64,
            card_ids,
            correct_answers: None,
            incorrect_answers: None,
            session_duration_seconds: None,
            created_at: created_at.to_string(),
            completed_at: None,
        }
    }

    fn completed(mut s: StudySession) -> StudySession {
        s.correct_answers = Some(1);
        s.incorrect_answers = Some(0);
        s.session_duration_seconds = Some(10);
        s.completed_at = Some("2026-01-02T00:00:00+00:00".to_string());
        s
    }

    fn pool() -> Vec<Flashcard> {
        (1..=5).map(card).collect()
    }

    mod explicit_tests {
        use super::*;

        #[test]
        fn explicit_payload_wins_over_stored_session() {
            let stored = vec![session(1, StudyMode::ForcedChoice, vec![1, 2], "2026-03-01T00:00:00+00:00")];
            let cards = pool();
            let resolver = SessionResolver::new(&stored, &cards);

            let payload = ExplicitSession {
                session: session(50, StudyMode::ForcedChoice, vec![4, 5], "2026-01-01T00:00:00+00:00"),
                cards: vec![card(4), card(5)],
            };
            let resolved = resolver
                .resolve(StudyMode::ForcedChoice, Some(payload))
                .unwrap();

            assert_eq!(resolved.session().id, 50);
            assert_eq!(resolved.source(), ResolutionSource::Explicit);
            assert_eq!(resolved.cards().len(), 2);
        }

        #[test]
        fn explicit_payload_without_cards_fails() {
            let stored = vec![session(1, StudyMode::Recognition, vec![1], "2026-03-01T00:00:00+00:00")];
            let cards = pool();
            let resolver = SessionResolver::new(&stored, &cards);

            let payload = ExplicitSession {
                session: session(50, StudyMode::Recognition, vec![], "2026-01-01T00:00:00+00:00"),
                cards: vec![],
            };
            assert_eq!(
                resolver.resolve(StudyMode::Recognition, Some(payload)),
                Err(ResolutionError::EmptyPayload)
            );
        }

        #[test]
        fn explicit_payload_keeps_its_own_mode() {
            let cards = pool();
            let resolver = SessionResolver::new(&[], &cards);
            let payload = ExplicitSession {
                session: session(7, StudyMode::TimedForcedChoice, vec![1], "2026-01-01T00:00:00+00:00"),
                cards: vec![card(1)],
            };
            let resolved = resolver.resolve(StudyMode::ForcedChoice, Some(payload)).unwrap();
            assert_eq!(resolved.mode(), StudyMode::TimedForcedChoice);
        }
    }

    mod stored_tests {
        use super::*;

        #[test]
        fn picks_most_recent_matching_session() {
            let stored = vec![
                session(1, StudyMode::Recognition, vec![1], "2026-01-01T00:00:00+00:00"),
                session(2, StudyMode::Recognition, vec![2], "2026-02-01T00:00:00+00:00"),
                session(3, StudyMode::ForcedChoice, vec![3], "2026-03-01T00:00:00+00:00"),
            ];
            let cards = pool();
            let resolved = SessionResolver::new(&stored, &cards)
                .resolve(StudyMode::Recognition, None)
                .unwrap();

            assert_eq!(resolved.session().id, 2);
            assert_eq!(resolved.source(), ResolutionSource::Stored);
        }

        #[test]
        fn ignores_completed_sessions() {
            let stored = vec![
                session(1, StudyMode::Recognition, vec![1], "2026-01-01T00:00:00+00:00"),
                completed(session(2, StudyMode::Recognition, vec![2], "2026-02-01T00:00:00+00:00")),
            ];
            let cards = pool();
            let resolved = SessionResolver::new(&stored, &cards)
                .resolve(StudyMode::Recognition, None)
                .unwrap();
            assert_eq!(resolved.session().id, 1);
        }

        #[test]
        fn intersects_cards_in_session_order() {
            let stored = vec![session(
                1,
                StudyMode::ForcedChoice,
                vec![5, 99, 2, 4],
                "2026-01-01T00:00:00+00:00",
            )];
            let cards = pool();
            let resolved = SessionResolver::new(&stored, &cards)
                .resolve(StudyMode::ForcedChoice, None)
                .unwrap();

            let ids: Vec<i64> = resolved.cards().iter().map(|c| c.id).collect();
            assert_eq!(ids, vec![5, 2, 4]);
            assert_eq!(resolved.session().card_ids.len(), 4);
        }

        #[test]
        fn mismatched_session_falls_through_to_older_one() {
            let stored = vec![
                session(1, StudyMode::ForcedChoice, vec![1, 2], "2026-01-01T00:00:00+00:00"),
                session(2, StudyMode::ForcedChoice, vec![70, 80], "2026-02-01T00:00:00+00:00"),
            ];
            let cards = pool();
            let resolved = SessionResolver::new(&stored, &cards)
                .resolve(StudyMode::ForcedChoice, None)
                .unwrap();
            assert_eq!(resolved.session().id, 1);
        }

        #[test]
        fn only_mismatched_sessions_is_resolution_error() {
            let stored = vec![session(2, StudyMode::ForcedChoice, vec![70, 80], "2026-02-01T00:00:00+00:00")];
            let cards = pool();
            assert_eq!(
                SessionResolver::new(&stored, &cards).resolve(StudyMode::ForcedChoice, None),
                Err(ResolutionError::NoMatchingSession {
                    mode: "forced_choice"
                })
            );
        }

        #[test]
        fn no_sessions_of_mode_is_resolution_error() {
            let stored = vec![session(1, StudyMode::Recognition, vec![1], "2026-01-01T00:00:00+00:00")];
            let cards = pool();
            let result =
                SessionResolver::new(&stored, &cards).resolve(StudyMode::TimedForcedChoice, None);
            assert!(matches!(
                result,
                Err(ResolutionError::NoMatchingSession { .. })
            ));
        }

        #[test]
        fn empty_store_is_resolution_error() {
            let cards = pool();
            for mode in StudyMode::ALL {
                assert!(SessionResolver::new(&[], &cards).resolve(mode, None).is_err());
            }
        }

        #[test]
        fn compares_instants_across_offsets() {
            // 10:00+02:00 is 08:00 UTC, an hour before the other session
            let stored = vec![
                session(1, StudyMode::Recognition, vec![1], "2026-01-01T10:00:00+02:00"),
                session(2, StudyMode::Recognition, vec![2], "2026-01-01T09:00:00.5Z"),
            ];
            let cards = pool();
            let resolved = SessionResolver::new(&stored, &cards)
                .resolve(StudyMode::Recognition, None)
                .unwrap();
            assert_eq!(resolved.session().id, 2);
        }

        #[test]
        fn unparseable_timestamp_sorts_oldest() {
            let stored = vec![
                session(5, StudyMode::Recognition, vec![1], "not a date"),
                session(3, StudyMode::Recognition, vec![2], "2026-01-01T00:00:00Z"),
            ];
            let cards = pool();
            let resolved = SessionResolver::new(&stored, &cards)
                .resolve(StudyMode::Recognition, None)
                .unwrap();
            assert_eq!(resolved.session().id, 3);
        }

        #[test]
        fn same_timestamp_prefers_higher_id() {
            let stored = vec![
                session(4, StudyMode::Recognition, vec![1], "2026-01-01T00:00:00+00:00"),
                session(6, StudyMode::Recognition, vec![2], "2026-01-01T00:00:00+00:00"),
            ];
            let cards = pool();
            let resolved = SessionResolver::new(&stored, &cards)
                .resolve(StudyMode::Recognition, None)
                .unwrap();
            assert_eq!(resolved.session().id, 6);
        }
    }

    #[test]
    fn resolved_session_rejects_empty_cards() {
        let s = session(1, StudyMode::Recognition, vec![1], "2026-01-01T00:00:00+00:00");
        assert!(ResolvedSession::new(s.clone(), vec![]).is_none());
        assert!(ResolvedSession::new(s, vec![card(1)]).is_some());
    }
}
