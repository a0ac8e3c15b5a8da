//! Per-card state machine shared by all three study modes.
//!
//! ```text
//! Presenting(i) --flip--> Revealed(i) --grade--> Answered(i)      (recognition)
//! Presenting(i) --select / countdown expiry-->   Answered(i)      (choice modes)
//! Answered(i)   --advance delay--> Presenting(i + 1) | Complete
//! ```
//!
//! The machine never sleeps. The host reports elapsed time through
//! [`SessionStateMachine::advance_clock`] and every pending timer is a
//! [`TimerGuard`] held by the machine, so leaving a state, calling
//! [`SessionStateMachine::abandon`] or dropping the machine cancels it.

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::distractor::{self, ChoiceSet};
use super::resolver::ResolvedSession;
use super::stats::StudyRecorder;
use super::timer::{FiredTimer, TimerGuard, TimerKind, TimerWheel};
use crate::models::{
    AnswerLog, AnswerRecord, Flashcard, Response, SessionSummary, StudyMode, StudySession,
};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Presenting { index: usize },
    Revealed { index: usize },
    Answered { index: usize, correct: bool },
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Turn the card over (recognition only).
    Flip,
    /// Self-reported recall after flipping (recognition only).
    Grade(bool),
    /// Pick an option by position (choice modes only).
    Select(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Ignored,
    Presenting { index: usize },
    Revealed { index: usize },
    Tick { index: usize, remaining: u32 },
    Answered {
        index: usize,
        correct: bool,
        response: Response,
    },
    Completed(SessionSummary),
}

pub struct SessionStateMachine<R> {
    mode: StudyMode,
    session: StudySession,
    cards: Vec<Flashcard>,
    phase: Phase,
    choices: Option<ChoiceSet>,
    remaining_ticks: Option<u32>,
    timer: Option<TimerGuard>,
    wheel: TimerWheel,
    log: AnswerLog,
    rng: StdRng,
    recorder: R,
    summary: Option<SessionSummary>,
    abandoned: bool,
}

impl<R: StudyRecorder> SessionStateMachine<R> {
    pub fn new(resolved: ResolvedSession, recorder: R) -> Self {
        Self::with_rng(resolved, recorder, StdRng::from_entropy())
    }

    pub fn with_rng(resolved: ResolvedSession, recorder: R, rng: StdRng) -> Self {
        let (mode, session, cards) = resolved.into_parts();
        let mut machine = Self {
            mode,
            session,
            cards,
            phase: Phase::Presenting { index: 0 },
            choices: None,
            remaining_ticks: None,
            timer: None,
            wheel: TimerWheel::new(),
            log: AnswerLog::new(),
            rng,
            recorder,
            summary: None,
            abandoned: false,
        };
        machine.enter_presenting(0);
        machine
    }

    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    pub fn session(&self) -> &StudySession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.phase {
            Phase::Presenting { index }
            | Phase::Revealed { index }
            | Phase::Answered { index, .. } => Some(index),
            Phase::Complete => None,
        }
    }

    pub fn current_card(&self) -> Option<&Flashcard> {
        self.current_index().and_then(|i| self.cards.get(i))
    }

    pub fn choices(&self) -> Option<&ChoiceSet> {
        self.choices.as_ref()
    }

    pub fn remaining_ticks(&self) -> Option<u32> {
        self.remaining_ticks
    }

    pub fn log(&self) -> &AnswerLog {
        &self.log
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    #[cfg(test)]
    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    #[cfg(test)]
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    #[cfg(test)]
    pub fn pending_timers(&self) -> usize {
        self.wheel.pending_count()
    }

    pub fn handle(&mut self, input: Input) -> Step {
        if self.abandoned {
            return Step::Ignored;
        }

        match (input, self.phase) {
            (Input::Flip, Phase::Presenting { index }) => match self.mode() {
                StudyMode::Recognition => {
                    self.phase = Phase::Revealed { index };
                    Step::Revealed { index }
                }
                StudyMode::ForcedChoice | StudyMode::TimedForcedChoice => Step::Ignored,
            },
            (Input::Grade(correct), Phase::Revealed { index }) => {
                self.answer(index, correct, Response::SelfGraded)
            }
            (Input::Select(choice), Phase::Presenting { index }) => {
                let correct = match (self.mode(), &self.choices) {
                    (StudyMode::Recognition, _) => return Step::Ignored,
                    (_, Some(set)) if choice < set.len() => set.is_correct(choice),
                    _ => return Step::Ignored,
                };
                self.answer(index, correct, Response::Chose(choice))
            }
            _ => Step::Ignored,
        }
    }

    /// Moves session time forward and runs every timer that comes due,
    /// in deadline order.
    pub fn advance_clock(&mut self, elapsed: Duration) -> Vec<Step> {
        let target = self.wheel.now() + elapsed;
        let mut steps = Vec::new();

        while !self.abandoned {
            let Some(fired) = self.wheel.pop_due(target) else {
                break;
            };
            let step = self.on_timer(fired);
            if step != Step::Ignored {
                steps.push(step);
            }
        }

        self.wheel.settle(target);
        steps
    }

    /// Stops the session where it is. Pending timers are released and
    /// every later input or clock advance is ignored.
    pub fn abandon(&mut self) {
        if self.abandoned || self.is_complete() {
            return;
        }
        self.timer = None;
        self.abandoned = true;
        tracing::debug!(
            session_id = self.session.id,
            answered = self.log.len(),
            "study session abandoned"
        );
    }

    fn on_timer(&mut self, fired: FiredTimer) -> Step {
        // Only the timer we currently hold may drive a transition
        if self.timer.as_ref().map(TimerGuard::id) != Some(fired.id) {
            return Step::Ignored;
        }
        self.timer = None;

        match (fired.kind, self.phase) {
            (TimerKind::CountdownTick, Phase::Presenting { index }) => {
                let remaining = self.remaining_ticks.unwrap_or(0).saturating_sub(1);
                self.remaining_ticks = Some(remaining);
                if remaining == 0 {
                    tracing::debug!(
                        session_id = self.session.id,
                        index,
                        at = ?fired.due_at,
                        "card timed out"
                    );
                    self.answer(index, false, Response::TimedOut)
                } else {
                    self.timer = Some(self.wheel.schedule(TICK, TimerKind::CountdownTick));
                    Step::Tick { index, remaining }
                }
            }
            (TimerKind::Advance, Phase::Answered { index, .. }) => {
                let next = index + 1;
                if next >= self.cards.len() {
                    self.complete()
                } else {
                    self.enter_presenting(next);
                    Step::Presenting { index: next }
                }
            }
            _ => Step::Ignored,
        }
    }

    fn enter_presenting(&mut self, index: usize) {
        let mode = self.mode();
        self.phase = Phase::Presenting { index };

        self.choices = if mode.uses_choices() {
            Some(distractor::generate(
                &self.cards[index],
                &self.cards,
                &mut self.rng,
            ))
        } else {
            None
        };

        self.remaining_ticks = mode.countdown_ticks();
        self.timer = self
            .remaining_ticks
            .map(|_| self.wheel.schedule(TICK, TimerKind::CountdownTick));
    }

    fn answer(&mut self, index: usize, correct: bool, response: Response) -> Step {
        // Cancels any running countdown
        self.timer = None;

        let card_id = self.cards[index].id;
        self.log.append(AnswerRecord {
            card_id,
            is_correct: correct,
            response,
            answered_at: Utc::now(),
        });
        self.recorder.record_answer(card_id, correct);

        self.phase = Phase::Answered { index, correct };
        self.timer = Some(
            self.wheel
                .schedule(self.mode().advance_delay(), TimerKind::Advance),
        );

        Step::Answered {
            index,
            correct,
            response,
        }
    }

    fn complete(&mut self) -> Step {
        self.phase = Phase::Complete;
        self.timer = None;
        self.choices = None;
        self.remaining_ticks = None;

        let summary = match &self.summary {
            Some(summary) => summary.clone(),
            None => {
                let summary = self.recorder.finalize_session(&self.session, &self.log);
                self.summary = Some(summary.clone());
                summary
            }
        };
        Step::Completed(summary)
    }
}
