use std::time::Duration;

use super::machine::{Input, SessionStateMachine, Step};
use super::resolver::{ExplicitSession, ResolvedSession, SessionResolver};
use super::stats::StudyRecorder;
use crate::error::{EngineError, ModeError};
use crate::models::{Flashcard, SessionSummary, StudyMode, StudySession};

/// The page that launched a session and gets control back when it ends.
pub trait StudyHost {
    fn on_complete(&mut self, summary: &SessionSummary);

    fn on_resolution_error(&mut self, message: &str);

    fn on_unsupported_mode(&mut self, message: &str);
}

pub fn parse_mode(identifier: &str) -> Result<StudyMode, ModeError> {
    StudyMode::from_str(identifier).ok_or_else(|| ModeError {
        identifier: identifier.to_string(),
    })
}

pub struct ModeRouter<H> {
    host: H,
    completed: bool,
}

impl<H: StudyHost> ModeRouter<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            completed: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    #[cfg(test)]
    pub fn into_host(self) -> H {
        self.host
    }

    /// Parses the mode, resolves the session and builds its state machine.
    ///
    /// Failures are reported to the host before being returned; the
    /// recorder is only built once a session has been resolved.
    pub fn launch<R, F>(
        &mut self,
        mode_id: &str,
        explicit: Option<ExplicitSession>,
        sessions: &[StudySession],
        card_pool: &[Flashcard],
        make_recorder: F,
    ) -> Result<SessionStateMachine<R>, EngineError>
    where
        R: StudyRecorder,
        F: FnOnce(&ResolvedSession) -> R,
    {
        let mode = match parse_mode(mode_id) {
            Ok(mode) => mode,
            Err(error) => {
                tracing::error!(%error, "rejected study request");
                self.host.on_unsupported_mode(&error.to_string());
                return Err(error.into());
            }
        };

        let resolved = match SessionResolver::new(sessions, card_pool).resolve(mode, explicit) {
            Ok(resolved) => resolved,
            Err(error) => {
                tracing::warn!(%error, mode = mode.as_str(), "no session to study");
                self.host.on_resolution_error(&error.to_string());
                return Err(error.into());
            }
        };

        tracing::info!(
            session_id = resolved.session().id,
            mode = resolved.mode().as_str(),
            cards = resolved.cards().len(),
            source = ?resolved.source(),
            "starting study session"
        );

        self.completed = false;
        let recorder = make_recorder(&resolved);
        Ok(SessionStateMachine::new(resolved, recorder))
    }

    pub fn dispatch<R: StudyRecorder>(
        &mut self,
        machine: &mut SessionStateMachine<R>,
        input: Input,
    ) -> Step {
        let step = machine.handle(input);
        self.forward(std::slice::from_ref(&step));
        step
    }

    pub fn advance_clock<R: StudyRecorder>(
        &mut self,
        machine: &mut SessionStateMachine<R>,
        elapsed: Duration,
    ) -> Vec<Step> {
        let steps = machine.advance_clock(elapsed);
        self.forward(&steps);
        steps
    }

    /// Hands a completion to the host, once per launched session.
    pub fn forward(&mut self, steps: &[Step]) {
        for step in steps {
            if let Step::Completed(summary) = step {
                if !self.completed {
                    self.completed = true;
                    self.host.on_complete(summary);
                }
            }
        }
    }
}
