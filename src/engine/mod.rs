//! Study session engine: resolves which session to run, drives it card by
//! card in one of the three study modes, and records the results.

pub mod distractor;
pub mod machine;
pub mod resolver;
pub mod router;
pub mod stats;
pub mod timer;

pub use machine::{Input, Phase, SessionStateMachine};
pub use resolver::ExplicitSession;
pub use router::{ModeRouter, StudyHost};
pub use stats::{FlashcardStore, SessionStore, StatisticsAggregator};
