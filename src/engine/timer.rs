//! Virtual-time timers for a single study session.
//!
//! The host feeds elapsed wall time in; nothing here sleeps or spawns.
//! Every scheduled timer is owned by a [`TimerGuard`], and dropping the
//! guard removes the timer, so a timer can never outlive the state that
//! armed it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// One second of a per-card countdown.
    CountdownTick,
    /// Delay between an answer and the next card.
    Advance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub id: TimerId,
    pub kind: TimerKind,
    pub due_at: Duration,
}

// Keyed by (deadline, id) so iteration order is firing order
type TimerKey = (Duration, TimerId);

#[derive(Debug, Default)]
struct Registry {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<TimerKey, TimerKind>,
}

#[derive(Debug, Clone, Default)]
pub struct TimerWheel {
    registry: Rc<RefCell<Registry>>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.registry.borrow().now
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.registry.borrow().pending.len()
    }

    pub fn schedule(&self, after: Duration, kind: TimerKind) -> TimerGuard {
        let mut registry = self.registry.borrow_mut();
        let id = TimerId(registry.next_id);
        registry.next_id += 1;

        let key = (registry.now + after, id);
        registry.pending.insert(key, kind);

        TimerGuard {
            key,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Pops the earliest timer due at or before `until`, moving the clock to
    /// its deadline. Timers scheduled while handling it are measured from
    /// that deadline, so chained timers keep exact spacing.
    pub fn pop_due(&self, until: Duration) -> Option<FiredTimer> {
        let mut registry = self.registry.borrow_mut();
        let (&key, _) = registry.pending.iter().next()?;
        if key.0 > until {
            return None;
        }
        let kind = registry.pending.remove(&key)?;
        registry.now = registry.now.max(key.0);

        Some(FiredTimer {
            id: key.1,
            kind,
            due_at: key.0,
        })
    }

    /// Moves the clock forward without firing anything.
    pub fn settle(&self, until: Duration) {
        let mut registry = self.registry.borrow_mut();
        registry.now = registry.now.max(until);
    }
}

/// Scoped ownership of one pending timer. Dropping it cancels the timer.
#[derive(Debug)]
pub struct TimerGuard {
    key: TimerKey,
    registry: Weak<RefCell<Registry>>,
}

impl TimerGuard {
    pub fn id(&self) -> TimerId {
        self.key.1
    }

    #[cfg(test)]
    pub fn due_at(&self) -> Duration {
        self.key.0
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().pending.remove(&self.key);
        }
    }
}
