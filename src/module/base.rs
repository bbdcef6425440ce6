//! Shared state for module implementations.
//!
//! [`ModuleBase`] carries the identity, score, and operation counters every
//! module needs. Custom modules embed one and delegate their
//! [`Module`](crate::module::Module) methods to it; the counter
//! choreography is: `incr_called` unconditionally on entry, `incr_accepted`
//! once parameters validate, `incr_completed` on a clean exit, and an
//! [`InFlightGuard`] held for the duration of the accepted call so the
//! in-flight count drops on every exit path, panics included.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::module::mid::Mid;
use crate::module::ModuleSummary;

/// One-shot snapshot of a module's counters.
///
/// Invariant: `completed <= accepted <= called`, `in_flight >= 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub called: u64,
    pub accepted: u64,
    pub completed: u64,
    pub in_flight: u64,
}

/// Pure function from counters to a load score; lower scores are selected
/// first by the registrar.
pub type CalculateScore = fn(Counts) -> u64;

/// Default score: weights in-flight work heaviest, then the backlog of
/// calls that have not completed, then raw call volume.
pub fn default_score(counts: Counts) -> u64 {
    counts.called + (counts.called.saturating_sub(counts.completed) << 1)
        + (counts.in_flight << 4)
}

/// Identity, score, and counters shared by all module implementations.
#[derive(Debug)]
pub struct ModuleBase {
    mid: Mid,
    score: AtomicU64,
    calculator: CalculateScore,
    called: AtomicU64,
    accepted: AtomicU64,
    completed: AtomicU64,
    in_flight: AtomicU64,
}

impl ModuleBase {
    /// Creates the base for `mid`. Modules without a custom calculator get
    /// [`default_score`].
    pub fn new(mid: Mid, calculator: Option<CalculateScore>) -> Self {
        ModuleBase {
            mid,
            score: AtomicU64::new(0),
            calculator: calculator.unwrap_or(default_score),
            called: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
        }
    }

    pub fn mid(&self) -> &Mid {
        &self.mid
    }

    /// The module's network address as a string, empty when unset.
    pub fn addr(&self) -> String {
        self.mid
            .addr()
            .map(|a| a.to_string())
            .unwrap_or_default()
    }

    pub fn score(&self) -> u64 {
        self.score.load(Ordering::Acquire)
    }

    pub fn set_score(&self, score: u64) {
        self.score.store(score, Ordering::Release);
    }

    pub fn score_calculator(&self) -> CalculateScore {
        self.calculator
    }

    pub fn incr_called(&self) {
        self.called.fetch_add(1, Ordering::AcqRel);
    }

    pub fn incr_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::AcqRel);
    }

    pub fn incr_completed(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    /// Marks one call in flight for the guard's lifetime.
    pub fn in_flight_guard(&self) -> InFlightGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard { base: self }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            called: self.called.load(Ordering::Acquire),
            accepted: self.accepted.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }

    pub fn summary(&self) -> ModuleSummary {
        let counts = self.counts();
        ModuleSummary {
            id: self.mid.to_string(),
            called: counts.called,
            accepted: counts.accepted,
            completed: counts.completed,
            in_flight: counts.in_flight,
            extra: None,
        }
    }

    /// Zeroes all counters.
    pub fn clear(&self) {
        self.called.store(0, Ordering::Release);
        self.accepted.store(0, Ordering::Release);
        self.completed.store(0, Ordering::Release);
        self.in_flight.store(0, Ordering::Release);
    }
}

/// Decrements the in-flight count when dropped, guaranteeing the count
/// reaches zero even on panic paths.
pub struct InFlightGuard<'a> {
    base: &'a ModuleBase,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.base.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
