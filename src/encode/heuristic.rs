//! Cross-call quality bias.
//!
//! Consecutive captures of the same scene compress alike, so the quality
//! achieved by one call is a good starting point for the next. The state is
//! an explicit handle rather than a process global; clones share it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::FitTuning;

/// The last quality any `fit` call achieved.
///
/// Invariant: `q_min <= last_good_quality <= q_max` of the tuning it was
/// built and updated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicState {
    last_good_quality: u8,
}

impl HeuristicState {
    pub fn new(quality: u8, tuning: &FitTuning) -> Self {
        Self {
            last_good_quality: tuning.clamp_quality(quality),
        }
    }

    pub fn last_good_quality(&self) -> u8 {
        self.last_good_quality
    }

    pub fn record(&mut self, quality: u8, tuning: &FitTuning) {
        self.last_good_quality = tuning.clamp_quality(quality);
    }
}

impl Default for HeuristicState {
    fn default() -> Self {
        let tuning = FitTuning::default();
        Self::new(tuning.initial_quality, &tuning)
    }
}

/// Thread-safe handle to a `HeuristicState`.
///
/// The read at the start of a call and the write at its end each happen
/// under the lock; concurrent calls may interleave between the two, which
/// only affects the next call's starting point.
#[derive(Debug, Clone, Default)]
pub struct SharedHeuristic {
    inner: Arc<Mutex<HeuristicState>>,
}

impl SharedHeuristic {
    pub fn new(state: HeuristicState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Seeded with `tuning.initial_quality`.
    pub fn from_tuning(tuning: &FitTuning) -> Self {
        Self::new(HeuristicState::new(tuning.initial_quality, tuning))
    }

    /// Starting quality for the next call.
    pub fn bias(&self) -> u8 {
        self.inner.lock().last_good_quality()
    }

    pub fn record(&self, quality: u8, tuning: &FitTuning) {
        self.inner.lock().record(quality, tuning);
    }

    pub fn snapshot(&self) -> HeuristicState {
        *self.inner.lock()
    }

    /// Forget the learned bias. After an unreachable budget the state sits
    /// at `q_min`; a scene change is a good moment to call this.
    pub fn reset(&self, tuning: &FitTuning) {
        *self.inner.lock() = HeuristicState::new(tuning.initial_quality, tuning);
    }
}
