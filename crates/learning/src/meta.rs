//! Performance-window strategy adjustment (spec §4.3 "MetaLearner").

use std::collections::VecDeque;

use parking_lot::Mutex;

const WINDOW: usize = 50;
const MIN_OBSERVATIONS: usize = 5;

/// Suggested hyperparameter adjustment for the `ReinforcementLearner`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strategy {
    /// Suggested learning rate.
    pub alpha: f64,
    /// Suggested exploration probability.
    pub epsilon: f64,
}

/// Tracks a rolling window of recent outcomes and emits strategy suggestions.
#[derive(Default)]
pub struct MetaLearner {
    window: Mutex<VecDeque<bool>>,
}

impl MetaLearner {
    /// Builds an empty learner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outcome, dropping the oldest once the window exceeds 50.
    pub fn record(&self, success: bool) {
        let mut window = self.window.lock();
        window.push_back(success);
        if window.len() > WINDOW {
            window.pop_front();
        }
    }

    /// Suggests a strategy once at least 5 observations are present.
    #[must_use]
    pub fn strategy(&self) -> Option<Strategy> {
        let window = self.window.lock();
        if window.len() < MIN_OBSERVATIONS {
            return None;
        }
        let successes = window.iter().filter(|s| **s).count();
        let mean = successes as f64 / window.len() as f64;
        Some(if mean < 0.6 {
            Strategy { alpha: 0.15, epsilon: 0.20 }
        } else if mean > 0.8 {
            Strategy { alpha: 0.05, epsilon: 0.05 }
        } else {
            Strategy { alpha: 0.10, epsilon: 0.10 }
        })
    }

    /// Exports the rolling window for self-persistence (spec §4.5 "save").
    #[must_use]
    pub fn export(&self) -> VecDeque<bool> {
        self.window.lock().clone()
    }

    /// Restores a previously exported window.
    pub fn import(&self, window: VecDeque<bool>) {
        *self.window.lock() = window;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewer_than_five_observations_yields_no_strategy() {
        let learner = MetaLearner::new();
        for _ in 0..4 {
            learner.record(true);
        }
        assert!(learner.strategy().is_none());
    }

    #[test]
    fn low_mean_success_widens_exploration() {
        let learner = MetaLearner::new();
        for _ in 0..5 {
            learner.record(false);
        }
        assert_eq!(learner.strategy(), Some(Strategy { alpha: 0.15, epsilon: 0.20 }));
    }

    #[test]
    fn high_mean_success_narrows_exploration() {
        let learner = MetaLearner::new();
        for _ in 0..5 {
            learner.record(true);
        }
        assert_eq!(learner.strategy(), Some(Strategy { alpha: 0.05, epsilon: 0.05 }));
    }

    #[test]
    fn window_is_bounded_at_fifty() {
        let learner = MetaLearner::new();
        for _ in 0..60 {
            learner.record(true);
        }
        assert_eq!(learner.window.lock().len(), 50);
    }
}
