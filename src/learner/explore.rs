use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Exploration rate that decays while scores keep moving and climbs back
/// when they flatten out or drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveExploration {
    current_rate: f64,
    min_rate: f64,
    decay_factor: f64,
    /// Last `PLATEAU_WINDOW` scores, oldest first.
    history: VecDeque<f64>,
}

const PLATEAU_WINDOW: usize = 5;
const PLATEAU_VARIANCE: f64 = 10.0;
const PLATEAU_CEILING: f64 = 0.3;
const DECLINE_CEILING: f64 = 0.4;

impl Default for AdaptiveExploration {
    fn default() -> Self {
        Self::new(0.3, 0.05, 0.95)
    }
}

impl AdaptiveExploration {
    pub fn new(initial_rate: f64, min_rate: f64, decay_factor: f64) -> Self {
        Self {
            current_rate: initial_rate,
            min_rate,
            decay_factor,
            history: VecDeque::with_capacity(PLATEAU_WINDOW),
        }
    }

    pub fn rate(&self) -> f64 {
        self.current_rate
    }

    /// Records the latest score and returns the adjusted rate.
    pub fn update(&mut self, performance: f64) -> f64 {
        if self.history.len() == PLATEAU_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(performance);
        if self.history.len() < PLATEAU_WINDOW {
            return self.current_rate;
        }

        let recent = self.history.make_contiguous();
        let (first, last) = (recent[0], recent[PLATEAU_WINDOW - 1]);
        if variance(recent) < PLATEAU_VARIANCE {
            self.current_rate = (self.current_rate * 1.1).min(PLATEAU_CEILING);
        } else if last < first {
            self.current_rate = (self.current_rate * 1.2).min(DECLINE_CEILING);
        } else {
            self.current_rate = (self.current_rate * self.decay_factor).max(self.min_rate);
        }
        self.current_rate
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}
