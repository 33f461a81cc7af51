use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Rounds of reward history kept per topic for the baseline.
pub const BASELINE_WINDOW: usize = 5;

/// Fixed-capacity ring of the most recent per-round rewards for one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct RewardWindow {
    values: VecDeque<f64>,
}

impl RewardWindow {
    pub fn push(&mut self, reward: f64) {
        if self.values.len() == BASELINE_WINDOW {
            self.values.pop_front();
        }
        self.values.push_back(reward);
    }

    /// Mean of the retained rewards, 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

impl From<Vec<f64>> for RewardWindow {
    fn from(values: Vec<f64>) -> Self {
        let mut window = RewardWindow::default();
        for v in values {
            window.push(v);
        }
        window
    }
}

impl From<RewardWindow> for Vec<f64> {
    fn from(window: RewardWindow) -> Self {
        window.values.into_iter().collect()
    }
}
