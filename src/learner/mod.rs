//! Between-round adaptation of per-topic weight vectors.
//!
//! Each topic's weight moves by `learning_rate × (reward − baseline) × frequency`,
//! where the baseline is the mean reward over the topic's last five rounds.
//! With probability `exploration_rate` a uniform nudge in `[-0.1, 0.1]` is added.
//! Weights are always clamped into the configured bounds.

mod advice;
mod explore;
mod window;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::{Finding, Severity, Topic, TopicWeights, WeightBounds};

pub use advice::{Recommendation, recommend};
pub use explore::AdaptiveExploration;
pub use window::{BASELINE_WINDOW, RewardWindow};

pub const REWARD_CRITICAL: f64 = 100.0;
pub const REWARD_HIGH: f64 = 50.0;
pub const REWARD_MEDIUM: f64 = 25.0;
pub const REWARD_LOW: f64 = 10.0;
pub const REWARD_FALSE_POSITIVE: f64 = -20.0;
pub const REWARD_UNIQUE_BONUS: f64 = 50.0;

/// Seed used when the configuration does not name one.
pub const DEFAULT_SEED: u64 = 0x3C6E_F372_FE94_F82B;

const EXPLORATION_SPAN: f64 = 0.2;
const REPORTED_CHANGE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearnerParams {
    pub learning_rate: f64,
    /// Carried for reporting; the single-step update does not discount.
    pub discount_factor: f64,
    pub exploration_rate: f64,
    pub bounds: WeightBounds,
}

impl Default for LearnerParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.15,
            discount_factor: 0.9,
            exploration_rate: 0.1,
            bounds: WeightBounds::default(),
        }
    }
}

/// A topic whose weight moved by more than 0.01 in one update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightChange {
    pub topic: String,
    pub old_weight: f64,
    pub new_weight: f64,
    pub reward: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adaptation {
    pub weights: TopicWeights,
    pub changes: Vec<WeightChange>,
    pub round_score: f64,
    pub false_positives: usize,
}

/// Exported learner state; persistence is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningSnapshot {
    pub params: LearnerParams,
    pub reward_history: BTreeMap<Topic, RewardWindow>,
}

/// Per-team weight adapter. Owns the team's reward history; never share one
/// between teams.
#[derive(Debug, Clone)]
pub struct WeightAdapter<R = StdRng> {
    params: LearnerParams,
    history: BTreeMap<Topic, RewardWindow>,
    rng: R,
}

impl WeightAdapter<StdRng> {
    /// Adapter whose exploration draws are reproducible for a given seed.
    pub fn with_seed(params: LearnerParams, seed: u64) -> Self {
        Self::new(params, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> WeightAdapter<R> {
    pub fn new(params: LearnerParams, rng: R) -> Self {
        Self {
            params,
            history: BTreeMap::new(),
            rng,
        }
    }

    pub fn params(&self) -> &LearnerParams {
        &self.params
    }

    pub fn set_exploration_rate(&mut self, rate: f64) {
        self.params.exploration_rate = rate.clamp(0.0, 1.0);
    }

    /// Rolling baseline reward for `topic`, 0 without history.
    pub fn baseline(&self, topic: &str) -> f64 {
        self.history.get(topic).map(RewardWindow::mean).unwrap_or(0.0)
    }

    pub fn update(
        &mut self,
        current: &TopicWeights,
        findings: &[Finding],
        round_score: f64,
        false_positive_count: usize,
    ) -> TopicWeights {
        self.update_with_changes(current, findings, round_score, false_positive_count)
            .weights
    }

    /// Same as [`WeightAdapter::update`] but also reports which topics moved and why.
    pub fn update_with_changes(
        &mut self,
        current: &TopicWeights,
        findings: &[Finding],
        round_score: f64,
        false_positive_count: usize,
    ) -> Adaptation {
        let rewards = topic_rewards(findings);
        let valid_total = findings.iter().filter(|f| !f.is_false_positive).count();

        let mut weights = current.clone();
        let mut changes = Vec::new();

        for (topic, old_weight) in current.iter() {
            let reward = rewards.get(topic.as_str()).copied().unwrap_or(0.0);
            let baseline = self.baseline(topic.as_str());
            let frequency = if valid_total == 0 {
                0.0
            } else {
                let hits = findings
                    .iter()
                    .filter(|f| !f.is_false_positive && f.topic == topic.as_str())
                    .count();
                hits as f64 / valid_total as f64
            };

            let mut delta = self.params.learning_rate * (reward - baseline) * frequency;
            if self.should_explore() {
                delta += (self.rng.r#gen::<f64>() - 0.5) * EXPLORATION_SPAN;
            }
            let new_weight = self.params.bounds.clamp(old_weight + delta);

            if (new_weight - old_weight).abs() > REPORTED_CHANGE {
                changes.push(WeightChange {
                    topic: topic.to_string(),
                    old_weight,
                    new_weight,
                    reward,
                    reason: change_reason(topic.as_str(), reward, baseline, frequency),
                });
            }

            weights.set(topic.clone(), new_weight);
            self.history.entry(topic.clone()).or_default().push(reward);
        }

        Adaptation {
            weights,
            changes,
            round_score,
            false_positives: false_positive_count,
        }
    }

    pub fn recommendations(&self, weights: &TopicWeights, score_history: &[f64]) -> Vec<Recommendation> {
        recommend(weights, score_history, |topic| self.baseline(topic))
    }

    pub fn snapshot(&self) -> LearningSnapshot {
        LearningSnapshot {
            params: self.params,
            reward_history: self.history.clone(),
        }
    }

    /// Replaces parameters and history with a previously exported snapshot.
    pub fn restore(&mut self, snapshot: LearningSnapshot) {
        self.params = snapshot.params;
        self.history = snapshot.reward_history;
    }

    fn should_explore(&mut self) -> bool {
        if self.params.exploration_rate <= 0.0 {
            return false;
        }
        self.rng.r#gen::<f64>() < self.params.exploration_rate
    }
}

/// Reward tier for a valid finding. Info and unrecognized severities share the low tier.
pub fn severity_reward(severity: Option<Severity>) -> f64 {
    match severity {
        Some(Severity::Critical) => REWARD_CRITICAL,
        Some(Severity::High) => REWARD_HIGH,
        Some(Severity::Medium) => REWARD_MEDIUM,
        _ => REWARD_LOW,
    }
}

/// Per-topic reward for one round's findings.
pub fn topic_rewards(findings: &[Finding]) -> BTreeMap<String, f64> {
    let mut rewards: BTreeMap<String, f64> = BTreeMap::new();
    for f in findings {
        let reward = if f.is_false_positive {
            REWARD_FALSE_POSITIVE
        } else if f.is_unique {
            severity_reward(f.severity) + REWARD_UNIQUE_BONUS
        } else {
            severity_reward(f.severity)
        };
        *rewards.entry(f.topic.clone()).or_default() += reward;
    }
    rewards
}

fn change_reason(topic: &str, reward: f64, baseline: f64, frequency: f64) -> String {
    if reward > baseline + 10.0 {
        format!("High success rate with {topic} (reward: {reward:.1})")
    } else if reward < baseline - 10.0 {
        format!("Poor performance with {topic} (reward: {reward:.1})")
    } else if frequency > 0.3 {
        format!("Frequent discoveries of {topic}")
    } else if frequency < 0.05 {
        format!("Rare discoveries of {topic}")
    } else {
        format!("Maintaining strategy for {topic}")
    }
}
