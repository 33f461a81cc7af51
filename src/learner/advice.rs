use std::fmt;

use serde::Serialize;

use crate::core::TopicWeights;

const RECENT_ROUNDS: usize = 3;
const DECLINE_RATIO: f64 = 0.8;
const IMPROVE_RATIO: f64 = 1.2;
const CONCENTRATION_SHARE: f64 = 0.7;
const NEGLECTED_WEIGHT: f64 = 0.3;
const HIGH_BASELINE: f64 = 50.0;
const LISTED_TOPICS: usize = 3;

/// Advisory note about a team's weight vector and score history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    PerformanceDeclining,
    PerformanceImproving,
    Concentrated { topics: Vec<String> },
    Neglected { topics: Vec<String> },
    HighPerforming { topics: Vec<String> },
    Adequate,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::PerformanceDeclining => {
                f.write_str("Performance declining - consider diversifying topic focus")
            }
            Recommendation::PerformanceImproving => {
                f.write_str("Performance improving - continue current strategy direction")
            }
            Recommendation::Concentrated { topics } => write!(
                f,
                "Heavily focused on: {}. Consider broadening coverage.",
                topics.join(", ")
            ),
            Recommendation::Neglected { topics } => write!(
                f,
                "Low coverage areas: {}. These might have untapped potential.",
                topics.join(", ")
            ),
            Recommendation::HighPerforming { topics } => write!(
                f,
                "High success areas: {}. Consider increasing focus here.",
                topics.join(", ")
            ),
            Recommendation::Adequate => {
                f.write_str("Strategy performing adequately - continue current approach")
            }
        }
    }
}

/// Builds at most one note per category, or a single [`Recommendation::Adequate`].
/// `baseline` returns the rolling reward baseline for a topic.
pub fn recommend<F>(weights: &TopicWeights, score_history: &[f64], baseline: F) -> Vec<Recommendation>
where
    F: Fn(&str) -> f64,
{
    let mut out = Vec::new();

    if score_history.len() >= RECENT_ROUNDS {
        let recent_tail = &score_history[score_history.len() - RECENT_ROUNDS..];
        let recent = mean(recent_tail);
        let overall = mean(score_history);
        if recent < overall * DECLINE_RATIO {
            out.push(Recommendation::PerformanceDeclining);
        } else if recent > overall * IMPROVE_RATIO {
            out.push(Recommendation::PerformanceImproving);
        }
    }

    let total = weights.total();
    if total > 0.0 {
        let ranked = weights.ranked();
        let top: Vec<_> = ranked.iter().take(LISTED_TOPICS).collect();
        let top_weight: f64 = top.iter().map(|(_, w)| *w).sum();
        if top_weight / total > CONCENTRATION_SHARE {
            out.push(Recommendation::Concentrated {
                topics: top.iter().map(|(t, _)| t.to_string()).collect(),
            });
        }
    }

    let neglected: Vec<String> = weights
        .iter()
        .filter(|(_, w)| *w < NEGLECTED_WEIGHT)
        .take(LISTED_TOPICS)
        .map(|(t, _)| t.to_string())
        .collect();
    if !neglected.is_empty() {
        out.push(Recommendation::Neglected { topics: neglected });
    }

    let strong: Vec<String> = weights
        .topics()
        .filter(|t| baseline(t.as_str()) > HIGH_BASELINE)
        .take(LISTED_TOPICS)
        .map(|t| t.to_string())
        .collect();
    if !strong.is_empty() {
        out.push(Recommendation::HighPerforming { topics: strong });
    }

    if out.is_empty() {
        out.push(Recommendation::Adequate);
    }
    out
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
