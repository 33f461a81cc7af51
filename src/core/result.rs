use serde::Serialize;
use time::OffsetDateTime;

use crate::core::{Finding, TopicWeights};

/// One team's scored output for one round. Built once from scored findings
/// and read by both the metrics tracker and the weight adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRoundResult {
    team_id: String,
    team_name: String,
    findings: Vec<Finding>,
    score: f64,
    false_positive_count: usize,
    unique_count: usize,
    avg_discovery_time: Option<f64>,
    weights: TopicWeights,
}

impl TeamRoundResult {
    pub fn new(
        team_id: impl Into<String>,
        team_name: impl Into<String>,
        findings: Vec<Finding>,
        round_started_at: OffsetDateTime,
        weights: TopicWeights,
    ) -> Self {
        let score = findings.iter().map(Finding::points).sum();
        let false_positive_count = findings.iter().filter(|f| f.is_false_positive).count();

        let valid: Vec<&Finding> = findings.iter().filter(|f| !f.is_false_positive).collect();
        let unique_count = valid.iter().filter(|f| f.is_unique).count();
        let avg_discovery_time = if valid.is_empty() {
            None
        } else {
            let total: f64 = valid.iter().map(|f| f.elapsed_secs(round_started_at)).sum();
            Some(total / valid.len() as f64)
        };

        Self {
            team_id: team_id.into(),
            team_name: team_name.into(),
            findings,
            score,
            false_positive_count,
            unique_count,
            avg_discovery_time,
            weights,
        }
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn valid_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_false_positive)
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn false_positive_count(&self) -> usize {
        self.false_positive_count
    }

    pub fn unique_count(&self) -> usize {
        self.unique_count
    }

    /// Mean seconds from round start to discovery over valid findings.
    pub fn avg_discovery_time(&self) -> Option<f64> {
        self.avg_discovery_time
    }

    pub fn weights(&self) -> &TopicWeights {
        &self.weights
    }
}
