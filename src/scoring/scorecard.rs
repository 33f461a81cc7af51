use serde::Serialize;

use crate::core::{Finding, Severity, SeverityCounts};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopFinding {
    pub topic: String,
    pub severity: Option<Severity>,
    pub score: f64,
    pub location: String,
}

/// Read-only summary over a set of already-scored findings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub total_findings: usize,
    pub valid_findings: usize,
    pub false_positives: usize,
    pub total_score: f64,
    pub severity_distribution: SeverityCounts,
    pub top_findings: Vec<TopFinding>,
    pub average_risk_score: f64,
    pub unique_discoveries: usize,
    pub false_positive_rate: f64,
}

impl Scorecard {
    pub fn from_findings(findings: &[Finding], top_n: usize) -> Self {
        let valid: Vec<&Finding> = findings.iter().filter(|f| !f.is_false_positive).collect();
        let false_positives = findings.len() - valid.len();

        let mut severity_distribution = SeverityCounts::default();
        for f in &valid {
            if let Some(severity) = f.severity {
                severity_distribution.record(severity);
            }
        }

        let mut ranked = valid.clone();
        // Stable: equal scores keep input order.
        ranked.sort_by(|a, b| b.points().total_cmp(&a.points()));
        let top_findings = ranked
            .into_iter()
            .take(top_n)
            .map(|f| TopFinding {
                topic: f.topic.clone(),
                severity: f.severity,
                score: f.points(),
                location: f.location.clone(),
            })
            .collect();

        let average_risk_score = if valid.is_empty() {
            0.0
        } else {
            valid.iter().map(|f| f.risk_score).sum::<f64>() / valid.len() as f64
        };

        let false_positive_rate = if findings.is_empty() {
            0.0
        } else {
            false_positives as f64 / findings.len() as f64
        };

        Self {
            total_findings: findings.len(),
            valid_findings: valid.len(),
            false_positives,
            total_score: findings.iter().map(Finding::points).sum(),
            severity_distribution,
            top_findings,
            average_risk_score,
            unique_discoveries: valid.iter().filter(|f| f.is_unique).count(),
            false_positive_rate,
        }
    }
}
