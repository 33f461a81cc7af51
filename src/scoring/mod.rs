//! Point values for individual findings.
//!
//! A finding's total is `base × risk multiplier + uniqueness + quality + speed`,
//! unless it trips two or more weak-signal checks, in which case it is a false
//! positive worth exactly [`FALSE_POSITIVE_PENALTY`].

pub mod cvss;
mod scorecard;

use time::OffsetDateTime;

use crate::core::Finding;

pub use scorecard::{Scorecard, TopFinding};

pub const FALSE_POSITIVE_PENALTY: f64 = -20.0;
pub const UNIQUENESS_BONUS_RATIO: f64 = 0.5;
pub const QUALITY_BONUS_MAX: f64 = 20.0;

/// Weak-signal thresholds. Two or more hits mark a false positive.
const FP_MIN_DESCRIPTION: usize = 10;
const FP_MIN_EVIDENCE: usize = 5;
const FP_MIN_SIGNALS: usize = 2;

/// Inclusive risk-score bands and their multipliers. Scores in the gaps
/// between bands fall back to 1.0.
const RISK_BANDS: [(f64, f64, f64); 4] = [
    (9.0, f64::INFINITY, 2.0),
    (7.0, 8.9, 1.5),
    (4.0, 6.9, 1.2),
    (0.1, 3.9, 1.0),
];

/// (min length, points) tiers per text field, longest first. Any non-empty
/// text earns the last tier.
const DESCRIPTION_TIERS: [(usize, f64); 3] = [(50, 7.0), (20, 4.0), (1, 2.0)];
const EVIDENCE_TIERS: [(usize, f64); 3] = [(30, 7.0), (10, 4.0), (1, 2.0)];
const REMEDIATION_TIERS: [(usize, f64); 3] = [(30, 6.0), (10, 3.0), (1, 1.0)];

/// (elapsed minutes upper bound, bonus) tiers; slower than the last bound earns nothing.
const SPEED_TIERS: [(f64, f64); 3] = [(5.0, 20.0), (15.0, 10.0), (30.0, 5.0)];

/// Scores findings for one round. The round start anchors the speed bonus.
#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    round_started_at: OffsetDateTime,
}

impl Scorer {
    pub fn new(round_started_at: OffsetDateTime) -> Self {
        Self { round_started_at }
    }

    pub fn round_started_at(&self) -> OffsetDateTime {
        self.round_started_at
    }

    /// Returns the finding with every scoring annotation populated.
    /// `is_unique` must already be set by the caller.
    pub fn score(&self, mut finding: Finding) -> Finding {
        self.apply(&mut finding);
        finding
    }

    /// Scores every finding in place and returns the sum of their totals.
    pub fn score_batch(&self, findings: &mut [Finding]) -> f64 {
        findings.iter_mut().map(|f| self.apply(f)).sum()
    }

    fn apply(&self, finding: &mut Finding) -> f64 {
        if is_false_positive(finding) {
            finding.is_false_positive = true;
            finding.quality_score = 0.0;
            finding.speed_bonus = 0.0;
            finding.total_score = Some(FALSE_POSITIVE_PENALTY);
            return FALSE_POSITIVE_PENALTY;
        }

        let base = finding.severity.map(|s| s.base_points()).unwrap_or(0.0);
        let weighted = base * risk_multiplier(finding.risk_score);
        let uniqueness = if finding.is_unique {
            weighted * UNIQUENESS_BONUS_RATIO
        } else {
            0.0
        };
        let quality = quality_bonus(finding);
        let speed = speed_bonus(finding.elapsed_secs(self.round_started_at) / 60.0);

        let total = weighted + uniqueness + quality + speed;
        finding.is_false_positive = false;
        finding.quality_score = quality;
        finding.speed_bonus = speed;
        finding.total_score = Some(total);
        total
    }
}

/// Number of weak signals a finding shows.
pub fn weak_signals(finding: &Finding) -> usize {
    [
        finding.description.chars().count() < FP_MIN_DESCRIPTION,
        finding.evidence.chars().count() < FP_MIN_EVIDENCE,
        finding.risk_score == 0.0,
        finding.location.is_empty(),
    ]
    .into_iter()
    .filter(|hit| *hit)
    .count()
}

pub fn is_false_positive(finding: &Finding) -> bool {
    weak_signals(finding) >= FP_MIN_SIGNALS
}

pub fn risk_multiplier(risk_score: f64) -> f64 {
    RISK_BANDS
        .iter()
        .find(|(lo, hi, _)| risk_score >= *lo && risk_score <= *hi)
        .map(|(_, _, m)| *m)
        .unwrap_or(1.0)
}

pub fn quality_bonus(finding: &Finding) -> f64 {
    let total = tier_points(&finding.description, &DESCRIPTION_TIERS)
        + tier_points(&finding.evidence, &EVIDENCE_TIERS)
        + tier_points(&finding.remediation, &REMEDIATION_TIERS);
    total.min(QUALITY_BONUS_MAX)
}

fn tier_points(text: &str, tiers: &[(usize, f64)]) -> f64 {
    let len = text.chars().count();
    tiers
        .iter()
        .find(|(min_len, _)| len >= *min_len)
        .map(|(_, points)| *points)
        .unwrap_or(0.0)
}

pub fn speed_bonus(elapsed_minutes: f64) -> f64 {
    SPEED_TIERS
        .iter()
        .find(|(bound, _)| elapsed_minutes < *bound)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0.0)
}
