//! Cumulative per-team statistics across the rounds of one session.

mod analysis;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::core::{SeverityCounts, TeamRoundResult};

pub use analysis::{
    Award, ComparativeAnalysis, LeaderboardEntry, MetricsExport, MostImproved, SessionStatistics,
    Specialists, Winner,
};

const TREND_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    #[default]
    Stable,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        }
    }

    /// Classifies a score history by its least-squares slope over round index.
    pub fn classify(scores: &[f64]) -> Self {
        let slope = ols_slope(scores);
        if slope > TREND_THRESHOLD {
            Trend::Improving
        } else if slope < -TREND_THRESHOLD {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "improving" => Ok(Trend::Improving),
            "declining" => Ok(Trend::Declining),
            "stable" => Ok(Trend::Stable),
            other => Err(format!("unknown trend: {other}")),
        }
    }
}

/// Slope of `(index, score)`; 0 with fewer than two points.
pub fn ols_slope(scores: &[f64]) -> f64 {
    let n = scores.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = scores.iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in scores.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 { 0.0 } else { num / den }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMetrics {
    pub team_id: String,
    pub team_name: String,

    pub total_score: f64,
    pub scores_per_round: Vec<f64>,
    pub average_score: f64,
    pub trend: Trend,

    pub total_bugs: u64,
    pub bugs_per_round: Vec<u64>,
    pub unique_bugs: u64,
    pub duplicate_bugs: u64,
    pub severity: SeverityCounts,
    pub topics: BTreeMap<String, u64>,

    pub false_positives: u64,
    pub false_positive_rate: f64,
    pub average_report_quality: f64,
    #[serde(skip)]
    quality_total: f64,
    #[serde(skip)]
    quality_samples: u64,

    pub average_time_to_discovery: f64,
    pub discovery_times: Vec<f64>,

    pub rank_per_round: Vec<usize>,
    pub times_ranked_first: u64,
    pub times_ranked_last: u64,
}

impl TeamMetrics {
    fn new(team_id: &str, team_name: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
            team_name: team_name.to_string(),
            total_score: 0.0,
            scores_per_round: Vec::new(),
            average_score: 0.0,
            trend: Trend::Stable,
            total_bugs: 0,
            bugs_per_round: Vec::new(),
            unique_bugs: 0,
            duplicate_bugs: 0,
            severity: SeverityCounts::default(),
            topics: BTreeMap::new(),
            false_positives: 0,
            false_positive_rate: 0.0,
            average_report_quality: 0.0,
            quality_total: 0.0,
            quality_samples: 0,
            average_time_to_discovery: 0.0,
            discovery_times: Vec::new(),
            rank_per_round: Vec::new(),
            times_ranked_first: 0,
            times_ranked_last: 0,
        }
    }

    pub fn rounds_played(&self) -> usize {
        self.scores_per_round.len()
    }

    fn apply(&mut self, result: &TeamRoundResult, rank: usize, team_count: usize) {
        self.total_score += result.score();
        self.scores_per_round.push(result.score());
        self.average_score = self.total_score / self.scores_per_round.len() as f64;

        let mut valid = 0u64;
        for f in result.valid_findings() {
            valid += 1;
            if let Some(severity) = f.severity {
                self.severity.record(severity);
            }
            *self.topics.entry(f.topic.clone()).or_default() += 1;
            self.quality_total += f.quality_score;
            self.quality_samples += 1;
        }
        let unique = result.unique_count() as u64;
        self.total_bugs += valid;
        self.bugs_per_round.push(valid);
        self.unique_bugs += unique;
        self.duplicate_bugs += valid.saturating_sub(unique);

        self.false_positives += result.false_positive_count() as u64;
        let reports = self.total_bugs + self.false_positives;
        self.false_positive_rate = if reports == 0 {
            0.0
        } else {
            self.false_positives as f64 / reports as f64
        };

        if self.quality_samples > 0 {
            self.average_report_quality = self.quality_total / self.quality_samples as f64;
        }

        if let Some(secs) = result.avg_discovery_time() {
            self.discovery_times.push(secs);
            self.average_time_to_discovery =
                self.discovery_times.iter().sum::<f64>() / self.discovery_times.len() as f64;
        }

        self.rank_per_round.push(rank);
        if rank == 1 {
            self.times_ranked_first += 1;
        } else if rank == team_count {
            self.times_ranked_last += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub team_id: String,
    pub score: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub round: u32,
    pub standings: Vec<Standing>,
}

/// Session-wide aggregator. Teams keep first-sighting order, which is also
/// the tie-break order for every derived view.
///
/// `record_round` must be called once per round; a second call with the
/// same round number counts the round twice.
#[derive(Debug, Clone, Default)]
pub struct MetricsTracker {
    teams: Vec<TeamMetrics>,
    index: HashMap<String, usize>,
    rounds: Vec<RoundRecord>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one round into the cumulative state. `results` order breaks
    /// score ties in the round ranking.
    pub fn record_round(&mut self, round_number: u32, results: &[TeamRoundResult]) {
        for r in results {
            if !self.index.contains_key(r.team_id()) {
                self.index.insert(r.team_id().to_string(), self.teams.len());
                self.teams.push(TeamMetrics::new(r.team_id(), r.team_name()));
            }
        }

        let ranks = round_ranks(results);
        let team_count = results.len();
        for (r, &rank) in results.iter().zip(&ranks) {
            if let Some(&i) = self.index.get(r.team_id()) {
                self.teams[i].apply(r, rank, team_count);
            }
        }

        for team in &mut self.teams {
            team.trend = Trend::classify(&team.scores_per_round);
        }

        let mut standings: Vec<Standing> = results
            .iter()
            .zip(&ranks)
            .map(|(r, &rank)| Standing {
                team_id: r.team_id().to_string(),
                score: r.score(),
                rank,
            })
            .collect();
        standings.sort_by_key(|s| s.rank);
        self.rounds.push(RoundRecord {
            round: round_number,
            standings,
        });
    }

    pub fn team(&self, team_id: &str) -> Option<&TeamMetrics> {
        self.index.get(team_id).map(|&i| &self.teams[i])
    }

    pub fn teams(&self) -> &[TeamMetrics] {
        &self.teams
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Teams by cumulative score, highest first; ties keep first-sighting order.
    pub fn leaderboard(&self) -> Vec<&TeamMetrics> {
        let mut board: Vec<&TeamMetrics> = self.teams.iter().collect();
        board.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        board
    }

    /// Drops all state; the tracker can then start a new session.
    pub fn reset(&mut self) {
        self.teams.clear();
        self.index.clear();
        self.rounds.clear();
    }
}

/// 1-based rank for each entry of `results`, same order as the input.
fn round_ranks(results: &[TeamRoundResult]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by(|&a, &b| results[b].score().total_cmp(&results[a].score()));
    let mut ranks = vec![0; results.len()];
    for (pos, &i) in order.iter().enumerate() {
        ranks[i] = pos + 1;
    }
    ranks
}
