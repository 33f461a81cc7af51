use serde::Serialize;

use super::{MetricsTracker, TeamMetrics, Trend};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Award {
    pub team_id: String,
    pub team_name: String,
    pub value: f64,
}

impl Award {
    fn new(m: &TeamMetrics, value: f64) -> Self {
        Self {
            team_id: m.team_id.clone(),
            team_name: m.team_name.clone(),
            value,
        }
    }
}

/// Category awards. `most_accurate` is absent when no team has a valid bug.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Specialists {
    pub critical_hunter: Option<Award>,
    pub most_accurate: Option<Award>,
    pub best_coverage: Option<Award>,
    pub best_reporter: Option<Award>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MostImproved {
    pub team_id: String,
    pub team_name: String,
    pub trend: Trend,
    pub improvement: f64,
    pub improvement_per_round: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Winner {
    pub team_id: String,
    pub team_name: String,
    pub total_score: f64,
    pub total_bugs: u64,
    pub critical_bugs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatistics {
    pub average_score: f64,
    pub total_bugs_found: u64,
    pub average_bugs_per_team: f64,
    pub total_rounds: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub team_id: String,
    pub team_name: String,
    pub score: f64,
    pub bugs: u64,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparativeAnalysis {
    pub overall_winner: Winner,
    pub specialists: Specialists,
    pub most_improved: Option<MostImproved>,
    pub statistics: SessionStatistics,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Everything the tracker knows, in a shape ready for `serde_json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsExport<'a> {
    pub teams: &'a [TeamMetrics],
    pub rounds: &'a [super::RoundRecord],
    pub comparative_analysis: Option<ComparativeAnalysis>,
}

// Strict comparison keeps the earliest team on ties.
fn first_best<'a, I, F>(teams: I, key: F, higher: bool) -> Option<(&'a TeamMetrics, f64)>
where
    I: IntoIterator<Item = &'a TeamMetrics>,
    F: Fn(&TeamMetrics) -> f64,
{
    let mut best: Option<(&TeamMetrics, f64)> = None;
    for m in teams {
        let v = key(m);
        let better = match best {
            None => true,
            Some((_, b)) if higher => v > b,
            Some((_, b)) => v < b,
        };
        if better {
            best = Some((m, v));
        }
    }
    best
}

fn improvement(m: &TeamMetrics) -> f64 {
    match (m.scores_per_round.first(), m.scores_per_round.last()) {
        (Some(first), Some(last)) if m.scores_per_round.len() >= 2 => last - first,
        _ => 0.0,
    }
}

impl MetricsTracker {
    pub fn specialists(&self) -> Specialists {
        let award = |found: Option<(&TeamMetrics, f64)>| found.map(|(m, v)| Award::new(m, v));
        Specialists {
            critical_hunter: award(first_best(&self.teams, |m| m.severity.critical as f64, true)),
            most_accurate: award(first_best(
                self.teams.iter().filter(|m| m.total_bugs > 0),
                |m| m.false_positive_rate,
                false,
            )),
            best_coverage: award(first_best(&self.teams, |m| m.unique_bugs as f64, true)),
            best_reporter: award(first_best(&self.teams, |m| m.average_report_quality, true)),
        }
    }

    /// Improving team with the largest per-round gain, if any team is improving.
    pub fn most_improved(&self) -> Option<MostImproved> {
        let (m, rate) = first_best(
            self.teams.iter().filter(|m| m.trend == Trend::Improving),
            |m| {
                let rounds = m.rounds_played();
                if rounds < 2 { 0.0 } else { improvement(m) / rounds as f64 }
            },
            true,
        )?;
        Some(MostImproved {
            team_id: m.team_id.clone(),
            team_name: m.team_name.clone(),
            trend: m.trend,
            improvement: improvement(m),
            improvement_per_round: rate,
        })
    }

    pub fn comparative_analysis(&self) -> Option<ComparativeAnalysis> {
        let board = self.leaderboard();
        let head = board.first()?;

        let team_count = self.teams.len() as f64;
        let total_score: f64 = self.teams.iter().map(|m| m.total_score).sum();
        let total_bugs: u64 = self.teams.iter().map(|m| m.total_bugs).sum();

        Some(ComparativeAnalysis {
            overall_winner: Winner {
                team_id: head.team_id.clone(),
                team_name: head.team_name.clone(),
                total_score: head.total_score,
                total_bugs: head.total_bugs,
                critical_bugs: head.severity.critical,
            },
            specialists: self.specialists(),
            most_improved: self.most_improved(),
            statistics: SessionStatistics {
                average_score: total_score / team_count,
                total_bugs_found: total_bugs,
                average_bugs_per_team: total_bugs as f64 / team_count,
                total_rounds: self.rounds.len(),
            },
            leaderboard: board
                .iter()
                .enumerate()
                .map(|(i, m)| LeaderboardEntry {
                    rank: i + 1,
                    team_id: m.team_id.clone(),
                    team_name: m.team_name.clone(),
                    score: m.total_score,
                    bugs: m.total_bugs,
                    trend: m.trend,
                })
                .collect(),
        })
    }

    pub fn export(&self) -> MetricsExport<'_> {
        MetricsExport {
            teams: &self.teams,
            rounds: &self.rounds,
            comparative_analysis: self.comparative_analysis(),
        }
    }
}
