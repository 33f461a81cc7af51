use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::{Finding, TeamRoundResult, TopicWeights};
use crate::learner::{
    AdaptiveExploration, LearnerParams, LearningSnapshot, Recommendation, WeightAdapter,
    WeightChange,
};
use crate::metrics::MetricsTracker;
use crate::scoring::Scorer;

#[derive(Debug, Clone, Deserialize)]
pub struct TeamSpec {
    pub id: String,
    pub name: String,
    pub initial_weights: TopicWeights,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoundSpec {
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(default)]
    pub submissions: BTreeMap<String, Vec<Finding>>,
}

/// A recorded competition: registered teams plus each round's submissions.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionFile {
    pub teams: Vec<TeamSpec>,
    #[serde(default)]
    pub rounds: Vec<RoundSpec>,
}

impl SessionFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session file: {}", path.display()))
            .map_err(crate::exit::invalid_args_err)?;
        serde_json::from_str(&s)
            .with_context(|| format!("failed to parse session file: {}", path.display()))
            .map_err(crate::exit::invalid_args_err)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub params: LearnerParams,
    pub seed: u64,
    pub adaptive_exploration: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            params: LearnerParams::default(),
            seed: crate::learner::DEFAULT_SEED,
            adaptive_exploration: false,
        }
    }
}

#[derive(Debug, Clone)]
struct TeamState {
    id: String,
    name: String,
    weights: TopicWeights,
    adapter: WeightAdapter,
    exploration: Option<AdaptiveExploration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamRoundSummary {
    pub team_id: String,
    pub team_name: String,
    pub score: f64,
    pub findings: usize,
    pub unique: usize,
    pub false_positives: usize,
    pub rank: usize,
    pub exploration_rate: f64,
    pub weight_changes: Vec<WeightChange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub teams: Vec<TeamRoundSummary>,
}

/// One competition session. Every team owns its weights and adapter; the
/// metrics tracker is shared across teams but only touched between teams'
/// updates.
#[derive(Debug, Clone)]
pub struct Session {
    opts: SessionOptions,
    teams: Vec<TeamState>,
    metrics: MetricsTracker,
}

impl Session {
    pub fn new(opts: SessionOptions) -> Self {
        Self {
            opts,
            teams: Vec::new(),
            metrics: MetricsTracker::new(),
        }
    }

    /// Builds a session with every team of `file` registered, rounds not yet played.
    pub fn from_file(opts: SessionOptions, file: &SessionFile) -> Result<Self> {
        let mut session = Self::new(opts);
        for team in &file.teams {
            session.register_team(&team.id, &team.name, team.initial_weights.clone())?;
        }
        Ok(session)
    }

    pub fn register_team(&mut self, id: &str, name: &str, weights: TopicWeights) -> Result<()> {
        let id = id.trim();
        if id.is_empty() {
            return Err(crate::exit::invalid_args("team id must not be empty"));
        }
        if self.teams.iter().any(|t| t.id == id) {
            return Err(crate::exit::invalid_args(format!("duplicate team id: {id}")));
        }
        weights
            .validate(self.opts.params.bounds)
            .with_context(|| format!("initial weights of team {id}"))
            .map_err(crate::exit::invalid_args_err)?;

        // Distinct streams per team so exploration does not move in lockstep.
        let seed = self.opts.seed.wrapping_add(self.teams.len() as u64);
        let exploration = self.opts.adaptive_exploration.then(AdaptiveExploration::default);
        let mut adapter = WeightAdapter::with_seed(self.opts.params, seed);
        if let Some(e) = &exploration {
            adapter.set_exploration_rate(e.rate());
        }

        self.teams.push(TeamState {
            id: id.to_string(),
            name: name.to_string(),
            weights,
            adapter,
            exploration,
        });
        Ok(())
    }

    /// Scores one round, records it, and adapts weights when `more_rounds` is set.
    ///
    /// Submissions for unknown teams are rejected before any state changes.
    /// Registered teams without a submission play the round with no findings.
    pub fn play_round(
        &mut self,
        round_number: u32,
        started_at: OffsetDateTime,
        submissions: &BTreeMap<String, Vec<Finding>>,
        more_rounds: bool,
    ) -> Result<RoundSummary> {
        if let Some(unknown) = submissions
            .keys()
            .find(|id| !self.teams.iter().any(|t| &t.id == *id))
        {
            return Err(crate::exit::invalid_args(format!(
                "round {round_number}: submission for unregistered team: {unknown}"
            )));
        }

        let scorer = Scorer::new(started_at);
        let mut seen: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(self.teams.len());
        for team in &self.teams {
            let mut findings = submissions.get(&team.id).cloned().unwrap_or_default();
            for f in &mut findings {
                f.team = team.id.clone();
                f.is_unique = seen.insert(f.signature());
            }
            scorer.score_batch(&mut findings);
            results.push(TeamRoundResult::new(
                &team.id,
                &team.name,
                findings,
                started_at,
                team.weights.clone(),
            ));
        }

        self.metrics.record_round(round_number, &results);

        let mut summaries = Vec::with_capacity(results.len());
        for (team, result) in self.teams.iter_mut().zip(&results) {
            let rank = self
                .metrics
                .team(&team.id)
                .and_then(|m| m.rank_per_round.last().copied())
                .unwrap_or_default();

            let mut weight_changes = Vec::new();
            if more_rounds {
                let adaptation = team.adapter.update_with_changes(
                    &team.weights,
                    result.findings(),
                    result.score(),
                    result.false_positive_count(),
                );
                team.weights = adaptation.weights;
                weight_changes = adaptation.changes;

                if let Some(e) = team.exploration.as_mut() {
                    let rate = e.update(result.score());
                    team.adapter.set_exploration_rate(rate);
                }
            }

            summaries.push(TeamRoundSummary {
                team_id: team.id.clone(),
                team_name: team.name.clone(),
                score: result.score(),
                findings: result.findings().len(),
                unique: result.unique_count(),
                false_positives: result.false_positive_count(),
                rank,
                exploration_rate: team.adapter.params().exploration_rate,
                weight_changes,
            });
        }

        Ok(RoundSummary {
            round: round_number,
            started_at,
            teams: summaries,
        })
    }

    /// Plays every round of `file` in order, numbering rounds from 1.
    ///
    /// `on_round` sees each summary as soon as its round completes, so callers
    /// keep the rounds played before a failing one.
    pub fn replay<F>(&mut self, file: &SessionFile, mut on_round: F) -> Result<()>
    where
        F: FnMut(RoundSummary),
    {
        let total = file.rounds.len();
        for (i, round) in file.rounds.iter().enumerate() {
            let number = u32::try_from(i + 1).context("too many rounds")?;
            on_round(self.play_round(number, round.started_at, &round.submissions, i + 1 < total)?);
        }
        Ok(())
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    pub fn options(&self) -> &SessionOptions {
        &self.opts
    }

    pub fn team_ids(&self) -> impl Iterator<Item = &str> {
        self.teams.iter().map(|t| t.id.as_str())
    }

    pub fn weights(&self, team_id: &str) -> Option<&TopicWeights> {
        self.team(team_id).map(|t| &t.weights)
    }

    pub fn final_weights(&self) -> BTreeMap<String, TopicWeights> {
        self.teams
            .iter()
            .map(|t| (t.id.clone(), t.weights.clone()))
            .collect()
    }

    pub fn recommendations(&self, team_id: &str) -> Option<Vec<Recommendation>> {
        let team = self.team(team_id)?;
        let history = self
            .metrics
            .team(team_id)
            .map(|m| m.scores_per_round.as_slice())
            .unwrap_or_default();
        Some(team.adapter.recommendations(&team.weights, history))
    }

    pub fn snapshots(&self) -> BTreeMap<String, LearningSnapshot> {
        self.teams
            .iter()
            .map(|t| (t.id.clone(), t.adapter.snapshot()))
            .collect()
    }

    fn team(&self, team_id: &str) -> Option<&TeamState> {
        self.teams.iter().find(|t| t.id == team_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Severity, WeightBounds};
    use time::macros::datetime;

    const START: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    fn greedy() -> SessionOptions {
        SessionOptions {
            params: LearnerParams {
                exploration_rate: 0.0,
                ..LearnerParams::default()
            },
            ..SessionOptions::default()
        }
    }

    fn weights() -> TopicWeights {
        TopicWeights::from_pairs(
            [("sql_injection", 1.0), ("xss", 1.0)],
            WeightBounds::default(),
        )
        .expect("valid weights")
    }

    fn sqli(location: &str) -> Finding {
        Finding::new("sql_injection", location, Severity::Critical, 9.5, START + time::Duration::minutes(2))
            .with_description("User input concatenated straight into a SQL query string")
            .with_evidence("curl -d \"id=1' OR '1'='1\" returns every row")
            .with_remediation("Use parameterized queries for every lookup")
    }

    fn session() -> Session {
        let mut s = Session::new(greedy());
        s.register_team("alpha", "Alpha", weights()).expect("register alpha");
        s.register_team("beta", "Beta", weights()).expect("register beta");
        s
    }

    #[test]
    fn first_team_in_registration_order_gets_uniqueness() {
        let mut s = session();
        let subs = BTreeMap::from([
            ("beta".to_string(), vec![sqli("db.rs:10")]),
            ("alpha".to_string(), vec![sqli("db.rs:10"), sqli("db.rs:10")]),
        ]);
        let summary = s.play_round(1, START, &subs, false).expect("round plays");
        assert_eq!(summary.teams[0].team_id, "alpha");
        assert_eq!(summary.teams[0].unique, 1);
        assert_eq!(summary.teams[1].unique, 0);
        // 340 for the unique copy, 240 for each duplicate.
        assert_eq!(summary.teams[0].score, 580.0);
        assert_eq!(summary.teams[1].score, 240.0);
        assert_eq!(summary.teams[0].rank, 1);
        assert!(summary.teams.iter().all(|t| t.weight_changes.is_empty()));
        assert_eq!(s.weights("alpha"), Some(&weights()));
    }

    #[test]
    fn unknown_team_is_rejected_without_side_effects() {
        let mut s = session();
        let subs = BTreeMap::from([("gamma".to_string(), vec![sqli("a.rs:1")])]);
        let err = s.play_round(1, START, &subs, true).expect_err("unknown team");
        assert_eq!(crate::exit::exit_code(&err), 2);
        assert!(s.metrics().is_empty());
    }

    #[test]
    fn weights_adapt_only_between_rounds() {
        let mut s = session();
        let subs = BTreeMap::from([("alpha".to_string(), vec![sqli("db.rs:10")])]);
        let summary = s.play_round(1, START, &subs, true).expect("round plays");
        assert_eq!(s.weights("alpha").and_then(|w| w.get("sql_injection")), Some(2.0));
        assert_eq!(s.weights("beta"), Some(&weights()));
        assert_eq!(summary.teams[0].weight_changes.len(), 1);
    }

    #[test]
    fn duplicate_and_invalid_registrations_fail() {
        let mut s = session();
        assert!(s.register_team("alpha", "Again", weights()).is_err());
        let heavy = TopicWeights::from_pairs([("xss", 2.0)], WeightBounds::default())
            .expect("valid weights");
        let mut strict = Session::new(SessionOptions {
            params: LearnerParams {
                bounds: WeightBounds::new(0.1, 1.0).expect("bounds"),
                ..LearnerParams::default()
            },
            ..SessionOptions::default()
        });
        let err = strict.register_team("t", "T", heavy).expect_err("out of range");
        assert_eq!(crate::exit::exit_code(&err), 2);
    }

    #[test]
    fn replay_numbers_rounds_and_skips_final_adaptation() {
        let file: SessionFile = serde_json::from_value(serde_json::json!({
            "teams": [
                {"id": "alpha", "name": "Alpha", "initial_weights": {"sql_injection": 1.0, "xss": 1.0}}
            ],
            "rounds": [
                {"started_at": "2026-03-01T12:00:00Z", "submissions": {"alpha": []}},
                {"started_at": "2026-03-01T13:00:00Z", "submissions": {"alpha": [{
                    "topic": "xss", "location": "view.rs:3", "severity": "high",
                    "risk_score": 7.5, "discovered_at": "2026-03-01T13:20:00Z"
                }]}}
            ]
        }))
        .expect("session file");
        let mut s = Session::from_file(greedy(), &file).expect("session");
        let mut rounds = Vec::new();
        s.replay(&file, |r| rounds.push(r)).expect("replay");
        assert_eq!(rounds.iter().map(|r| r.round).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(s.metrics().rounds().len(), 2);
        assert_eq!(s.weights("alpha"), Some(&weights()));
        assert!(s.recommendations("alpha").is_some());
        assert!(s.snapshots().contains_key("alpha"));
    }

    #[test]
    fn replay_hands_over_rounds_played_before_a_failure() {
        let file: SessionFile = serde_json::from_value(serde_json::json!({
            "teams": [
                {"id": "alpha", "name": "Alpha", "initial_weights": {"xss": 1.0}}
            ],
            "rounds": [
                {"started_at": "2026-03-01T12:00:00Z", "submissions": {"alpha": []}},
                {"started_at": "2026-03-01T13:00:00Z", "submissions": {"ghost": []}}
            ]
        }))
        .expect("session file");
        let mut s = Session::from_file(greedy(), &file).expect("session");
        let mut rounds = Vec::new();
        let err = s.replay(&file, |r| rounds.push(r)).expect_err("unknown team");
        assert_eq!(crate::exit::exit_code(&err), 2);
        assert_eq!(rounds.len(), 1);
        assert_eq!(s.metrics().rounds().len(), 1);
    }

    #[test]
    fn adaptive_exploration_sets_team_rate() {
        let mut s = Session::new(SessionOptions {
            adaptive_exploration: true,
            ..greedy()
        });
        s.register_team("alpha", "Alpha", weights()).expect("register");
        let mut rate = 0.0;
        for round in 1..=5 {
            let findings: Vec<Finding> = (0..round).map(|i| sqli(&format!("db.rs:{i}"))).collect();
            let subs = BTreeMap::from([("alpha".to_string(), findings)]);
            let summary = s.play_round(round, START, &subs, true).expect("round plays");
            rate = summary.teams[0].exploration_rate;
            if round < 5 {
                assert_eq!(rate, 0.3);
            }
        }
        // Steadily rising scores decay exploration.
        assert_eq!(rate, 0.3 * 0.95);
    }
}
