use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::TopicWeights;
use crate::engine::{RoundSummary, Session};

/// What a finished (or aborted) session run leaves behind in the logs directory.
#[derive(Debug, Clone, Copy)]
pub struct SessionLog<'a> {
    pub command: &'static str,
    pub source: &'a Path,
    pub session: &'a Session,
    pub rounds: &'a [RoundSummary],
    pub error: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SessionLogRecord {
    schema_version: &'static str,
    tool_version: String,
    command: &'static str,
    started_at: String,
    finished_at: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    source: String,
    learner: LearnerRecord,
    round_count: usize,
    team_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    winner: Option<String>,
    final_weights: BTreeMap<String, TopicWeights>,
    rounds: Vec<RoundChangesRecord>,
}

#[derive(Debug, Serialize)]
struct LearnerRecord {
    learning_rate: f64,
    discount_factor: f64,
    exploration_rate: f64,
    min_weight: f64,
    max_weight: f64,
    seed: u64,
    adaptive_exploration: bool,
}

#[derive(Debug, Serialize)]
struct RoundChangesRecord {
    round: u32,
    changes: Vec<WeightChangeRecord>,
}

#[derive(Debug, Serialize)]
struct WeightChangeRecord {
    team_id: String,
    topic: String,
    old_weight: f64,
    new_weight: f64,
    reason: String,
}

pub fn write_session_log(
    logs_dir: &Path,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    log: &SessionLog<'_>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory: {}", logs_dir.display()))?;

    let pid = std::process::id();
    let ts = finished_at.unix_timestamp_nanos();
    let path = logs_dir.join(format!("session-{pid}-{ts}.json"));

    let opts = log.session.options();
    let record = SessionLogRecord {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command: log.command,
        started_at: format_ts(started_at),
        finished_at: format_ts(finished_at),
        status: if log.error.is_some() { "error" } else { "ok" },
        error: log.error.map(str::to_string),
        source: log.source.display().to_string(),
        learner: LearnerRecord {
            learning_rate: opts.params.learning_rate,
            discount_factor: opts.params.discount_factor,
            exploration_rate: opts.params.exploration_rate,
            min_weight: opts.params.bounds.min,
            max_weight: opts.params.bounds.max,
            seed: opts.seed,
            adaptive_exploration: opts.adaptive_exploration,
        },
        round_count: log.rounds.len(),
        team_count: log.session.team_ids().count(),
        winner: log
            .session
            .metrics()
            .leaderboard()
            .first()
            .map(|m| m.team_id.clone()),
        final_weights: log.session.final_weights(),
        rounds: log.rounds.iter().map(round_changes).collect(),
    };

    let buf = serde_json::to_vec_pretty(&record).context("failed to serialize session log")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write session log: {}", path.display()))?;
    Ok(path)
}

fn round_changes(summary: &RoundSummary) -> RoundChangesRecord {
    RoundChangesRecord {
        round: summary.round,
        changes: summary
            .teams
            .iter()
            .flat_map(|t| {
                t.weight_changes.iter().map(|c| WeightChangeRecord {
                    team_id: t.team_id.clone(),
                    topic: c.topic.clone(),
                    old_weight: c.old_weight,
                    new_weight: c.new_weight,
                    reason: c.reason.clone(),
                })
            })
            .collect(),
    }
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Finding, Severity, WeightBounds};
    use crate::engine::SessionOptions;
    use crate::learner::LearnerParams;
    use std::sync::atomic::{AtomicU64, Ordering};
    use time::macros::datetime;

    fn temp_dir() -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "huntboard-log-test-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn session_log_records_winner_and_weight_changes() {
        let start = datetime!(2026-02-01 9:00 UTC);
        let mut session = Session::new(SessionOptions {
            params: LearnerParams {
                exploration_rate: 0.0,
                ..LearnerParams::default()
            },
            ..SessionOptions::default()
        });
        let weights = TopicWeights::from_pairs([("xss", 1.0), ("csrf", 1.0)], WeightBounds::default())
            .expect("valid weights");
        session.register_team("red", "Red", weights.clone()).expect("register red");
        session.register_team("blue", "Blue", weights).expect("register blue");

        let finding = Finding::new("xss", "web/form.rs:12", Severity::High, 7.5, start)
            .with_description("Reflected script injection in the search form")
            .with_evidence("<script>alert(1)</script> echoed back");
        let subs = BTreeMap::from([("blue".to_string(), vec![finding])]);
        let rounds = vec![session.play_round(1, start, &subs, true).expect("round")];

        let dir = temp_dir();
        let source = PathBuf::from("session.json");
        let path = write_session_log(
            &dir,
            start,
            start,
            &SessionLog {
                command: "replay",
                source: &source,
                session: &session,
                rounds: &rounds,
                error: None,
            },
        )
        .expect("write log");

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with(&format!("session-{}-", std::process::id())));

        let bytes = std::fs::read(&path).expect("read log");
        let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");
        assert_eq!(v["command"], "replay");
        assert_eq!(v["status"], "ok");
        assert_eq!(v["started_at"], "2026-02-01T09:00:00Z");
        assert_eq!(v["team_count"], 2);
        assert_eq!(v["round_count"], 1);
        assert_eq!(v["winner"], "blue");
        assert_eq!(v["final_weights"]["blue"]["xss"], 2.0);
        assert_eq!(v["rounds"][0]["changes"][0]["team_id"], "blue");
        assert!(v.get("error").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
