use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn huntboard_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_huntboard"));
    cmd.env("HOME", home);
    cmd.env_remove("HUNTBOARD_CONFIG");
    cmd.env_remove("HUNTBOARD_LEARNER_LEARNING_RATE");
    cmd.env_remove("HUNTBOARD_LEARNER_EXPLORATION_RATE");
    cmd.env_remove("HUNTBOARD_LEARNER_SEED");
    cmd.env_remove("HUNTBOARD_LEARNER_ADAPTIVE_EXPLORATION");
    cmd.env_remove("HUNTBOARD_SCORING_TOP_FINDINGS");
    cmd.env_remove("HUNTBOARD_UI_COLOR");
    cmd.env_remove("HUNTBOARD_UI_MAX_TABLE_ROWS");
    cmd.env_remove("HUNTBOARD_LOGS_ENABLED");
    cmd.env_remove("HUNTBOARD_LOGS_DIR");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    huntboard_cmd(home).args(args).output().expect("run huntboard")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("huntboard-replay-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn fixture() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/session.json")
}

fn replay_json(home: &Path, extra: &[&str]) -> serde_json::Value {
    let mut args = vec!["replay", fixture(), "--json"];
    args.extend_from_slice(extra);
    let out = run(home, &args);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("parse json")
}

#[test]
fn replay_ranks_teams_and_reports_analysis() {
    let home = make_temp_home();
    let v = replay_json(&home, &[]);

    let rounds = v["rounds"].as_array().expect("rounds array");
    assert_eq!(rounds.len(), 3);

    let r1 = &rounds[0]["teams"];
    assert_eq!(r1[0]["team_id"], "red");
    assert_eq!(r1[0]["score"], 340.0);
    assert_eq!(r1[0]["rank"], 1);
    assert_eq!(r1[1]["score"], 220.0);
    assert_eq!(r1[1]["unique"], 0);
    assert_eq!(r1[1]["false_positives"], 1);
    assert_eq!(r1[2]["score"], 58.0);

    // Registration order decides uniqueness, not discovery time.
    let r3 = &rounds[2]["teams"];
    assert_eq!(r3[0]["unique"], 1);
    assert_eq!(r3[1]["unique"], 0);
    assert_eq!(r3[2]["rank"], 1);

    // No adaptation after the last round.
    for t in r3.as_array().expect("teams") {
        assert!(t["weight_changes"].as_array().expect("changes").is_empty());
    }

    let analysis = &v["metrics"]["comparative_analysis"];
    assert_eq!(analysis["overall_winner"]["team_id"], "red");
    assert_eq!(analysis["overall_winner"]["total_score"], 832.5);
    assert_eq!(analysis["leaderboard"][1]["team_id"], "blue");
    assert_eq!(analysis["leaderboard"][2]["team_id"], "green");
    assert_eq!(analysis["most_improved"]["team_id"], "green");
    assert_eq!(analysis["specialists"]["critical_hunter"]["team_id"], "red");
    assert_eq!(analysis["specialists"]["best_coverage"]["team_id"], "red");
    assert_eq!(analysis["statistics"]["total_rounds"], 3);

    let teams = v["metrics"]["teams"].as_array().expect("teams");
    let blue = &teams[1];
    assert_eq!(blue["rank_per_round"], serde_json::json!([2, 2, 3]));
    assert_eq!(blue["times_ranked_last"], 1);
    assert_eq!(blue["trend"], "declining");
    let rate = blue["false_positive_rate"].as_f64().expect("rate");
    assert!((0.0..=1.0).contains(&rate));

    for (_, weights) in v["final_weights"].as_object().expect("weights") {
        for (_, w) in weights.as_object().expect("topic weights") {
            let w = w.as_f64().expect("number");
            assert!((0.1..=2.0).contains(&w), "weight out of bounds: {w}");
        }
    }
    assert!(v["recommendations"]["green"].is_array());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn replay_is_deterministic_for_a_fixed_seed() {
    let home = make_temp_home();
    let a = replay_json(&home, &[]);
    let b = replay_json(&home, &[]);
    assert_eq!(a["final_weights"], b["final_weights"]);
    assert_eq!(a["rounds"], b["rounds"]);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn replay_writes_session_log() {
    let home = make_temp_home();
    let v = replay_json(&home, &[]);

    let log_path = PathBuf::from(v["log_path"].as_str().expect("log path"));
    assert!(log_path.starts_with(home.join(".config/huntboard/logs")));

    let bytes = std::fs::read(&log_path).expect("read log");
    let log: serde_json::Value = serde_json::from_slice(&bytes).expect("parse log");
    assert_eq!(log["command"], "replay");
    assert_eq!(log["status"], "ok");
    assert_eq!(log["round_count"], 3);
    assert_eq!(log["team_count"], 3);
    assert_eq!(log["winner"], "red");
    assert_eq!(log["final_weights"], v["final_weights"]);

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn replay_export_contains_metrics_and_learning_state() {
    let home = make_temp_home();
    let export = home.join("out/export.json");
    let export_s = export.display().to_string();
    let _ = replay_json(&home, &["--export", &export_s]);

    let bytes = std::fs::read(&export).expect("read export");
    let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse export");
    assert_eq!(v["schema_version"], "1.0");
    assert_eq!(v["metrics"]["teams"].as_array().map(|a| a.len()), Some(3));
    let red = &v["learning"]["red"];
    assert_eq!(red["params"]["learning_rate"], 0.15);
    assert!(red["reward_history"]["sql_injection"].is_array());

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn replay_text_output_names_the_winner() {
    let home = make_temp_home();
    let out = run(&home, &["replay", fixture(), "--no-color"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Winner: Red Team (red)"), "stdout: {stdout}");
    assert!(stdout.contains("Leaderboard:"));
    assert!(stdout.contains("Most improved: Green Team"));
    let _ = std::fs::remove_dir_all(&home);
}
