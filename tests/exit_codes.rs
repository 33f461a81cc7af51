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
    let home = std::env::temp_dir().join(format!("huntboard-exit-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

fn fixture() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/session.json")
}

#[test]
fn completion_unknown_shell_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "nope"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn completion_bash_succeeds() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "bash"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("huntboard"));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn replay_missing_file_exits_2() {
    let home = make_temp_home();
    let missing = home.join("nope.json").display().to_string();
    let out = run(&home, &["replay", &missing]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("error:"), "stderr: {stderr}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn replay_unknown_team_exits_2_and_logs_failure() {
    let home = make_temp_home();
    let file = home.join("session.json");
    write_file(
        &file,
        br#"{
  "teams": [{"id": "red", "name": "Red", "initial_weights": {"xss": 1.0}}],
  "rounds": [{"started_at": "2026-01-01T00:00:00Z", "submissions": {"ghost": []}}]
}"#,
    );
    let file_s = file.display().to_string();
    let out = run(&home, &["replay", &file_s]);
    assert_eq!(out.status.code(), Some(2));

    let logs = home.join(".config/huntboard/logs");
    let entries: Vec<_> = std::fs::read_dir(&logs)
        .expect("logs dir")
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(entries.len(), 1);
    let bytes = std::fs::read(entries[0].path()).expect("read log");
    let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse log");
    assert_eq!(v["status"], "error");
    assert_eq!(v["round_count"], 0);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn replay_out_of_range_initial_weight_exits_2() {
    let home = make_temp_home();
    let file = home.join("session.json");
    write_file(
        &file,
        br#"{"teams": [{"id": "red", "name": "Red", "initial_weights": {"xss": 5.0}}], "rounds": []}"#,
    );
    let file_s = file.display().to_string();
    let out = run(&home, &["replay", &file_s]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn score_malformed_json_exits_2() {
    let home = make_temp_home();
    let file = home.join("findings.json");
    write_file(&file, b"[{\"topic\": ");
    let file_s = file.display().to_string();
    let out = run(&home, &["score", &file_s]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn score_bad_started_at_exits_2() {
    let home = make_temp_home();
    let file = home.join("findings.json");
    write_file(&file, b"[]");
    let file_s = file.display().to_string();
    let out = run(&home, &["score", &file_s, "--started-at", "yesterday"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn cvss_bad_vector_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["cvss", "AV:X/AC:L"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_config_exits_2() {
    let home = make_temp_home();
    write_file(
        &home.join(".config/huntboard/config.toml"),
        b"[learner]\nexploration_rate = 1.5\n",
    );
    let out = run(&home, &["config", "--show"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unwritable_export_exits_20() {
    let home = make_temp_home();
    let blocker = home.join("blocker");
    write_file(&blocker, b"not a directory");
    let export = blocker.join("export.json").display().to_string();
    let out = run(&home, &["replay", fixture(), "--export", &export]);
    assert_eq!(out.status.code(), Some(20));
    let _ = std::fs::remove_dir_all(&home);
}
