use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::EffectiveConfig;
use crate::core::{Finding, TopicWeights};
use crate::engine::{RoundSummary, Session, SessionFile};
use crate::learner::{LearningSnapshot, Recommendation};
use crate::metrics::MetricsExport;
use crate::scoring::cvss::{self, CvssMetrics};
use crate::scoring::{Scorecard, Scorer};
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "huntboard",
    version,
    about = "Score bug-hunting rounds between competing teams, adapt their topic weights, and rank them"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Score a JSON array of findings and print a scorecard.
    Score(ScoreArgs),
    /// Play every round of a session file and print the final standings.
    Replay(ReplayArgs),
    /// Compute a CVSS v3.1 base score from a vector string.
    Cvss(CvssArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ScoreArgs {
    pub file: PathBuf,
    /// Round start (RFC 3339). Defaults to the earliest `discovered_at`.
    #[arg(long)]
    pub started_at: Option<String>,
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    pub file: PathBuf,
    /// Write metrics and learner snapshots as JSON to this path.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CvssArgs {
    pub vector: String,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let home_dir = home_dir()?;
    let cfg = crate::config::load(cli.config.as_deref(), &home_dir)
        .map_err(crate::exit::invalid_args_err)?;

    let color = io::stdout().is_terminal() && cfg.ui.color && !cli.no_color;
    let ui_cfg = UiConfig {
        color,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Score(args) => cmd_score(&args, &cfg, &ui_cfg, cli.json)?,
        Commands::Replay(args) => cmd_replay(&args, &cfg, &ui_cfg, &home_dir, cli.json)?,
        Commands::Cvss(args) => {
            let metrics: CvssMetrics = args
                .vector
                .parse()
                .map_err(|e| crate::exit::invalid_args_err(anyhow::Error::from(e)))?;
            let score = cvss::base_score(&metrics);
            if cli.json {
                write_json(&CvssOutput {
                    vector: metrics.to_string(),
                    base_score: score,
                    rating: crate::ui::cvss_rating(score),
                })?;
            } else {
                crate::ui::print_cvss(&metrics, score, &ui_cfg);
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "huntboard", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `huntboard config --show`");
            }
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct CvssOutput {
    vector: String,
    base_score: f64,
    rating: &'static str,
}

#[derive(Debug, Serialize)]
struct ScoreOutput<'a> {
    #[serde(with = "time::serde::rfc3339")]
    round_started_at: OffsetDateTime,
    scorecard: &'a Scorecard,
    findings: &'a [Finding],
}

#[derive(Debug, Serialize)]
struct ReplayOutput<'a> {
    rounds: &'a [RoundSummary],
    metrics: MetricsExport<'a>,
    final_weights: BTreeMap<String, TopicWeights>,
    recommendations: BTreeMap<String, Vec<Recommendation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportFile<'a> {
    schema_version: &'static str,
    tool_version: &'static str,
    exported_at: String,
    metrics: MetricsExport<'a>,
    learning: BTreeMap<String, LearningSnapshot>,
}

fn cmd_score(args: &ScoreArgs, cfg: &EffectiveConfig, ui_cfg: &UiConfig, json: bool) -> Result<()> {
    let s = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read findings file: {}", args.file.display()))
        .map_err(crate::exit::invalid_args_err)?;
    let mut findings: Vec<Finding> = serde_json::from_str(&s)
        .with_context(|| format!("failed to parse findings file: {}", args.file.display()))
        .map_err(crate::exit::invalid_args_err)?;

    let started_at = match args.started_at.as_deref() {
        Some(v) => OffsetDateTime::parse(v.trim(), &Rfc3339)
            .with_context(|| format!("--started-at is not RFC 3339: {v}"))
            .map_err(crate::exit::invalid_args_err)?,
        None => findings
            .iter()
            .map(|f| f.discovered_at)
            .min()
            .unwrap_or_else(OffsetDateTime::now_utc),
    };

    Scorer::new(started_at).score_batch(&mut findings);
    let top = args.top.unwrap_or(cfg.scoring.top_findings);
    let card = Scorecard::from_findings(&findings, top);

    if json {
        write_json(&ScoreOutput {
            round_started_at: started_at,
            scorecard: &card,
            findings: &findings,
        })
    } else {
        crate::ui::print_scorecard(&card, ui_cfg);
        Ok(())
    }
}

fn cmd_replay(
    args: &ReplayArgs,
    cfg: &EffectiveConfig,
    ui_cfg: &UiConfig,
    home_dir: &Path,
    json: bool,
) -> Result<()> {
    let started_at = OffsetDateTime::now_utc();
    let file = SessionFile::from_path(&args.file)?;
    let opts = cfg.session_options().map_err(crate::exit::invalid_args_err)?;
    let mut session = Session::from_file(opts, &file)?;

    let mut rounds = Vec::with_capacity(file.rounds.len());
    let failure = session
        .replay(&file, |summary| {
            crate::ui::eprint_round(&summary, ui_cfg);
            rounds.push(summary);
        })
        .err();

    let log_path = if cfg.logs.enabled {
        let error = failure.as_ref().map(|e| format!("{e:#}"));
        let path = crate::logs::write_session_log(
            &cfg.logs_dir(home_dir),
            started_at,
            OffsetDateTime::now_utc(),
            &crate::logs::SessionLog {
                command: "replay",
                source: &args.file,
                session: &session,
                rounds: &rounds,
                error: error.as_deref(),
            },
        )
        .map_err(|e| crate::exit::output_err(e.context("failed to write session log")))?;
        if ui_cfg.verbose {
            eprintln!("log: {}", path.display());
        }
        Some(path)
    } else {
        None
    };

    if let Some(err) = failure {
        return Err(err);
    }

    if let Some(export) = &args.export {
        write_export(export, &session)?;
    }

    if json {
        let recommendations = session
            .team_ids()
            .map(|id| (id.to_string(), session.recommendations(id).unwrap_or_default()))
            .collect();
        write_json(&ReplayOutput {
            rounds: &rounds,
            metrics: session.metrics().export(),
            final_weights: session.final_weights(),
            recommendations,
            log_path: log_path.map(|p| p.display().to_string()),
        })
    } else {
        crate::ui::print_session(&session, ui_cfg);
        Ok(())
    }
}

fn write_export(path: &Path, session: &Session) -> Result<()> {
    let export = ExportFile {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION"),
        exported_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        metrics: session.metrics().export(),
        learning: session.snapshots(),
    };
    let buf = serde_json::to_vec_pretty(&export).context("failed to serialize export")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))
            .map_err(crate::exit::output_err)?;
    }
    std::fs::write(path, buf)
        .with_context(|| format!("failed to write export: {}", path.display()))
        .map_err(crate::exit::output_err)
}

fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(crate::exit::output_err(err.into())),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(crate::exit::output_err(err.into())),
    }
}

fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("HOME is not set"))
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
