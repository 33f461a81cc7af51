use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::WeightBounds;
use crate::engine::SessionOptions;
use crate::learner::{DEFAULT_SEED, LearnerParams};

pub const CONFIG_ENV: &str = "HUNTBOARD_CONFIG";

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub learner: LearnerConfig,
    pub scoring: ScoringConfig,
    pub ui: UiConfig,
    pub logs: LogsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearnerConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub exploration_rate: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    pub seed: u64,
    pub adaptive_exploration: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringConfig {
    pub top_findings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        let params = LearnerParams::default();
        Self {
            learner: LearnerConfig {
                learning_rate: params.learning_rate,
                discount_factor: params.discount_factor,
                exploration_rate: params.exploration_rate,
                min_weight: params.bounds.min,
                max_weight: params.bounds.max,
                seed: DEFAULT_SEED,
                adaptive_exploration: false,
            },
            scoring: ScoringConfig { top_findings: 5 },
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            logs: LogsConfig {
                enabled: true,
                dir: None,
            },
            config_path: None,
        }
    }
}

impl EffectiveConfig {
    /// Learner settings as session options. Only valid after [`load`] has
    /// checked the bounds.
    pub fn session_options(&self) -> Result<SessionOptions> {
        let l = &self.learner;
        let bounds = WeightBounds::new(l.min_weight, l.max_weight)?;
        Ok(SessionOptions {
            params: LearnerParams {
                learning_rate: l.learning_rate,
                discount_factor: l.discount_factor,
                exploration_rate: l.exploration_rate,
                bounds,
            },
            seed: l.seed,
            adaptive_exploration: l.adaptive_exploration,
        })
    }

    pub fn logs_dir(&self, home_dir: &Path) -> PathBuf {
        match &self.logs.dir {
            Some(dir) => PathBuf::from(dir),
            None => home_dir.join(".config/huntboard/logs"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    learner: Option<RawLearnerConfig>,
    scoring: Option<RawScoringConfig>,
    ui: Option<RawUiConfig>,
    logs: Option<RawLogsConfig>,
}

#[derive(Debug, Deserialize)]
struct RawLearnerConfig {
    learning_rate: Option<f64>,
    discount_factor: Option<f64>,
    exploration_rate: Option<f64>,
    min_weight: Option<f64>,
    max_weight: Option<f64>,
    seed: Option<u64>,
    adaptive_exploration: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawScoringConfig {
    top_findings: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawLogsConfig {
    enabled: Option<bool>,
    dir: Option<String>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/huntboard/config.toml")
}

/// Defaults, then the config file, then `HUNTBOARD_*` environment overrides.
///
/// An explicit path (flag or `HUNTBOARD_CONFIG`) must exist; the default
/// path is optional.
pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let explicit = config_path.map(ToOwned::to_owned).or_else(|| {
        std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    });
    let required = explicit.is_some();
    let path = explicit.unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if required {
        anyhow::bail!("config file not found: {}", path.display());
    }

    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(learner) = raw.learner {
        let l = &mut cfg.learner;
        if let Some(v) = learner.learning_rate {
            l.learning_rate = v;
        }
        if let Some(v) = learner.discount_factor {
            l.discount_factor = v;
        }
        if let Some(v) = learner.exploration_rate {
            l.exploration_rate = v;
        }
        if let Some(v) = learner.min_weight {
            l.min_weight = v;
        }
        if let Some(v) = learner.max_weight {
            l.max_weight = v;
        }
        if let Some(v) = learner.seed {
            l.seed = v;
        }
        if let Some(v) = learner.adaptive_exploration {
            l.adaptive_exploration = v;
        }
    }

    if let Some(scoring) = raw.scoring {
        if let Some(top_findings) = scoring.top_findings {
            cfg.scoring.top_findings = top_findings;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(logs) = raw.logs {
        if let Some(enabled) = logs.enabled {
            cfg.logs.enabled = enabled;
        }
        if let Some(dir) = logs.dir {
            cfg.logs.dir = Some(dir);
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("HUNTBOARD_LEARNER_LEARNING_RATE") {
        cfg.learner.learning_rate = parse_f64(&v).context("HUNTBOARD_LEARNER_LEARNING_RATE")?;
    }
    if let Ok(v) = std::env::var("HUNTBOARD_LEARNER_EXPLORATION_RATE") {
        cfg.learner.exploration_rate =
            parse_f64(&v).context("HUNTBOARD_LEARNER_EXPLORATION_RATE")?;
    }
    if let Ok(v) = std::env::var("HUNTBOARD_LEARNER_SEED") {
        cfg.learner.seed = parse_seed(&v).context("HUNTBOARD_LEARNER_SEED")?;
    }
    if let Ok(v) = std::env::var("HUNTBOARD_LEARNER_ADAPTIVE_EXPLORATION") {
        cfg.learner.adaptive_exploration =
            parse_bool(&v).context("HUNTBOARD_LEARNER_ADAPTIVE_EXPLORATION")?;
    }
    if let Ok(v) = std::env::var("HUNTBOARD_SCORING_TOP_FINDINGS") {
        cfg.scoring.top_findings = v
            .trim()
            .parse::<usize>()
            .context("HUNTBOARD_SCORING_TOP_FINDINGS")?;
    }
    if let Ok(v) = std::env::var("HUNTBOARD_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).context("HUNTBOARD_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("HUNTBOARD_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .context("HUNTBOARD_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("HUNTBOARD_LOGS_ENABLED") {
        cfg.logs.enabled = parse_bool(&v).context("HUNTBOARD_LOGS_ENABLED")?;
    }
    if let Ok(v) = std::env::var("HUNTBOARD_LOGS_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.logs.dir = Some(v.to_string());
        }
    }

    Ok(())
}

fn validate(cfg: &EffectiveConfig) -> Result<()> {
    let l = &cfg.learner;
    for (name, v) in [
        ("learner.learning_rate", l.learning_rate),
        ("learner.discount_factor", l.discount_factor),
        ("learner.exploration_rate", l.exploration_rate),
    ] {
        if !(0.0..=1.0).contains(&v) {
            anyhow::bail!("{name} must be within [0, 1] (got {v})");
        }
    }
    WeightBounds::new(l.min_weight, l.max_weight).context("learner.min_weight / learner.max_weight")?;
    Ok(())
}

fn parse_f64(s: &str) -> Result<f64> {
    let v = s.trim().parse::<f64>()?;
    if !v.is_finite() {
        anyhow::bail!("not a finite number: {}", s.trim());
    }
    Ok(v)
}

/// Decimal or `0x`-prefixed hexadecimal.
fn parse_seed(s: &str) -> Result<u64> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.with_context(|| format!("invalid seed: {s}"))
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_override_defaults_field_by_field() {
        let raw: RawConfig = toml::from_str(
            r#"
            [learner]
            learning_rate = 0.3
            seed = 42

            [logs]
            enabled = false
            "#,
        )
        .expect("valid toml");
        let mut cfg = EffectiveConfig::default();
        apply_raw_config(&mut cfg, raw);
        assert_eq!(cfg.learner.learning_rate, 0.3);
        assert_eq!(cfg.learner.seed, 42);
        assert_eq!(cfg.learner.exploration_rate, 0.1);
        assert!(!cfg.logs.enabled);
        assert_eq!(cfg.scoring.top_findings, 5);
    }

    #[test]
    fn validation_catches_bad_rates_and_bounds() {
        let mut cfg = EffectiveConfig::default();
        assert!(validate(&cfg).is_ok());
        cfg.learner.exploration_rate = 1.5;
        assert!(validate(&cfg).is_err());

        let mut cfg = EffectiveConfig::default();
        cfg.learner.min_weight = 3.0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn seeds_parse_in_decimal_and_hex() {
        assert_eq!(parse_seed("42").ok(), Some(42));
        assert_eq!(parse_seed(" 0x2A ").ok(), Some(42));
        assert!(parse_seed("zz").is_err());
    }

    #[test]
    fn session_options_carry_learner_settings() {
        let opts = EffectiveConfig::default()
            .session_options()
            .expect("default bounds are valid");
        assert_eq!(opts.params, LearnerParams::default());
        assert_eq!(opts.seed, DEFAULT_SEED);
        assert!(!opts.adaptive_exploration);
    }
}
