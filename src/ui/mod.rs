use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{Severity, TopicWeights};
use crate::engine::{RoundSummary, Session};
use crate::learner::WeightChange;
use crate::metrics::{Award, Trend};
use crate::scoring::Scorecard;
use crate::scoring::cvss::CvssMetrics;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for per-round details");
    let _ = writeln!(stderr, "  - see `huntboard --help` for commands and options");
}

pub fn print_scorecard(card: &Scorecard, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    write_scorecard(&mut out, card, cfg);
}

pub fn print_session(session: &Session, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    write_session(&mut out, session, cfg);
}

/// Per-round details on stderr; only shown with `--verbose`.
pub fn eprint_round(summary: &RoundSummary, cfg: &UiConfig) {
    if !cfg.verbose {
        return;
    }
    let mut err = io::stderr().lock();
    write_round(&mut err, summary);
}

pub fn print_cvss(metrics: &CvssMetrics, score: f64, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{metrics}  base score: {score:.1} ({})", cvss_rating(score));
}

/// Qualitative CVSS v3 rating for a base score.
pub fn cvss_rating(score: f64) -> &'static str {
    if score == 0.0 {
        "none"
    } else if score < 4.0 {
        "low"
    } else if score < 7.0 {
        "medium"
    } else if score < 9.0 {
        "high"
    } else {
        "critical"
    }
}

fn write_scorecard(out: &mut dyn Write, card: &Scorecard, cfg: &UiConfig) {
    let _ = writeln!(
        out,
        "Summary: total={:.1}  findings={}  valid={}  false positives={} ({:.1}%)",
        card.total_score,
        card.total_findings,
        card.valid_findings,
        card.false_positives,
        card.false_positive_rate * 100.0
    );
    let _ = writeln!(
        out,
        "Unique discoveries: {}  average risk score: {:.2}",
        card.unique_discoveries, card.average_risk_score
    );

    let dist = Severity::ALL
        .iter()
        .map(|s| format!("{}={}", s, card.severity_distribution.get(*s)))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "Severity: {dist}");

    let rows = cfg.max_table_rows.min(card.top_findings.len());
    if rows == 0 {
        return;
    }
    let _ = writeln!(out);
    if card.top_findings.len() > rows {
        let _ = writeln!(out, "Top findings ({rows} of {}):", card.top_findings.len());
    } else {
        let _ = writeln!(out, "Top findings:");
    }

    let table: Vec<[String; 4]> = card
        .top_findings
        .iter()
        .take(rows)
        .map(|f| {
            [
                format!("{:.1}", f.score),
                format_severity(f.severity, cfg.color),
                truncate_middle(&f.topic, 32),
                truncate_middle(&f.location, 48),
            ]
        })
        .collect();
    write_table(out, ["Score", "Severity", "Topic", "Location"], &table, &[0]);
}

fn write_session(out: &mut dyn Write, session: &Session, cfg: &UiConfig) {
    let metrics = session.metrics();
    let Some(analysis) = metrics.comparative_analysis() else {
        let _ = writeln!(out, "No rounds recorded.");
        return;
    };

    let _ = writeln!(
        out,
        "Winner: {} ({})  score={:.1}  bugs={}  critical={}",
        analysis.overall_winner.team_name,
        analysis.overall_winner.team_id,
        analysis.overall_winner.total_score,
        analysis.overall_winner.total_bugs,
        analysis.overall_winner.critical_bugs
    );
    let stats = &analysis.statistics;
    let _ = writeln!(
        out,
        "Rounds: {}  total bugs: {}  average score: {:.1}  average bugs/team: {:.1}",
        stats.total_rounds, stats.total_bugs_found, stats.average_score, stats.average_bugs_per_team
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "Leaderboard:");
    let rows: Vec<[String; 5]> = analysis
        .leaderboard
        .iter()
        .take(cfg.max_table_rows.max(1))
        .map(|e| {
            [
                e.rank.to_string(),
                format!("{:.1}", e.score),
                e.bugs.to_string(),
                format_trend(e.trend, cfg.color),
                e.team_name.clone(),
            ]
        })
        .collect();
    write_table(out, ["#", "Score", "Bugs", "Trend", "Team"], &rows, &[0, 1, 2]);

    let _ = writeln!(out);
    let _ = writeln!(out, "Specialist awards:");
    let s = &analysis.specialists;
    write_award(out, "Critical bug hunter", s.critical_hunter.as_ref(), |v| format!("{v:.0} critical"));
    write_award(out, "Most accurate", s.most_accurate.as_ref(), |v| {
        format!("{:.1}% false positives", v * 100.0)
    });
    write_award(out, "Best coverage", s.best_coverage.as_ref(), |v| format!("{v:.0} unique"));
    write_award(out, "Best reporter", s.best_reporter.as_ref(), |v| format!("quality {v:.1}"));
    match &analysis.most_improved {
        Some(m) => {
            let _ = writeln!(
                out,
                "  Most improved: {} (+{:.1}, {:.1}/round)",
                m.team_name, m.improvement, m.improvement_per_round
            );
        }
        None => {
            let _ = writeln!(out, "  Most improved: -");
        }
    }

    for id in session.team_ids() {
        let name = metrics.team(id).map(|m| m.team_name.as_str()).unwrap_or(id);
        let _ = writeln!(out);
        let _ = writeln!(out, "{name}:");
        if let Some(weights) = session.weights(id) {
            let _ = writeln!(out, "  weights: {}", format_weights(weights));
        }
        for rec in session.recommendations(id).unwrap_or_default() {
            let _ = writeln!(out, "  - {rec}");
        }
    }
}

fn write_round(out: &mut dyn Write, summary: &RoundSummary) {
    let _ = writeln!(out, "round {}:", summary.round);
    for t in &summary.teams {
        let _ = writeln!(
            out,
            "  #{} {}  score={:.1} findings={} unique={} fp={} exploration={:.3}",
            t.rank, t.team_name, t.score, t.findings, t.unique, t.false_positives, t.exploration_rate
        );
        for c in &t.weight_changes {
            let _ = writeln!(out, "    {}", format_change(c));
        }
    }
}

fn write_award<F>(out: &mut dyn Write, title: &str, award: Option<&Award>, value: F)
where
    F: Fn(f64) -> String,
{
    match award {
        Some(a) => {
            let _ = writeln!(out, "  {title}: {} ({})", a.team_name, value(a.value));
        }
        None => {
            let _ = writeln!(out, "  {title}: -");
        }
    }
}

fn format_change(c: &WeightChange) -> String {
    format!(
        "{}: {:.2} -> {:.2} ({})",
        c.topic, c.old_weight, c.new_weight, c.reason
    )
}

pub fn format_weights(weights: &TopicWeights) -> String {
    weights
        .ranked()
        .iter()
        .map(|(t, w)| format!("{t}={w:.2}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_severity(severity: Option<Severity>, color: bool) -> String {
    let Some(severity) = severity else {
        return "unknown".to_string();
    };
    if !color {
        return severity.to_string();
    }
    let code = match severity {
        Severity::Critical => "31",
        Severity::High => "33",
        Severity::Medium => "36",
        Severity::Low => "32",
        Severity::Info => "90",
    };
    format!("\x1b[{code}m{severity}\x1b[0m")
}

fn format_trend(trend: Trend, color: bool) -> String {
    if !color {
        return trend.to_string();
    }
    let code = match trend {
        Trend::Improving => "32",
        Trend::Declining => "31",
        Trend::Stable => "90",
    };
    format!("\x1b[{code}m{trend}\x1b[0m")
}

/// Columns listed in `right` are right-aligned; the last column is never padded.
fn write_table<const N: usize>(
    out: &mut dyn Write,
    header: [&str; N],
    rows: &[[String; N]],
    right: &[usize],
) {
    let mut widths = header.map(visible_width_ansi);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(visible_width_ansi(cell));
        }
    }

    let line = |cells: Vec<String>| -> String {
        let last = cells.len().saturating_sub(1);
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i == last {
                    c.clone()
                } else if right.contains(&i) {
                    pad_start_display(c, widths[i])
                } else {
                    pad_end_display(c, widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let _ = writeln!(out, "{}", line(header.iter().map(|h| h.to_string()).collect()));
    let _ = writeln!(
        out,
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    );
    for row in rows {
        let _ = writeln!(out, "{}", line(row.to_vec()));
    }
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s.chars().skip(len - right).collect();

    format!("{prefix}...{suffix}")
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Finding, WeightBounds};
    use crate::scoring::Scorer;
    use time::macros::datetime;

    fn plain() -> UiConfig {
        UiConfig {
            color: false,
            max_table_rows: 20,
            quiet: false,
            verbose: false,
        }
    }

    #[test]
    fn width_ignores_ansi_and_counts_wide_chars() {
        assert_eq!(visible_width_ansi("\x1b[31mhigh\x1b[0m"), 4);
        assert_eq!(visible_width_ansi("脆弱性"), 6);
        assert_eq!(pad_end_display("脆弱", 6), "脆弱  ");
    }

    #[test]
    fn truncate_middle_keeps_both_ends() {
        assert_eq!(truncate_middle("abcdefghij", 7), "ab...ij");
        assert_eq!(truncate_middle("short", 7), "short");
    }

    #[test]
    fn scorecard_table_lists_top_findings() {
        let start = datetime!(2026-01-01 0:00 UTC);
        let mut findings = vec![
            Finding::new("sql_injection", "db/query.rs:42", Severity::Critical, 9.8, start)
                .with_description("Unsanitized id parameter reaches the SQL string")
                .with_evidence("id=1 OR 1=1 dumps the users table"),
        ];
        Scorer::new(start).score_batch(&mut findings);
        let card = Scorecard::from_findings(&findings, 5);

        let mut buf = Vec::new();
        write_scorecard(&mut buf, &card, &plain());
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Top findings:"));
        assert!(text.contains("critical"));
        assert!(text.contains("db/query.rs:42"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn weights_render_heaviest_first() {
        let w = TopicWeights::from_pairs([("a", 0.5), ("b", 1.5)], WeightBounds::default())
            .expect("valid weights");
        assert_eq!(format_weights(&w), "b=1.50 a=0.50");
    }

    #[test]
    fn cvss_ratings_follow_bands() {
        assert_eq!(cvss_rating(0.0), "none");
        assert_eq!(cvss_rating(3.9), "low");
        assert_eq!(cvss_rating(6.5), "medium");
        assert_eq!(cvss_rating(9.8), "critical");
    }
}
