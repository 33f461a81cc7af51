use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::core::Severity;
use crate::core::topic::topic_key;

/// One reported issue plus the annotations the scorer attaches to it.
///
/// Text fields read as empty strings when absent, `null` or not a string, so
/// partial reports still deserialize; they only ever lower the quality bonus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default, deserialize_with = "lenient_topic")]
    pub topic: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: String,
    #[serde(default, deserialize_with = "crate::core::severity::deserialize_lenient")]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub risk_score: f64,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub evidence: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub remediation: String,
    #[serde(with = "time::serde::rfc3339")]
    pub discovered_at: OffsetDateTime,
    #[serde(default, deserialize_with = "lenient_text")]
    pub team: String,

    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_false_positive: bool,
    #[serde(default)]
    pub quality_score: f64,
    #[serde(default)]
    pub speed_bonus: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
}

impl Finding {
    pub fn new(
        topic: impl Into<String>,
        location: impl Into<String>,
        severity: Severity,
        risk_score: f64,
        discovered_at: OffsetDateTime,
    ) -> Self {
        let topic: String = topic.into();
        Self {
            topic: topic_key(&topic).to_string(),
            location: location.into(),
            severity: Some(severity),
            risk_score,
            description: String::new(),
            evidence: String::new(),
            remediation: String::new(),
            discovered_at,
            team: String::new(),
            is_unique: false,
            is_false_positive: false,
            quality_score: 0.0,
            speed_bonus: 0.0,
            total_score: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    pub fn unique(mut self, is_unique: bool) -> Self {
        self.is_unique = is_unique;
        self
    }

    /// Cross-team duplicate key: `topic:location:severity`.
    pub fn signature(&self) -> String {
        let severity = self.severity.map(Severity::as_str).unwrap_or("unknown");
        format!("{}:{}:{}", self.topic, self.location, severity)
    }

    pub fn is_scored(&self) -> bool {
        self.total_score.is_some()
    }

    /// Scored points, or 0 for a finding that has not been through the scorer.
    pub fn points(&self) -> f64 {
        self.total_score.unwrap_or(0.0)
    }

    /// Seconds from `round_started_at` to discovery. Discoveries stamped
    /// before the round start count as immediate.
    pub fn elapsed_secs(&self, round_started_at: OffsetDateTime) -> f64 {
        let elapsed = self.discovered_at - round_started_at;
        elapsed.as_seconds_f64().max(0.0)
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        _ => Ok(String::new()),
    }
}

fn lenient_topic<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_text(deserializer).map(|s| topic_key(&s).to_string())
}
