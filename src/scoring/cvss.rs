//! Simplified CVSS v3.1 base score.
//!
//! Produces the 0.0–10.0 risk value that findings carry as `risk_score`.
//! Metric weights follow the v3.1 tables; the scope-changed impact curve is
//! the published one, but privileges-required is not rescaled for changed scope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackVector {
    Network,
    Adjacent,
    Local,
    Physical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackComplexity {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegesRequired {
    None,
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserInteraction {
    None,
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Unchanged,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    None,
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvssMetrics {
    pub attack_vector: AttackVector,
    pub attack_complexity: AttackComplexity,
    pub privileges_required: PrivilegesRequired,
    pub user_interaction: UserInteraction,
    pub scope: Scope,
    pub confidentiality: Impact,
    pub integrity: Impact,
    pub availability: Impact,
}

impl Default for CvssMetrics {
    fn default() -> Self {
        Self {
            attack_vector: AttackVector::Network,
            attack_complexity: AttackComplexity::Low,
            privileges_required: PrivilegesRequired::None,
            user_interaction: UserInteraction::None,
            scope: Scope::Unchanged,
            confidentiality: Impact::High,
            integrity: Impact::High,
            availability: Impact::High,
        }
    }
}

impl AttackVector {
    const fn weight(self) -> f64 {
        match self {
            AttackVector::Network => 0.85,
            AttackVector::Adjacent => 0.62,
            AttackVector::Local => 0.55,
            AttackVector::Physical => 0.2,
        }
    }
}

impl AttackComplexity {
    const fn weight(self) -> f64 {
        match self {
            AttackComplexity::Low => 0.77,
            AttackComplexity::High => 0.44,
        }
    }
}

impl PrivilegesRequired {
    const fn weight(self) -> f64 {
        match self {
            PrivilegesRequired::None => 0.85,
            PrivilegesRequired::Low => 0.62,
            PrivilegesRequired::High => 0.27,
        }
    }
}

impl UserInteraction {
    const fn weight(self) -> f64 {
        match self {
            UserInteraction::None => 0.85,
            UserInteraction::Required => 0.62,
        }
    }
}

impl Impact {
    const fn weight(self) -> f64 {
        match self {
            Impact::None => 0.0,
            Impact::Low => 0.22,
            Impact::High => 0.56,
        }
    }
}

pub fn base_score(m: &CvssMetrics) -> f64 {
    let exploitability = 8.22
        * m.attack_vector.weight()
        * m.attack_complexity.weight()
        * m.privileges_required.weight()
        * m.user_interaction.weight();

    let iss = 1.0
        - (1.0 - m.confidentiality.weight())
            * (1.0 - m.integrity.weight())
            * (1.0 - m.availability.weight());

    let impact = match m.scope {
        Scope::Unchanged => 6.42 * iss,
        Scope::Changed => 7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powi(15),
    };
    if impact <= 0.0 {
        return 0.0;
    }

    let raw = match m.scope {
        Scope::Unchanged => (impact + exploitability).min(10.0),
        Scope::Changed => (1.08 * (impact + exploitability)).min(10.0),
    };
    (raw * 10.0).round() / 10.0
}

impl FromStr for CvssMetrics {
    type Err = CoreError;

    /// Parses `AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H`, with or without a
    /// `CVSS:3.x/` prefix. Metrics left out keep their defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut m = CvssMetrics::default();
        let bad = |part: &str| CoreError::InvalidCvss(format!("unrecognized component {part:?}"));

        for part in s.trim().split('/').filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once(':') else {
                return Err(bad(part));
            };
            match (key.to_ascii_uppercase().as_str(), value.to_ascii_uppercase().as_str()) {
                ("CVSS", _) => {}
                ("AV", "N") => m.attack_vector = AttackVector::Network,
                ("AV", "A") => m.attack_vector = AttackVector::Adjacent,
                ("AV", "L") => m.attack_vector = AttackVector::Local,
                ("AV", "P") => m.attack_vector = AttackVector::Physical,
                ("AC", "L") => m.attack_complexity = AttackComplexity::Low,
                ("AC", "H") => m.attack_complexity = AttackComplexity::High,
                ("PR", "N") => m.privileges_required = PrivilegesRequired::None,
                ("PR", "L") => m.privileges_required = PrivilegesRequired::Low,
                ("PR", "H") => m.privileges_required = PrivilegesRequired::High,
                ("UI", "N") => m.user_interaction = UserInteraction::None,
                ("UI", "R") => m.user_interaction = UserInteraction::Required,
                ("S", "U") => m.scope = Scope::Unchanged,
                ("S", "C") => m.scope = Scope::Changed,
                ("C", v) => m.confidentiality = parse_impact(v).ok_or_else(|| bad(part))?,
                ("I", v) => m.integrity = parse_impact(v).ok_or_else(|| bad(part))?,
                ("A", v) => m.availability = parse_impact(v).ok_or_else(|| bad(part))?,
                _ => return Err(bad(part)),
            }
        }
        Ok(m)
    }
}

fn parse_impact(v: &str) -> Option<Impact> {
    match v {
        "N" => Some(Impact::None),
        "L" => Some(Impact::Low),
        "H" => Some(Impact::High),
        _ => None,
    }
}

impl fmt::Display for CvssMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let av = match self.attack_vector {
            AttackVector::Network => "N",
            AttackVector::Adjacent => "A",
            AttackVector::Local => "L",
            AttackVector::Physical => "P",
        };
        let ac = match self.attack_complexity {
            AttackComplexity::Low => "L",
            AttackComplexity::High => "H",
        };
        let pr = match self.privileges_required {
            PrivilegesRequired::None => "N",
            PrivilegesRequired::Low => "L",
            PrivilegesRequired::High => "H",
        };
        let ui = match self.user_interaction {
            UserInteraction::None => "N",
            UserInteraction::Required => "R",
        };
        let s = match self.scope {
            Scope::Unchanged => "U",
            Scope::Changed => "C",
        };
        let imp = |i: Impact| match i {
            Impact::None => "N",
            Impact::Low => "L",
            Impact::High => "H",
        };
        write!(
            f,
            "AV:{av}/AC:{ac}/PR:{pr}/UI:{ui}/S:{s}/C:{}/I:{}/A:{}",
            imp(self.confidentiality),
            imp(self.integrity),
            imp(self.availability)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vector_is_9_8() {
        assert_eq!(base_score(&CvssMetrics::default()), 9.8);
    }

    #[test]
    fn no_impact_scores_zero() {
        let m: CvssMetrics = "AV:N/AC:L/PR:N/UI:N/S:U/C:N/I:N/A:N".parse().expect("parse");
        assert_eq!(base_score(&m), 0.0);
    }

    #[test]
    fn changed_scope_is_capped_at_ten() {
        let m: CvssMetrics = "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:C/C:H/I:H/A:H".parse().expect("parse");
        assert_eq!(m.scope, Scope::Changed);
        assert_eq!(base_score(&m), 10.0);
    }

    #[test]
    fn local_low_impact_is_moderate() {
        let m: CvssMetrics = "AV:L/AC:H/PR:L/UI:R/S:U/C:L/I:N/A:N".parse().expect("parse");
        let score = base_score(&m);
        assert!(score > 0.0 && score < 4.0, "{score}");
    }

    #[test]
    fn display_round_trips_through_parse() {
        let m: CvssMetrics = "av:p/ac:h/pr:h/ui:r/s:c/c:l/i:h/a:n".parse().expect("parse");
        let again: CvssMetrics = m.to_string().parse().expect("reparse");
        assert_eq!(m, again);
    }

    #[test]
    fn rejects_unknown_components() {
        assert!("AV:X".parse::<CvssMetrics>().is_err());
        assert!("ZZ:N".parse::<CvssMetrics>().is_err());
        assert!("AVN".parse::<CvssMetrics>().is_err());
    }
}
