use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::CoreError;

const MAX_TOPIC_LEN: usize = 128;

/// Caller-defined category key. Topics form an open set; the only rules are
/// that a name is non-empty after trimming, short, and free of control characters.
/// Canonical spelling of a topic name. Weight vectors and findings both go
/// through this, so `" xss "` and `"xss"` name the same topic.
pub(crate) fn topic_key(name: &str) -> &str {
    name.trim()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        let trimmed = topic_key(&name);
        if trimmed.is_empty() {
            return Err(CoreError::InvalidTopic {
                name,
                reason: "empty",
            });
        }
        if trimmed.chars().count() > MAX_TOPIC_LEN {
            return Err(CoreError::InvalidTopic {
                name,
                reason: "longer than 128 characters",
            });
        }
        if trimmed.chars().any(char::is_control) {
            return Err(CoreError::InvalidTopic {
                name,
                reason: "contains control characters",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Topic {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Topic::new(value)
    }
}

impl From<Topic> for String {
    fn from(value: Topic) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self { min: 0.1, max: 2.0 }
    }
}

impl WeightBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, CoreError> {
        if !min.is_finite() || !max.is_finite() || min <= 0.0 || min > max {
            return Err(CoreError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn clamp(&self, weight: f64) -> f64 {
        if weight.is_nan() {
            return self.min;
        }
        weight.clamp(self.min, self.max)
    }

    pub fn contains(&self, weight: f64) -> bool {
        weight >= self.min && weight <= self.max
    }
}

/// Per-team emphasis on each topic. Iteration is in topic order, which keeps
/// adaptation deterministic for a given random source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicWeights(BTreeMap<Topic, f64>);

impl TopicWeights {
    /// Builds a vector from raw pairs, rejecting bad names and out-of-range weights.
    pub fn from_pairs<I, K>(pairs: I, bounds: WeightBounds) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, weight) in pairs {
            map.insert(Topic::new(name)?, weight);
        }
        let weights = Self(map);
        weights.validate(bounds)?;
        Ok(weights)
    }

    pub fn validate(&self, bounds: WeightBounds) -> Result<(), CoreError> {
        if self.0.is_empty() {
            return Err(CoreError::EmptyWeights);
        }
        for (topic, &weight) in &self.0 {
            if !bounds.contains(weight) {
                return Err(CoreError::WeightOutOfRange {
                    topic: topic.to_string(),
                    weight,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, topic: &str) -> Option<f64> {
        self.0.get(topic).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Topic, f64)> {
        self.0.iter().map(|(t, w)| (t, *w))
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Topics sorted by weight, heaviest first; equal weights keep topic order.
    pub fn ranked(&self) -> Vec<(&Topic, f64)> {
        let mut ranked: Vec<(&Topic, f64)> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Rescaled copy whose mean weight is 1.0. Advisory only; the adapter
    /// never normalizes on its own.
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total == 0.0 {
            return self.clone();
        }
        let factor = self.0.len() as f64 / total;
        Self(
            self.0
                .iter()
                .map(|(t, w)| (t.clone(), w * factor))
                .collect(),
        )
    }

    pub(crate) fn set(&mut self, topic: Topic, weight: f64) {
        self.0.insert(topic, weight);
    }
}
