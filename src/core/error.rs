use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid topic {name:?}: {reason}")]
    InvalidTopic { name: String, reason: &'static str },
    #[error("weight for {topic} is {weight}, outside [{min}, {max}]")]
    WeightOutOfRange {
        topic: String,
        weight: f64,
        min: f64,
        max: f64,
    },
    #[error("weight bounds are invalid: min={min} max={max}")]
    InvalidBounds { min: f64, max: f64 },
    #[error("weight vector is empty")]
    EmptyWeights,
    #[error("invalid CVSS vector: {0}")]
    InvalidCvss(String),
}
