mod error;
mod finding;
mod result;
mod severity;
mod topic;

pub use error::CoreError;
pub use finding::Finding;
pub use result::TeamRoundResult;
pub use severity::{Severity, SeverityCounts};
pub use topic::{Topic, TopicWeights, WeightBounds};
