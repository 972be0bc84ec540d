pub mod artifact;
pub mod network;
pub mod scorer;

pub use artifact::{FeatureStat, ModelError, Topology, TrainingMetrics, WeightsArtifact};
pub use network::{AdamState, Network};
pub use scorer::{fallback_score, RiskScorer};
