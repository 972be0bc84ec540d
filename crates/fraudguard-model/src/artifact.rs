// Persisted model artifact: a topology descriptor plus the serialized
// weights, optimizer state and feature normalization table.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::{AdamState, Network, INPUT_SIZE, LAYER_SIZES, LEARNING_RATE, L2_PENALTY};

const TOPOLOGY_FILE: &str = "topology.json";
const WEIGHTS_FILE: &str = "weights.json";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model artifact decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("model artifact mismatch: {0}")]
    Mismatch(String),

    #[error("model unavailable")]
    Unavailable,
}

/// Normalization statistics for one feature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeatureStat {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topology {
    pub layer_sizes: Vec<usize>,
    pub hidden_activation: String,
    pub output_activation: String,
    pub learning_rate: f64,
    pub l2_penalty: f64,
}

impl Topology {
    pub fn current() -> Self {
        Self {
            layer_sizes: LAYER_SIZES.to_vec(),
            hidden_activation: "relu".to_string(),
            output_activation: "sigmoid".to_string(),
            learning_rate: LEARNING_RATE,
            l2_penalty: L2_PENALTY,
        }
    }
}

/// Running quality counters fed by labeled online updates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub samples: u64,
    pub correct: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl TrainingMetrics {
    pub fn observe(&mut self, predicted_fraud: bool, actual_fraud: bool) {
        self.samples += 1;
        if predicted_fraud == actual_fraud {
            self.correct += 1;
        }
        match (predicted_fraud, actual_fraud) {
            (true, true) => self.true_positives += 1,
            (true, false) => self.false_positives += 1,
            (false, true) => self.false_negatives += 1,
            (false, false) => {}
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.correct as f64 / self.samples as f64
    }

    pub fn precision(&self) -> f64 {
        let denominator = self.true_positives + self.false_positives;
        if denominator == 0 {
            return 0.0;
        }
        self.true_positives as f64 / denominator as f64
    }

    pub fn recall(&self) -> f64 {
        let denominator = self.true_positives + self.false_negatives;
        if denominator == 0 {
            return 0.0;
        }
        self.true_positives as f64 / denominator as f64
    }
}

/// The weight side of the artifact. `version` mirrors the KV
/// `model.version` counter at the time of the last persisted update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsArtifact {
    pub version: u64,
    pub feature_stats: Vec<FeatureStat>,
    pub network: Network,
    pub adam: AdamState,
    pub metrics: TrainingMetrics,
}

impl WeightsArtifact {
    pub fn new(feature_stats: Vec<FeatureStat>) -> Self {
        let network = Network::new();
        let adam = AdamState::for_network(&network);
        Self {
            version: 0,
            feature_stats,
            network,
            adam,
            metrics: TrainingMetrics::default(),
        }
    }

    /// Write topology descriptor and weights under `dir`, creating it as
    /// needed.
    pub fn save(&self, dir: &Path) -> Result<(), ModelError> {
        fs::create_dir_all(dir)?;
        let topology = serde_json::to_vec_pretty(&Topology::current())?;
        fs::write(dir.join(TOPOLOGY_FILE), topology)?;
        let weights = serde_json::to_vec(self)?;
        fs::write(dir.join(WEIGHTS_FILE), weights)?;
        Ok(())
    }

    /// Load and validate a persisted artifact from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let topology: Topology =
            serde_json::from_slice(&fs::read(dir.join(TOPOLOGY_FILE))?)?;
        if topology != Topology::current() {
            return Err(ModelError::Mismatch(format!(
                "persisted topology {:?} differs from {:?}",
                topology.layer_sizes, LAYER_SIZES
            )));
        }

        let artifact: WeightsArtifact =
            serde_json::from_slice(&fs::read(dir.join(WEIGHTS_FILE))?)?;
        if artifact.feature_stats.len() != INPUT_SIZE {
            return Err(ModelError::Mismatch(format!(
                "feature stats table has {} entries, expected {INPUT_SIZE}",
                artifact.feature_stats.len()
            )));
        }
        Ok(artifact)
    }
}
