// Online risk scorer: snapshot reads for concurrent predictions, serialized
// single-sample updates, persistence outside the critical section.
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use fraudguard_store::kv::KvStore;

use crate::artifact::{FeatureStat, ModelError, TrainingMetrics, WeightsArtifact};
use crate::network::INPUT_SIZE;

pub const MODEL_VERSION_KEY: &str = "model.version";

/// Deterministic amount-bucket score used whenever the learned model is
/// unavailable or produced a non-finite value. Contractual degraded mode,
/// never an error.
pub fn fallback_score(amount: f64) -> f64 {
    if amount > 1_000_000.0 {
        0.9
    } else if amount > 500_000.0 {
        0.7
    } else if amount > 100_000.0 {
        0.5
    } else {
        0.2
    }
}

pub struct RiskScorer {
    state: RwLock<Option<WeightsArtifact>>,
    // serializes artifact writes so an older snapshot never lands last
    last_saved: Mutex<u64>,
    model_dir: PathBuf,
    kv: Arc<dyn KvStore>,
}

impl RiskScorer {
    /// Load persisted weights, or instantiate the topology, run one dummy
    /// fit step to materialize parameters, and persist the result.
    pub async fn init(
        model_dir: PathBuf,
        kv: Arc<dyn KvStore>,
        bootstrap_stats: Vec<FeatureStat>,
    ) -> Self {
        let artifact = match WeightsArtifact::load(&model_dir) {
            Ok(artifact) => {
                info!(
                    version = artifact.version,
                    model_dir = %model_dir.display(),
                    "Loaded persisted model weights"
                );
                artifact
            }
            Err(load_error) => {
                info!(
                    error = %load_error,
                    model_dir = %model_dir.display(),
                    "No usable model artifact, instantiating topology"
                );
                let mut artifact = WeightsArtifact::new(bootstrap_stats);
                let zeros = vec![0.0; INPUT_SIZE];
                let WeightsArtifact { network, adam, .. } = &mut artifact;
                network.train_step(&zeros, 0.0, adam);
                if let Err(save_error) = artifact.save(&model_dir) {
                    warn!(
                        error = %save_error,
                        model_dir = %model_dir.display(),
                        "Could not persist freshly initialized model, continuing in memory"
                    );
                }
                artifact
            }
        };

        Self {
            state: RwLock::new(Some(artifact)),
            last_saved: Mutex::new(0),
            model_dir,
            kv,
        }
    }

    /// Scorer in permanent degraded mode; every prediction takes the
    /// fallback path and updates report the model unavailable.
    pub fn without_model(kv: Arc<dyn KvStore>) -> Self {
        Self {
            state: RwLock::new(None),
            last_saved: Mutex::new(0),
            model_dir: PathBuf::new(),
            kv,
        }
    }

    /// Normalization table carried by the loaded artifact.
    pub async fn feature_stats(&self) -> Option<Vec<FeatureStat>> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|artifact| artifact.feature_stats.clone())
    }

    pub async fn metrics(&self) -> Option<TrainingMetrics> {
        self.state.read().await.as_ref().map(|a| a.metrics)
    }

    /// Risk probability in [0, 1] for an already-normalized feature vector.
    /// `amount` feeds the fallback buckets in degraded mode.
    pub async fn predict_risk(&self, features: &[f64], amount: f64) -> f64 {
        let guard = self.state.read().await;
        match guard.as_ref() {
            Some(artifact) => {
                let score = artifact.network.predict(features);
                if score.is_finite() {
                    score.clamp(0.0, 1.0)
                } else {
                    warn!(score, "Model produced non-finite score, using fallback");
                    fallback_score(amount)
                }
            }
            None => {
                warn!("Model unavailable, using fallback score");
                fallback_score(amount)
            }
        }
    }

    /// Single-sample gradient update from a ground-truth label. Persists
    /// the weights and bumps the KV `model.version` counter; returns the
    /// new version.
    pub async fn update_with_label(
        &self,
        features: &[f64],
        is_fraud: bool,
    ) -> Result<u64, ModelError> {
        let label = if is_fraud { 1.0 } else { 0.0 };

        let snapshot = {
            let mut guard = self.state.write().await;
            let artifact = guard.as_mut().ok_or(ModelError::Unavailable)?;

            let predicted_fraud = artifact.network.predict(features) >= 0.5;
            let loss = {
                let WeightsArtifact { network, adam, .. } = artifact;
                network.train_step(features, label, adam)
            };
            artifact.metrics.observe(predicted_fraud, is_fraud);

            let version = self
                .kv
                .incr(MODEL_VERSION_KEY)
                .await
                .map_err(|e| ModelError::Mismatch(format!("version counter: {e}")))?;
            artifact.version = version;

            info!(
                version,
                loss,
                is_fraud,
                accuracy = artifact.metrics.accuracy(),
                "Applied online model update"
            );
            artifact.clone()
        };

        let mut saved = self.last_saved.lock().await;
        if snapshot.version > *saved {
            snapshot.save(&self.model_dir)?;
            *saved = snapshot.version;
        }
        Ok(snapshot.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudguard_store::memory::MemoryKv;

    fn stats() -> Vec<FeatureStat> {
        vec![
            FeatureStat {
                mean: 0.0,
                std: 1.0
            };
            INPUT_SIZE
        ]
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fraudguard-scorer-{tag}-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn fallback_buckets() {
        assert_eq!(fallback_score(2_000_000.0), 0.9);
        assert_eq!(fallback_score(600_000.0), 0.7);
        assert_eq!(fallback_score(150_000.0), 0.5);
        assert_eq!(fallback_score(5_000.0), 0.2);
        assert_eq!(fallback_score(0.0), 0.2);
    }

    #[tokio::test]
    async fn init_materializes_and_persists_weights() {
        let dir = scratch_dir("init");
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let scorer = RiskScorer::init(dir.clone(), kv, stats()).await;

        assert!(dir.join("topology.json").exists());
        assert!(dir.join("weights.json").exists());
        assert!(scorer.feature_stats().await.is_some());

        let score = scorer.predict_risk(&[0.0; INPUT_SIZE], 1_000.0).await;
        assert!((0.0..=1.0).contains(&score));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn update_strictly_increases_version() {
        let dir = scratch_dir("version");
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let scorer = RiskScorer::init(dir.clone(), kv.clone(), stats()).await;

        let features = [0.2; INPUT_SIZE];
        let first = scorer.update_with_label(&features, true).await.unwrap();
        let second = scorer.update_with_label(&features, true).await.unwrap();
        assert!(second > first);
        assert_eq!(
            kv.get(MODEL_VERSION_KEY).await.unwrap().as_deref(),
            Some(second.to_string().as_str())
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn reload_resumes_from_persisted_weights() {
        let dir = scratch_dir("reload");
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let scorer = RiskScorer::init(dir.clone(), kv.clone(), stats()).await;

        let features = [0.7; INPUT_SIZE];
        for _ in 0..5 {
            scorer.update_with_label(&features, true).await.unwrap();
        }
        let trained = scorer.predict_risk(&features, 0.0).await;

        let reloaded = RiskScorer::init(dir.clone(), kv, stats()).await;
        let resumed = reloaded.predict_risk(&features, 0.0).await;
        assert!((trained - resumed).abs() < 1e-12);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn unavailable_model_falls_back_and_rejects_updates() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let scorer = RiskScorer::without_model(kv);

        let score = scorer.predict_risk(&[0.0; INPUT_SIZE], 600_000.0).await;
        assert_eq!(score, 0.7);

        let update = scorer.update_with_label(&[0.0; INPUT_SIZE], true).await;
        assert!(matches!(update, Err(ModelError::Unavailable)));
    }
}
