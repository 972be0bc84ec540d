// src/state.rs - Application state with dependency injection
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use fraudguard_model::RiskScorer;
use fraudguard_store::{KvRecords, KvStore, TransactionStore};

use crate::config::AppConfig;
use crate::services::features::bootstrap_stats;
use crate::services::{
    BehaviorWindows, FeatureExtractor, FeedbackService, RiskEngine, RuleEngine, StatsService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub risk_engine: Arc<RiskEngine>,
    pub feedback_service: Arc<FeedbackService>,
    pub stats_service: Arc<StatsService>,
}

impl AppState {
    pub async fn new(kv: Arc<dyn KvStore>, config: AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let windows = BehaviorWindows::new(kv.clone());
        let records: Arc<dyn TransactionStore> = Arc::new(KvRecords::new(kv.clone()));

        let scorer = if config.enable_ml_model {
            let scorer = RiskScorer::init(
                PathBuf::from(&config.model_dir),
                kv.clone(),
                bootstrap_stats(),
            )
            .await;
            Some(Arc::new(scorer))
        } else {
            info!("Learned model disabled by configuration, model score fixed at 0");
            None
        };

        // the live normalization table travels with the model artifact
        let stats_table = match &scorer {
            Some(scorer) => scorer
                .feature_stats()
                .await
                .unwrap_or_else(bootstrap_stats),
            None => bootstrap_stats(),
        };

        let features = FeatureExtractor::new(windows.clone(), stats_table);
        let rules = RuleEngine::new(windows.clone(), config.clone());
        let risk_engine = Arc::new(RiskEngine::new(
            config.clone(),
            windows,
            rules,
            features.clone(),
            scorer.clone(),
            records.clone(),
        ));
        let feedback_service = Arc::new(FeedbackService::new(
            records.clone(),
            features,
            scorer,
        ));
        let stats_service = Arc::new(StatsService::new(records));

        Ok(Self {
            config,
            risk_engine,
            feedback_service,
            stats_service,
        })
    }
}
