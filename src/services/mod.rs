// src/services/mod.rs - Service layer modules
pub mod features;
pub mod feedback;
pub mod rules;
pub mod scoring;
pub mod stats;
pub mod windows;

pub use features::FeatureExtractor;
pub use feedback::FeedbackService;
pub use rules::RuleEngine;
pub use scoring::RiskEngine;
pub use stats::StatsService;
pub use windows::BehaviorWindows;
