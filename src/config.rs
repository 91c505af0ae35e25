use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse::<f64>().ok())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Daily-rolling `engine.log` files land here; `None` logs to stdout
    /// only.
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: std::env::var("ENGINE_LOG").unwrap_or_else(|_| "info".to_string()),
            file_dir: std::env::var("ENGINE_LOG_DIR").ok().map(PathBuf::from),
        }
    }
}

/// BKT priors for a skill never seen before.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BktPriors {
    pub initial_knowledge: f64,
    pub learning_rate: f64,
    pub guess_rate: f64,
    pub slip_rate: f64,
}

impl Default for BktPriors {
    fn default() -> Self {
        Self {
            initial_knowledge: 0.1,
            learning_rate: 0.3,
            guess_rate: 0.2,
            slip_rate: 0.1,
        }
    }
}

impl BktPriors {
    pub fn clamped(mut self) -> Self {
        self.initial_knowledge = self.initial_knowledge.clamp(0.0, 1.0);
        self.learning_rate = self.learning_rate.clamp(0.0, 1.0);
        self.guess_rate = self.guess_rate.clamp(0.0, 1.0);
        self.slip_rate = self.slip_rate.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchedulerParams {
    pub default_easiness: f64,
    pub min_easiness: f64,
    /// Review sessions kept per learner in the pending ledger.
    pub pending_ledger_cap: usize,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            default_easiness: 2.5,
            min_easiness: 1.3,
            pending_ledger_cap: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecommenderParams {
    pub exploration_rate: f64,
    pub similarity_threshold: f64,
    pub min_common_ratings: usize,
    pub cf_score_threshold: f64,
    pub reward_learning_rate: f64,
    pub max_items_per_gap: usize,
    pub max_items_per_skill: usize,
    pub min_difficulty_factor: f64,
    pub max_difficulty_factor: f64,
    pub performance_window: usize,
}

impl Default for RecommenderParams {
    fn default() -> Self {
        Self {
            exploration_rate: 0.15,
            similarity_threshold: 0.6,
            min_common_ratings: 2,
            cf_score_threshold: 0.7,
            reward_learning_rate: 0.1,
            max_items_per_gap: 3,
            max_items_per_skill: 5,
            min_difficulty_factor: 0.5,
            max_difficulty_factor: 2.0,
            performance_window: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(Default)]
pub struct EngineConfig {
    pub bkt: BktPriors,
    pub scheduler: SchedulerParams,
    pub recommender: RecommenderParams,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Environment overrides for the knobs operators actually turn.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_f64("ENGINE_BKT_INITIAL_KNOWLEDGE") {
            config.bkt.initial_knowledge = v;
        }
        if let Some(v) = env_f64("ENGINE_BKT_LEARNING_RATE") {
            config.bkt.learning_rate = v;
        }
        if let Some(v) = env_f64("ENGINE_EXPLORATION_RATE") {
            config.recommender.exploration_rate = v;
        }
        if let Some(v) = env_f64("ENGINE_SIMILARITY_THRESHOLD") {
            config.recommender.similarity_threshold = v;
        }
        config.logging = LoggingConfig::from_env();
        config.bkt = config.bkt.clamped();
        config.recommender.exploration_rate = config.recommender.exploration_rate.clamp(0.0, 1.0);
        config.recommender.similarity_threshold =
            config.recommender.similarity_threshold.clamp(-1.0, 1.0);
        config
    }
}
