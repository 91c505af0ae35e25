//! # tutor-engine — adaptive learning engine
//!
//! Three independent algorithm families behind one facade:
//!
//! - [`knowledge`] — Bayesian Knowledge Tracing: per-(learner, skill)
//!   mastery probabilities updated from correctness evidence.
//! - [`retention`] — SM-2 spaced repetition: easiness-driven review
//!   intervals and forgetting-curve retention assessment.
//! - [`recommend`] — content recommendation: template generation,
//!   collaborative filtering, EMA-reward sequencing, personalized
//!   difficulty.
//!
//! All state lives in sharded in-memory keyed stores ([`store`]) with
//! atomic per-key transitions; persistence belongs to collaborators.
//!
//! ```no_run
//! use tutor_engine::{LearningEngine, CompletedSession, SessionOutcome};
//!
//! # async fn demo() -> Result<(), tutor_engine::EngineError> {
//! let engine = LearningEngine::default();
//! let session = CompletedSession::new(
//!     "session-1",
//!     "ownership",
//!     vec![SessionOutcome::new("borrowing", 0.85)],
//! );
//! let reviews = engine.complete_session("alice", &session).await?;
//! assert_eq!(reviews.len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod knowledge;
pub mod logging;
pub mod recommend;
pub mod retention;
pub mod store;
pub mod types;

pub use config::{BktPriors, EngineConfig, LoggingConfig, RecommenderParams, SchedulerParams};
pub use engine::LearningEngine;
pub use errors::{EngineError, EngineResult};
pub use knowledge::{KnowledgeState, KnowledgeStateTracker};
pub use logging::{init_tracing, FileLogGuard};
pub use recommend::{
    CollaborativeFilter, ContentTemplate, DifficultyPersonalizer, RecommendationEngine,
    SequenceModel, TemplateCatalog,
};
pub use retention::{
    calculate_next_interval, retention_score, RetentionScheduler, TopicKey, TopicReviewData,
};
pub use types::{
    CompletedSession, DifficultyLevel, LearningContent, LearningPreferences, LearningSchedule,
    Priority, RetentionAssessment, RetentionLevel, ReviewAction, ScheduledSession, SessionOutcome,
    SessionType, SkillGap, SkillKey,
};
