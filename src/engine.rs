//! Engine facade bundling the three components.
//!
//! Completing a session feeds the knowledge tracker and the retention
//! scheduler in one call; skill gaps derived from tracker probabilities can
//! be handed straight to the recommender. The components stay independently
//! usable; this is wiring, not logic.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::errors::{require_id, EngineResult};
use crate::knowledge::KnowledgeStateTracker;
use crate::recommend::{RecommendationEngine, TemplateCatalog};
use crate::retention::RetentionScheduler;
use crate::types::{
    CompletedSession, LearningContent, LearningPreferences, ScheduledSession, SkillGap, SkillKey,
    WEAKNESS_THRESHOLD,
};

#[derive(Clone)]
pub struct LearningEngine {
    tracker: Arc<KnowledgeStateTracker>,
    scheduler: RetentionScheduler,
    recommender: Arc<RecommendationEngine>,
}

impl LearningEngine {
    pub fn new(config: EngineConfig, catalog: TemplateCatalog) -> Self {
        Self {
            tracker: Arc::new(KnowledgeStateTracker::new(config.bkt)),
            scheduler: RetentionScheduler::new(config.scheduler),
            recommender: Arc::new(RecommendationEngine::new(config.recommender, catalog)),
        }
    }

    pub fn from_env() -> Self {
        Self::new(EngineConfig::from_env(), TemplateCatalog::builtin())
    }

    pub fn tracker(&self) -> &KnowledgeStateTracker {
        &self.tracker
    }

    pub fn scheduler(&self) -> &RetentionScheduler {
        &self.scheduler
    }

    pub fn recommender(&self) -> &RecommendationEngine {
        &self.recommender
    }

    /// Folds a finished session into the mastery model (one observation per
    /// objective, correct at/above the accuracy cutoff) and books the
    /// follow-up reviews.
    pub async fn complete_session(
        &self,
        learner_id: &str,
        session: &CompletedSession,
    ) -> EngineResult<Vec<ScheduledSession>> {
        require_id(learner_id, "learnerId")?;
        for outcome in &session.outcomes {
            if outcome.objective.trim().is_empty() {
                continue;
            }
            let key = SkillKey::new(learner_id, &outcome.objective);
            let correct = outcome.achievement_score >= WEAKNESS_THRESHOLD;
            self.tracker.update_knowledge(&key, correct)?;
        }
        self.scheduler.schedule_follow_up(learner_id, session).await
    }

    /// Gaps between a target mastery level and the tracked probabilities,
    /// ready to feed `recommend_content`. Skills already at the target are
    /// omitted.
    pub fn skill_gaps(&self, learner_id: &str, target: f64) -> Vec<SkillGap> {
        let target = target.clamp(0.0, 1.0);
        self.tracker
            .tracked_skills(learner_id)
            .into_iter()
            .filter(|(_, probability)| *probability < target)
            .map(|(skill, probability)| SkillGap::new(skill, target - probability))
            .collect()
    }

    pub fn recommend_content(
        &self,
        gaps: &[SkillGap],
        preferences: &LearningPreferences,
    ) -> Vec<LearningContent> {
        self.recommender.recommend_content(gaps, preferences)
    }
}

impl Default for LearningEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), TemplateCatalog::builtin())
    }
}
