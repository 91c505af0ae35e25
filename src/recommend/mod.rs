//! Content recommendation.
//!
//! Four cooperating models: template generation from skill gaps,
//! collaborative filtering over peer ratings, EMA-reward sequencing, and
//! per-learner difficulty adaptation. A learner the engine has never heard
//! of gets the plain template output; personalization layers switch on as
//! evidence arrives.

pub mod collaborative;
pub mod difficulty;
pub mod sequencing;
pub mod templates;

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::RecommenderParams;
use crate::errors::{require_id, EngineResult};
use crate::store::ShardedStore;
use crate::types::{LearningContent, LearningPreferences, SkillGap};

pub use collaborative::{pearson_similarity, CollaborativeFilter};
pub use difficulty::DifficultyPersonalizer;
pub use sequencing::SequenceModel;
pub use templates::{ContentTemplate, TemplateCatalog};

pub struct RecommendationEngine {
    params: RecommenderParams,
    catalog: TemplateCatalog,
    filter: CollaborativeFilter,
    sequencer: SequenceModel,
    personalizer: DifficultyPersonalizer,
    /// Everything this engine has ever emitted, so CF suggestions can be
    /// materialized back into full content values.
    seen_content: ShardedStore<String, LearningContent>,
}

impl RecommendationEngine {
    pub fn new(params: RecommenderParams, catalog: TemplateCatalog) -> Self {
        Self {
            filter: CollaborativeFilter::new(
                params.similarity_threshold,
                params.min_common_ratings,
                params.cf_score_threshold,
            ),
            sequencer: SequenceModel::new(params.exploration_rate, params.reward_learning_rate),
            personalizer: DifficultyPersonalizer::new(
                params.min_difficulty_factor,
                params.max_difficulty_factor,
                params.performance_window,
            ),
            seen_content: ShardedStore::new(),
            params,
            catalog,
        }
    }

    /// Ordered learning content for the given gaps and preferences.
    pub fn recommend_content(
        &self,
        gaps: &[SkillGap],
        preferences: &LearningPreferences,
    ) -> Vec<LearningContent> {
        let mut items = self.generate_base(gaps);

        let learner = &preferences.learner_id;
        let has_ratings = self.filter.has_ratings(learner);
        let has_history = self.personalizer.has_history(learner);

        if has_ratings {
            self.append_collaborative(learner, &mut items);
        }
        if has_history {
            for item in &mut items {
                self.personalizer.personalize(learner, item);
            }
        }

        sort_by_preference(&mut items, preferences);

        let items = if has_history {
            self.sequencer.order(items, preferences)
        } else {
            items
        };

        for item in &items {
            self.seen_content.insert(item.id.clone(), item.clone());
        }
        tracing::debug!(
            learner = %learner,
            gaps = gaps.len(),
            recommendations = items.len(),
            personalized = has_history,
            "content recommended"
        );
        items
    }

    fn generate_base(&self, gaps: &[SkillGap]) -> Vec<LearningContent> {
        let mut items = Vec::new();
        let mut per_skill: HashMap<String, usize> = HashMap::new();
        for gap in gaps {
            if gap.skill_domain.trim().is_empty() {
                continue;
            }
            let used = per_skill.entry(gap.skill_domain.clone()).or_insert(0);
            let budget = self.params.max_items_per_skill.saturating_sub(*used);
            let generated =
                self.catalog
                    .generate_for_gap(gap, self.params.max_items_per_gap, budget);
            *used += generated.len();
            for item in generated {
                if !items.iter().any(|existing: &LearningContent| existing.id == item.id) {
                    items.push(item);
                }
            }
        }
        items
    }

    fn append_collaborative(&self, learner: &str, items: &mut Vec<LearningContent>) {
        let existing: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        let suggestions = self.filter.suggest_content(learner, &existing);
        for (content_id, _score) in suggestions {
            if let Some(content) = self.seen_content.get(&content_id) {
                items.push(content);
            }
        }
    }

    /// Feedback after the learner consumed a content item.
    pub fn update_user_performance(
        &self,
        learner_id: &str,
        content_id: &str,
        score: f64,
        previous_content_id: Option<&str>,
    ) -> EngineResult<()> {
        require_id(learner_id, "learnerId")?;
        require_id(content_id, "contentId")?;
        let score = score.clamp(0.0, 1.0);

        self.personalizer.record_performance(learner_id, score);
        if let Some(previous) = previous_content_id {
            if !previous.trim().is_empty() {
                self.sequencer.record_transition(previous, content_id, score);
            }
        }
        self.filter.record_rating(learner_id, content_id, score);

        tracing::debug!(
            learner = learner_id,
            content = content_id,
            score,
            "performance recorded"
        );
        Ok(())
    }

    pub fn personalized_factor(&self, learner_id: &str) -> f64 {
        self.personalizer.factor(learner_id)
    }

    pub fn content_rating(&self, learner_id: &str, content_id: &str) -> Option<f64> {
        self.filter.rating(learner_id, content_id)
    }

    pub fn pair_reward(&self, from: &str, to: &str) -> f64 {
        self.sequencer.pair_reward(from, to)
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new(RecommenderParams::default(), TemplateCatalog::builtin())
    }
}

/// Output ordering: preferred content types first, then closest to the
/// preferred difficulty.
fn sort_by_preference(items: &mut [LearningContent], preferences: &LearningPreferences) {
    items.sort_by(|a, b| {
        let a_preferred = preferences.prefers_type(&a.content_type);
        let b_preferred = preferences.prefers_type(&b.content_type);
        match b_preferred.cmp(&a_preferred) {
            Ordering::Equal => {
                let da = (a.difficulty - preferences.preferred_difficulty).abs();
                let db = (b.difficulty - preferences.preferred_difficulty).abs();
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            }
            other => other,
        }
    });
}
