//! Bayesian Knowledge Tracing.
//!
//! One `KnowledgeState` per (learner, skill). Each correctness observation
//! moves the mastery estimate through the standard BKT posterior, then adds
//! a learning-opportunity increment: the full learning rate after a correct
//! response, half of it after an incorrect one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BktPriors;
use crate::errors::{require_id, EngineResult};
use crate::store::ShardedStore;
use crate::types::SkillKey;

const LIKELIHOOD_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeState {
    pub knowledge_probability: f64,
    pub learning_rate: f64,
    pub guess_rate: f64,
    pub slip_rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl KnowledgeState {
    fn from_priors(priors: &BktPriors) -> Self {
        Self {
            knowledge_probability: priors.initial_knowledge,
            learning_rate: priors.learning_rate,
            guess_rate: priors.guess_rate,
            slip_rate: priors.slip_rate,
            last_updated: Utc::now(),
        }
    }

    fn clamp_all(&mut self) {
        self.knowledge_probability = self.knowledge_probability.clamp(0.0, 1.0);
        self.learning_rate = self.learning_rate.clamp(0.0, 1.0);
        self.guess_rate = self.guess_rate.clamp(0.0, 1.0);
        self.slip_rate = self.slip_rate.clamp(0.0, 1.0);
    }
}

/// BKT posterior for one observation, before the learning increment.
fn bkt_posterior(state: &KnowledgeState, correct: bool) -> f64 {
    let l = state.knowledge_probability;
    let g = state.guess_rate;
    let s = state.slip_rate;

    let (evidence, likelihood) = if correct {
        (l * (1.0 - s), l * (1.0 - s) + (1.0 - l) * g)
    } else {
        (l * s, l * s + (1.0 - l) * (1.0 - g))
    };

    if likelihood <= LIKELIHOOD_EPSILON {
        // Degenerate parameters make the observation uninformative.
        l
    } else {
        evidence / likelihood
    }
}

fn apply_observation(state: &mut KnowledgeState, correct: bool) -> f64 {
    let posterior = bkt_posterior(state, correct);
    let transition = if correct {
        state.learning_rate
    } else {
        state.learning_rate / 2.0
    };
    state.knowledge_probability = posterior + (1.0 - posterior) * transition;
    state.last_updated = Utc::now();
    state.clamp_all();
    state.knowledge_probability
}

pub struct KnowledgeStateTracker {
    priors: BktPriors,
    states: ShardedStore<SkillKey, KnowledgeState>,
}

impl KnowledgeStateTracker {
    pub fn new(priors: BktPriors) -> Self {
        Self {
            priors: priors.clamped(),
            states: ShardedStore::new(),
        }
    }

    fn validate(key: &SkillKey) -> EngineResult<()> {
        require_id(&key.learner_id, "learnerId")?;
        require_id(&key.skill_domain, "skillDomain")
    }

    /// Folds one correctness observation into the mastery estimate and
    /// returns the updated probability.
    pub fn update_knowledge(&self, key: &SkillKey, correct: bool) -> EngineResult<f64> {
        Self::validate(key)?;
        let priors = self.priors;
        let updated = self.states.update(
            key.clone(),
            || KnowledgeState::from_priors(&priors),
            |state| apply_observation(state, correct),
        );
        tracing::debug!(
            learner = %key.learner_id,
            skill = %key.skill_domain,
            correct,
            probability = updated,
            "knowledge updated"
        );
        Ok(updated)
    }

    pub fn knowledge_probability(&self, key: &SkillKey) -> f64 {
        self.states
            .get(key)
            .map(|s| s.knowledge_probability)
            .unwrap_or(self.priors.initial_knowledge)
    }

    /// P(correct next response) = L(1-S) + (1-L)G.
    pub fn predict_success_probability(&self, key: &SkillKey) -> f64 {
        let state = self
            .states
            .get(key)
            .unwrap_or_else(|| KnowledgeState::from_priors(&self.priors));
        let l = state.knowledge_probability;
        l * (1.0 - state.slip_rate) + (1.0 - l) * state.guess_rate
    }

    /// Practice opportunities expected before mastery crosses `threshold`.
    pub fn estimate_opportunities_to_mastery(&self, key: &SkillKey, threshold: f64) -> u32 {
        let state = self
            .states
            .get(key)
            .unwrap_or_else(|| KnowledgeState::from_priors(&self.priors));
        let threshold = threshold.clamp(0.0, 1.0);
        if state.knowledge_probability >= threshold {
            return 0;
        }
        if state.learning_rate <= LIKELIHOOD_EPSILON {
            return u32::MAX;
        }
        let remaining = (threshold - state.knowledge_probability) / state.learning_rate;
        // A vanishing learning rate makes `remaining` astronomically large;
        // the cast saturates and the estimate must not wrap past it.
        (remaining.ceil() as u32).saturating_add(1)
    }

    /// Blends observed transition/guess/slip rates into the model as the
    /// arithmetic mean with the current values.
    pub fn adapt_model_parameters(
        &self,
        key: &SkillKey,
        observed_learning: f64,
        observed_guess: f64,
        observed_slip: f64,
    ) -> EngineResult<()> {
        Self::validate(key)?;
        let priors = self.priors;
        self.states.update(
            key.clone(),
            || KnowledgeState::from_priors(&priors),
            |state| {
                state.learning_rate = (state.learning_rate + observed_learning) / 2.0;
                state.guess_rate = (state.guess_rate + observed_guess) / 2.0;
                state.slip_rate = (state.slip_rate + observed_slip) / 2.0;
                state.last_updated = Utc::now();
                state.clamp_all();
            },
        );
        Ok(())
    }

    /// Drops the stored state; subsequent reads see the priors again.
    pub fn reset_knowledge_state(&self, key: &SkillKey) -> EngineResult<()> {
        Self::validate(key)?;
        self.states.remove(key);
        Ok(())
    }

    /// Skills this learner holds at or above the mastery threshold.
    pub fn mastered_skills(&self, learner_id: &str, threshold: f64) -> Vec<String> {
        let mut skills: Vec<String> = self
            .states
            .collect_where(|k, v| {
                k.learner_id == learner_id && v.knowledge_probability >= threshold
            })
            .into_iter()
            .map(|(k, _)| k.skill_domain)
            .collect();
        skills.sort();
        skills
    }

    /// All tracked skills for a learner with their current probabilities.
    pub fn tracked_skills(&self, learner_id: &str) -> Vec<(String, f64)> {
        let mut skills: Vec<(String, f64)> = self
            .states
            .collect_where(|k, _| k.learner_id == learner_id)
            .into_iter()
            .map(|(k, v)| (k.skill_domain, v.knowledge_probability))
            .collect();
        skills.sort_by(|a, b| a.0.cmp(&b.0));
        skills
    }

    /// Drops states untouched since the cutoff; returns how many went.
    pub fn prune_idle(&self, older_than: DateTime<Utc>) -> usize {
        let removed = self.states.retain(|_, v| v.last_updated >= older_than);
        if removed > 0 {
            tracing::info!(removed, "pruned idle knowledge states");
        }
        removed
    }
}

impl Default for KnowledgeStateTracker {
    fn default() -> Self {
        Self::new(BktPriors::default())
    }
}
