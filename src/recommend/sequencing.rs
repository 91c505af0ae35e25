//! Reinforcement-style content sequencing.
//!
//! Every observed transition between two content items updates an
//! exponential moving average reward for that ordered pair. Sequence
//! construction is epsilon-greedy: mostly the remaining item with the best
//! combined score (historical pair reward, preference fit, difficulty
//! progression), occasionally an arbitrary one to keep exploring.

use rand::Rng;

use crate::store::ShardedStore;
use crate::types::{LearningContent, LearningPreferences};

fn pair_key(from: &str, to: &str) -> String {
    format!("{from}->{to}")
}

pub struct SequenceModel {
    rewards: ShardedStore<String, f64>,
    exploration_rate: f64,
    learning_rate: f64,
}

impl SequenceModel {
    pub fn new(exploration_rate: f64, learning_rate: f64) -> Self {
        Self {
            rewards: ShardedStore::new(),
            exploration_rate: exploration_rate.clamp(0.0, 1.0),
            learning_rate: learning_rate.clamp(0.0, 1.0),
        }
    }

    /// EMA update: reward += lr * (observed - reward).
    pub fn record_transition(&self, from: &str, to: &str, observed_performance: f64) {
        let lr = self.learning_rate;
        self.rewards.update(pair_key(from, to), || 0.0, |reward| {
            *reward += lr * (observed_performance - *reward);
        });
    }

    pub fn pair_reward(&self, from: &str, to: &str) -> f64 {
        self.rewards.get(&pair_key(from, to)).unwrap_or(0.0)
    }

    fn preference_bonus(candidate: &LearningContent, prefs: &LearningPreferences) -> f64 {
        let type_bonus = if prefs.prefers_type(&candidate.content_type) {
            0.1
        } else {
            0.0
        };
        type_bonus + 0.1 * (1.0 - (candidate.difficulty - prefs.preferred_difficulty).abs())
    }

    /// Gentle difficulty increases are rewarded; jumps are penalized;
    /// steps back are neutral.
    fn progression_bonus(current: &LearningContent, candidate: &LearningContent) -> f64 {
        let step = candidate.difficulty - current.difficulty;
        if (0.0..=0.2).contains(&step) {
            0.1
        } else if step > 0.2 {
            -0.1
        } else {
            0.0
        }
    }

    fn candidate_score(
        &self,
        current: Option<&LearningContent>,
        candidate: &LearningContent,
        prefs: &LearningPreferences,
    ) -> f64 {
        let history = match current {
            Some(cur) => self.pair_reward(&cur.id, &candidate.id),
            None => 0.0,
        };
        let progression = match current {
            Some(cur) => Self::progression_bonus(cur, candidate),
            None => 0.0,
        };
        history + Self::preference_bonus(candidate, prefs) + progression
    }

    /// Arranges the recommendation set into a learning sequence.
    pub fn order(
        &self,
        items: Vec<LearningContent>,
        prefs: &LearningPreferences,
    ) -> Vec<LearningContent> {
        if items.len() < 2 {
            return items;
        }

        let mut rng = rand::rng();
        let mut remaining = items;
        let mut ordered = Vec::with_capacity(remaining.len());
        let mut current: Option<LearningContent> = None;

        while !remaining.is_empty() {
            let index = if remaining.len() > 1 && rng.random::<f64>() < self.exploration_rate {
                rng.random_range(0..remaining.len())
            } else {
                let mut best = 0;
                let mut best_score = f64::NEG_INFINITY;
                for (i, candidate) in remaining.iter().enumerate() {
                    let score = self.candidate_score(current.as_ref(), candidate, prefs);
                    if score > best_score {
                        best_score = score;
                        best = i;
                    }
                }
                best
            };
            let next = remaining.remove(index);
            current = Some(next.clone());
            ordered.push(next);
        }
        ordered
    }
}
