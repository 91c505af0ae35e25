//! Personalized difficulty adaptation.
//!
//! Each learner carries a multiplicative factor in [0.5, 2.0] nudged by
//! their performance, combined with a recency-weighted trend over the last
//! few scores. The adjusted difficulty value is always applied; the coarse
//! level label is only touched when the value moved noticeably.

use std::collections::VecDeque;

use crate::store::ShardedStore;
use crate::types::LearningContent;

const TREND_WINDOW: usize = 5;
const FACTOR_STEP: f64 = 0.05;

/// Linear recency-weighted mean of the last `TREND_WINDOW` scores, most
/// recent heaviest. `None` without any history.
pub fn performance_trend(history: &VecDeque<f64>) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let recent: Vec<f64> = history
        .iter()
        .rev()
        .take(TREND_WINDOW)
        .copied()
        .collect();
    // recent[0] is the newest score and gets the heaviest weight.
    let n = recent.len();
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (i, score) in recent.iter().enumerate() {
        let weight = (n - i) as f64;
        weighted += score * weight;
        total += weight;
    }
    Some(weighted / total)
}

fn trend_multiplier(trend: f64) -> f64 {
    if trend > 0.8 {
        1.2
    } else if trend < 0.5 {
        0.8
    } else {
        1.0
    }
}

pub struct DifficultyPersonalizer {
    factors: ShardedStore<String, f64>,
    history: ShardedStore<String, VecDeque<f64>>,
    min_factor: f64,
    max_factor: f64,
    window: usize,
}

impl DifficultyPersonalizer {
    pub fn new(min_factor: f64, max_factor: f64, window: usize) -> Self {
        Self {
            factors: ShardedStore::new(),
            history: ShardedStore::new(),
            min_factor,
            max_factor,
            window: window.max(TREND_WINDOW),
        }
    }

    pub fn factor(&self, learner_id: &str) -> f64 {
        self.factors.get(&learner_id.to_string()).unwrap_or(1.0)
    }

    pub fn has_history(&self, learner_id: &str) -> bool {
        self.history
            .get(&learner_id.to_string())
            .map(|h| !h.is_empty())
            .unwrap_or(false)
    }

    pub fn record_performance(&self, learner_id: &str, score: f64) {
        let score = score.clamp(0.0, 1.0);
        let window = self.window;
        self.history.update(
            learner_id.to_string(),
            VecDeque::new,
            |history| {
                history.push_back(score);
                while history.len() > window {
                    history.pop_front();
                }
            },
        );

        let (min, max) = (self.min_factor, self.max_factor);
        self.factors.update(learner_id.to_string(), || 1.0, |factor| {
            if score > 0.8 {
                *factor += FACTOR_STEP;
            } else if score < 0.5 {
                *factor -= FACTOR_STEP;
            }
            *factor = factor.clamp(min, max);
        });
    }

    /// Rescales a content item's difficulty for this learner in place.
    pub fn personalize(&self, learner_id: &str, content: &mut LearningContent) {
        let history = match self.history.get(&learner_id.to_string()) {
            Some(h) if !h.is_empty() => h,
            _ => return,
        };
        let trend = match performance_trend(&history) {
            Some(t) => t,
            None => return,
        };

        let original = content.difficulty;
        let combined = trend_multiplier(trend) * self.factor(learner_id);
        content.difficulty = (original * combined).clamp(0.1, 1.0);
        if (content.difficulty - original).abs() > 0.1 {
            content.relabel();
        }
    }
}
