//! Collaborative filtering over learner content ratings.
//!
//! Similarity is Pearson correlation over the content both learners rated,
//! requiring at least two common ratings. Similar-learner sets are cached
//! per learner together with the ratings generation they were computed at;
//! a ratings write bumps the generation, so a stale cache entry is simply
//! recomputed on the next read and concurrent readers are never blocked.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::store::ShardedStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerRatings {
    pub ratings: HashMap<String, f64>,
    pub generation: u64,
}

#[derive(Debug, Clone)]
struct CachedSimilarity {
    generation: u64,
    similar: Vec<String>,
}

/// Pearson correlation over commonly rated content; `None` when fewer than
/// `min_common` items overlap or either side has zero variance.
pub fn pearson_similarity(
    a: &HashMap<String, f64>,
    b: &HashMap<String, f64>,
    min_common: usize,
) -> Option<f64> {
    let common: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|(id, &ra)| b.get(id).map(|&rb| (ra, rb)))
        .collect();
    if common.len() < min_common.max(2) {
        return None;
    }

    let n = common.len() as f64;
    let mean_a = common.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = common.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &common {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

pub struct CollaborativeFilter {
    ratings: ShardedStore<String, LearnerRatings>,
    similarity_cache: ShardedStore<String, CachedSimilarity>,
    similarity_threshold: f64,
    min_common_ratings: usize,
    score_threshold: f64,
}

impl CollaborativeFilter {
    pub fn new(similarity_threshold: f64, min_common_ratings: usize, score_threshold: f64) -> Self {
        Self {
            ratings: ShardedStore::new(),
            similarity_cache: ShardedStore::new(),
            similarity_threshold,
            min_common_ratings,
            score_threshold,
        }
    }

    /// Records or overwrites a rating. The generation bump is what
    /// invalidates this learner's cached similarity set.
    pub fn record_rating(&self, learner_id: &str, content_id: &str, score: f64) {
        let content_id = content_id.to_string();
        self.ratings.update(
            learner_id.to_string(),
            LearnerRatings::default,
            |entry| {
                entry.ratings.insert(content_id, score.clamp(0.0, 1.0));
                entry.generation += 1;
            },
        );
    }

    pub fn rating(&self, learner_id: &str, content_id: &str) -> Option<f64> {
        self.ratings
            .get(&learner_id.to_string())
            .and_then(|r| r.ratings.get(content_id).copied())
    }

    pub fn has_ratings(&self, learner_id: &str) -> bool {
        self.ratings
            .get(&learner_id.to_string())
            .map(|r| !r.ratings.is_empty())
            .unwrap_or(false)
    }

    /// Learners whose rating pattern correlates above the threshold.
    /// Served from cache while the learner's own ratings are unchanged.
    pub fn similar_learners(&self, learner_id: &str) -> Vec<String> {
        let own = match self.ratings.get(&learner_id.to_string()) {
            Some(r) if !r.ratings.is_empty() => r,
            _ => return Vec::new(),
        };

        if let Some(cached) = self.similarity_cache.get(&learner_id.to_string()) {
            if cached.generation == own.generation {
                return cached.similar;
            }
        }

        let mut similar: Vec<String> = self
            .ratings
            .collect_where(|id, other| {
                id != learner_id
                    && pearson_similarity(&own.ratings, &other.ratings, self.min_common_ratings)
                        .map(|r| r > self.similarity_threshold)
                        .unwrap_or(false)
            })
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        similar.sort();

        self.similarity_cache.insert(
            learner_id.to_string(),
            CachedSimilarity {
                generation: own.generation,
                similar: similar.clone(),
            },
        );
        similar
    }

    /// Content ids similar learners rated highly (mean above the score
    /// threshold), excluding anything already recommended.
    pub fn suggest_content(&self, learner_id: &str, exclude: &[&str]) -> Vec<(String, f64)> {
        let similar = self.similar_learners(learner_id);
        if similar.is_empty() {
            return Vec::new();
        }

        let mut totals: HashMap<String, (f64, u32)> = HashMap::new();
        for peer in &similar {
            if let Some(peer_ratings) = self.ratings.get(peer) {
                for (content_id, &score) in &peer_ratings.ratings {
                    let entry = totals.entry(content_id.clone()).or_insert((0.0, 0));
                    entry.0 += score;
                    entry.1 += 1;
                }
            }
        }

        let mut suggestions: Vec<(String, f64)> = totals
            .into_iter()
            .filter_map(|(content_id, (sum, count))| {
                let mean = sum / count as f64;
                if mean > self.score_threshold && !exclude.contains(&content_id.as_str()) {
                    Some((content_id, mean))
                } else {
                    None
                }
            })
            .collect();
        suggestions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        suggestions
    }
}
