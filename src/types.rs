use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Achievement score below which an objective counts as missed.
pub const WEAKNESS_THRESHOLD: f64 = 0.6;
/// Achievement score at which an objective counts as a strength.
pub const STRENGTH_THRESHOLD: f64 = 0.8;
/// Performance assumed when a session reports no outcomes.
pub const DEFAULT_PERFORMANCE_SCORE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionType {
    FollowUpReview,
    ImmediateReview,
    ScheduledReview,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FollowUpReview => "follow-up-review",
            Self::ImmediateReview => "immediate-review",
            Self::ScheduledReview => "scheduled-review",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionLevel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl RetentionLevel {
    /// Same cut points as the recommended-action thresholds.
    pub fn from_score(retention_score: f64) -> Self {
        if retention_score < 0.4 {
            Self::Poor
        } else if retention_score < 0.6 {
            Self::Fair
        } else if retention_score < 0.8 {
            Self::Good
        } else {
            Self::Excellent
        }
    }

    pub fn review_priority(&self) -> Priority {
        match self {
            Self::Poor => Priority::High,
            Self::Fair => Priority::Medium,
            Self::Good | Self::Excellent => Priority::Low,
        }
    }

    /// Recommended reviews per week at this retention level.
    pub fn weekly_review_frequency(&self) -> u32 {
        match self {
            Self::Poor => 5,
            Self::Fair => 3,
            Self::Good => 2,
            Self::Excellent => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewAction {
    ImmediateReview,
    ReviewWithinDays,
    ContinueSchedule,
    ExtendIntervals,
}

impl ReviewAction {
    pub fn from_retention_score(retention_score: f64) -> Self {
        if retention_score < 0.4 {
            Self::ImmediateReview
        } else if retention_score < 0.6 {
            Self::ReviewWithinDays
        } else if retention_score < 0.8 {
            Self::ContinueSchedule
        } else {
            Self::ExtendIntervals
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImmediateReview => "immediate review",
            Self::ReviewWithinDays => "review within 2-3 days",
            Self::ContinueSchedule => "continue scheduled reviews",
            Self::ExtendIntervals => "extend intervals",
        }
    }

    pub fn needs_immediate_review(&self) -> bool {
        matches!(self, Self::ImmediateReview)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl DifficultyLevel {
    pub fn from_difficulty(difficulty: f64) -> Self {
        if difficulty < 0.3 {
            Self::Beginner
        } else if difficulty < 0.55 {
            Self::Intermediate
        } else if difficulty < 0.8 {
            Self::Advanced
        } else {
            Self::Expert
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }
}

/// One graded objective from a completed learning session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub objective: String,
    pub achievement_score: f64,
}

impl SessionOutcome {
    pub fn new(objective: impl Into<String>, achievement_score: f64) -> Self {
        Self {
            objective: objective.into(),
            achievement_score: achievement_score.clamp(0.0, 1.0),
        }
    }
}

/// Session record handed over by the session-tracking collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    pub id: String,
    pub topic: String,
    pub outcomes: Vec<SessionOutcome>,
}

impl CompletedSession {
    pub fn new(id: impl Into<String>, topic: impl Into<String>, outcomes: Vec<SessionOutcome>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            outcomes,
        }
    }

    /// Mean achievement over all outcomes, 0.7 when the session reports none.
    pub fn performance_score(&self) -> f64 {
        if self.outcomes.is_empty() {
            return DEFAULT_PERFORMANCE_SCORE;
        }
        let sum: f64 = self.outcomes.iter().map(|o| o.achievement_score).sum();
        (sum / self.outcomes.len() as f64).clamp(0.0, 1.0)
    }
}

/// A review session the engine asks the calendar collaborator to place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSession {
    pub id: Uuid,
    pub learner_id: String,
    pub topic: String,
    pub session_type: SessionType,
    pub scheduled_time: DateTime<Utc>,
    pub estimated_duration_minutes: u32,
    pub priority: Priority,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionAssessment {
    pub learner_id: String,
    pub topic: String,
    pub retention_score: f64,
    pub recall_accuracy: f64,
    pub days_since_last_review: i64,
    pub total_review_count: u32,
    pub strength_areas: Vec<String>,
    pub weakness_areas: Vec<String>,
    pub recommended_action: ReviewAction,
    pub recommended_next_review_days: u32,
    pub retention_level: RetentionLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningSchedule {
    pub learner_id: String,
    pub topic: String,
    pub sessions: Vec<ScheduledSession>,
    pub recommended_weekly_frequency: u32,
}

/// Content item produced by the recommendation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningContent {
    pub id: String,
    pub content_type: String,
    pub title: String,
    pub body: String,
    pub difficulty: f64,
    pub level: DifficultyLevel,
    pub estimated_minutes: u32,
    pub prerequisites: Vec<String>,
}

impl LearningContent {
    /// Re-derives the coarse level label from the current difficulty value.
    pub fn relabel(&mut self) {
        self.level = DifficultyLevel::from_difficulty(self.difficulty);
    }
}

/// Skill deficit computed by the assessment collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGap {
    pub skill_domain: String,
    pub gap_size: f64,
}

impl SkillGap {
    pub fn new(skill_domain: impl Into<String>, gap_size: f64) -> Self {
        Self {
            skill_domain: skill_domain.into(),
            gap_size: gap_size.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPreferences {
    pub learner_id: String,
    pub preferred_content_types: HashSet<String>,
    pub preferred_difficulty: f64,
    pub detail_level: String,
}

impl LearningPreferences {
    pub fn new(learner_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            preferred_content_types: HashSet::new(),
            preferred_difficulty: 0.5,
            detail_level: "standard".to_string(),
        }
    }

    pub fn prefers_type(&self, content_type: &str) -> bool {
        self.preferred_content_types.contains(content_type)
    }
}

/// Mastery is tracked per learner per skill, never shared across learners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillKey {
    pub learner_id: String,
    pub skill_domain: String,
}

impl SkillKey {
    pub fn new(learner_id: impl Into<String>, skill_domain: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            skill_domain: skill_domain.into(),
        }
    }
}
