//! Spaced-repetition scheduling (SM-2 family).
//!
//! Review intervals grow through the classic 1 -> 6 -> prev*EF recurrence,
//! with the easiness factor retuned after every review and floored at 1.3.
//! Retention between reviews decays along a 30-day-half-life forgetting
//! curve anchored to the most recent performance.
//!
//! All mutations belonging to one call land as a single atomic store
//! transition; the async surface runs on a blocking task so a caller that
//! stops waiting never observes a half-applied update.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SchedulerParams;
use crate::errors::{require_id, EngineError, EngineResult};
use crate::store::ShardedStore;
use crate::types::{
    CompletedSession, LearningSchedule, Priority, RetentionAssessment, RetentionLevel,
    ReviewAction, ScheduledSession, SessionType, STRENGTH_THRESHOLD, WEAKNESS_THRESHOLD,
};

/// Interval growth is capped so a lucky streak cannot push a review past
/// half a year.
pub const MAX_INTERVAL_DAYS: u32 = 180;
/// Days for retention to fall halfway toward its long-term floor.
const FORGETTING_HALF_LIFE_DAYS: f64 = 30.0;
/// Follow-up chain length after a completed session.
const FOLLOW_UP_COUNT: usize = 3;

/// Pure SM-2 interval recurrence.
///
/// A failing score resets the chain to one day regardless of history.
pub fn calculate_next_interval(prev_interval_days: u32, easiness_factor: f64, performance_score: f64) -> u32 {
    if performance_score < 0.6 {
        return 1;
    }
    match prev_interval_days {
        0 => 1,
        1 => 6,
        prev => {
            let next = (prev as f64 * easiness_factor).ceil();
            (next as u32).min(MAX_INTERVAL_DAYS)
        }
    }
}

/// Forgetting-curve retention: equal to the performance score immediately
/// after a review, decaying exponentially toward half of it as the gap
/// since the last review grows.
pub fn retention_score(performance_score: f64, days_since_last_review: i64) -> f64 {
    let performance = performance_score.clamp(0.0, 1.0);
    let days = days_since_last_review.max(0) as f64;
    let decay = (-days / FORGETTING_HALF_LIFE_DAYS).exp();
    (performance * (0.5 + 0.5 * decay)).clamp(0.0, 1.0)
}

/// SM-2 easiness recurrence with the performance score mapped onto the
/// 0..=5 quality scale.
fn next_easiness(easiness_factor: f64, performance_score: f64, floor: f64) -> f64 {
    let q = performance_score.clamp(0.0, 1.0) * 5.0;
    let next = easiness_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02));
    next.max(floor)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicKey {
    pub learner_id: String,
    pub topic: String,
}

impl TopicKey {
    pub fn new(learner_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            topic: topic.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicReviewData {
    pub topic: String,
    pub easiness_factor: f64,
    pub review_count: u32,
    pub last_review_time: Option<DateTime<Utc>>,
    pub last_performance_score: f64,
    pub last_interval_days: u32,
}

impl TopicReviewData {
    fn new(topic: &str, default_easiness: f64) -> Self {
        Self {
            topic: topic.to_string(),
            easiness_factor: default_easiness,
            review_count: 0,
            last_review_time: None,
            last_performance_score: 0.0,
            last_interval_days: 0,
        }
    }
}

struct SchedulerInner {
    params: SchedulerParams,
    reviews: ShardedStore<TopicKey, TopicReviewData>,
    pending: ShardedStore<String, Vec<ScheduledSession>>,
}

impl SchedulerInner {
    fn push_pending(&self, learner_id: &str, sessions: &[ScheduledSession]) {
        let cap = self.params.pending_ledger_cap;
        self.pending.update(
            learner_id.to_string(),
            Vec::new,
            |ledger| {
                ledger.extend_from_slice(sessions);
                ledger.sort_by_key(|s| s.scheduled_time);
                if ledger.len() > cap {
                    let overflow = ledger.len() - cap;
                    ledger.drain(0..overflow);
                }
            },
        );
    }

    fn schedule_follow_up(
        &self,
        learner_id: &str,
        session: &CompletedSession,
    ) -> EngineResult<Vec<ScheduledSession>> {
        require_id(learner_id, "learnerId")?;
        require_id(&session.topic, "topic")?;

        let now = Utc::now();
        let performance = session.performance_score();
        let key = TopicKey::new(learner_id, &session.topic);
        let default_easiness = self.params.default_easiness;
        let min_easiness = self.params.min_easiness;

        // One atomic transition covering count, timestamps, easiness and
        // the interval chain.
        let intervals = self.reviews.update(
            key,
            || TopicReviewData::new(&session.topic, default_easiness),
            |data| {
                data.review_count += 1;
                data.last_review_time = Some(now);
                data.last_performance_score = performance;
                data.easiness_factor = next_easiness(data.easiness_factor, performance, min_easiness);

                let mut intervals = Vec::with_capacity(FOLLOW_UP_COUNT);
                let mut prev = data.last_interval_days;
                for _ in 0..FOLLOW_UP_COUNT {
                    let next = calculate_next_interval(prev, data.easiness_factor, performance);
                    intervals.push(next);
                    prev = next;
                }
                data.last_interval_days = intervals[0];
                intervals
            },
        );

        let sessions: Vec<ScheduledSession> = intervals
            .iter()
            .enumerate()
            .map(|(i, &days)| {
                let priority = if performance < 0.5 {
                    Priority::High
                } else if performance < 0.7 || i == 0 {
                    Priority::Medium
                } else {
                    Priority::Low
                };
                ScheduledSession {
                    id: Uuid::new_v4(),
                    learner_id: learner_id.to_string(),
                    topic: session.topic.clone(),
                    session_type: SessionType::FollowUpReview,
                    scheduled_time: now + Duration::days(days as i64),
                    estimated_duration_minutes: 15 + 5 * i as u32,
                    priority,
                    description: format!("Follow-up review {} of {}", i + 1, session.topic),
                }
            })
            .collect();

        self.push_pending(learner_id, &sessions);
        tracing::info!(
            learner = learner_id,
            topic = %session.topic,
            performance,
            intervals = ?intervals,
            "scheduled follow-up reviews"
        );
        Ok(sessions)
    }

    fn assess_retention(
        &self,
        learner_id: &str,
        topic: &str,
        follow_up: &CompletedSession,
    ) -> EngineResult<RetentionAssessment> {
        require_id(learner_id, "learnerId")?;
        require_id(topic, "topic")?;

        let now = Utc::now();
        let performance = follow_up.performance_score();
        let key = TopicKey::new(learner_id, topic);
        let default_easiness = self.params.default_easiness;
        let topic_owned = topic.to_string();

        let (days_since, review_count, recommended_next) = self.reviews.update(
            key,
            || TopicReviewData::new(&topic_owned, default_easiness),
            |data| {
                let days_since = data
                    .last_review_time
                    .map(|t| (now - t).num_days().max(0))
                    .unwrap_or(0);
                let recommended = calculate_next_interval(
                    data.last_interval_days,
                    data.easiness_factor,
                    performance,
                );
                data.last_interval_days = recommended;
                (days_since, data.review_count, recommended)
            },
        );

        let retention_score = retention_score(performance, days_since);

        let mut strength_areas: Vec<String> = follow_up
            .outcomes
            .iter()
            .filter(|o| o.achievement_score >= STRENGTH_THRESHOLD)
            .map(|o| o.objective.clone())
            .collect();
        let weakness_areas: Vec<String> = follow_up
            .outcomes
            .iter()
            .filter(|o| o.achievement_score < WEAKNESS_THRESHOLD)
            .map(|o| o.objective.clone())
            .collect();
        if strength_areas.is_empty() {
            strength_areas.push("Completed session".to_string());
        }

        Ok(RetentionAssessment {
            learner_id: learner_id.to_string(),
            topic: topic.to_string(),
            retention_score,
            recall_accuracy: performance,
            days_since_last_review: days_since,
            total_review_count: review_count,
            strength_areas,
            weakness_areas,
            recommended_action: ReviewAction::from_retention_score(retention_score),
            recommended_next_review_days: recommended_next,
            retention_level: RetentionLevel::from_score(retention_score),
        })
    }

    fn adjust_schedule(
        &self,
        learner_id: &str,
        assessment: &RetentionAssessment,
    ) -> EngineResult<LearningSchedule> {
        require_id(learner_id, "learnerId")?;
        require_id(&assessment.topic, "topic")?;

        let now = Utc::now();
        let mut sessions = Vec::with_capacity(2);

        if assessment.retention_score < 0.4 || assessment.recommended_action.needs_immediate_review() {
            sessions.push(ScheduledSession {
                id: Uuid::new_v4(),
                learner_id: learner_id.to_string(),
                topic: assessment.topic.clone(),
                session_type: SessionType::ImmediateReview,
                scheduled_time: now + Duration::hours(2),
                estimated_duration_minutes: 20,
                priority: Priority::High,
                description: format!("Immediate review of {}", assessment.topic),
            });
        }

        sessions.push(ScheduledSession {
            id: Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            topic: assessment.topic.clone(),
            session_type: SessionType::ScheduledReview,
            scheduled_time: now + Duration::days(assessment.recommended_next_review_days as i64),
            estimated_duration_minutes: 15,
            priority: assessment.retention_level.review_priority(),
            description: format!("Scheduled review of {}", assessment.topic),
        });

        self.push_pending(learner_id, &sessions);

        Ok(LearningSchedule {
            learner_id: learner_id.to_string(),
            topic: assessment.topic.clone(),
            sessions,
            recommended_weekly_frequency: assessment.retention_level.weekly_review_frequency(),
        })
    }
}

/// Cheaply cloneable handle; clones share the same stores.
#[derive(Clone)]
pub struct RetentionScheduler {
    inner: Arc<SchedulerInner>,
}

impl RetentionScheduler {
    pub fn new(params: SchedulerParams) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                params,
                reviews: ShardedStore::new(),
                pending: ShardedStore::new(),
            }),
        }
    }

    /// Runs a scheduler computation off the caller's task. A panic inside
    /// the closure surfaces as `Computation`; the store either saw the whole
    /// transition or none of it.
    async fn run<T, F>(&self, f: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SchedulerInner) -> EngineResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || f(&inner)).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "scheduler task failed");
                Err(EngineError::Computation(err.to_string()))
            }
        }
    }

    /// Books three chained spaced-repetition reviews for the session topic.
    ///
    /// The easiness factor is retuned from this session's performance before
    /// any interval is computed, so the freshly updated factor drives the
    /// whole interval chain.
    pub async fn schedule_follow_up(
        &self,
        learner_id: &str,
        session: &CompletedSession,
    ) -> EngineResult<Vec<ScheduledSession>> {
        let learner_id = learner_id.to_string();
        let session = session.clone();
        self.run(move |inner| inner.schedule_follow_up(&learner_id, &session))
            .await
    }

    /// Scores how well the topic survived the gap since its last review.
    pub async fn assess_retention(
        &self,
        learner_id: &str,
        topic: &str,
        follow_up: &CompletedSession,
    ) -> EngineResult<RetentionAssessment> {
        let learner_id = learner_id.to_string();
        let topic = topic.to_string();
        let follow_up = follow_up.clone();
        self.run(move |inner| inner.assess_retention(&learner_id, &topic, &follow_up))
            .await
    }

    pub async fn adjust_schedule(
        &self,
        learner_id: &str,
        assessment: &RetentionAssessment,
    ) -> EngineResult<LearningSchedule> {
        let learner_id = learner_id.to_string();
        let assessment = assessment.clone();
        self.run(move |inner| inner.adjust_schedule(&learner_id, &assessment))
            .await
    }

    /// Next review due for the topic, `None` until it has been reviewed once.
    pub async fn next_review_time(
        &self,
        learner_id: &str,
        topic: &str,
    ) -> EngineResult<Option<DateTime<Utc>>> {
        require_id(learner_id, "learnerId")?;
        require_id(topic, "topic")?;
        let key = TopicKey::new(learner_id, topic);
        Ok(self.inner.reviews.get(&key).and_then(|data| {
            data.last_review_time
                .map(|t| t + Duration::days(data.last_interval_days as i64))
        }))
    }

    /// Upcoming sessions from the pending ledger, soonest first.
    pub async fn pending_follow_ups(&self, learner_id: &str) -> EngineResult<Vec<ScheduledSession>> {
        require_id(learner_id, "learnerId")?;
        let now = Utc::now();
        let mut sessions: Vec<ScheduledSession> = self
            .inner
            .pending
            .get(&learner_id.to_string())
            .unwrap_or_default()
            .into_iter()
            .filter(|s| s.scheduled_time > now)
            .collect();
        sessions.sort_by_key(|s| s.scheduled_time);
        Ok(sessions)
    }

    pub fn review_data(&self, learner_id: &str, topic: &str) -> Option<TopicReviewData> {
        self.inner.reviews.get(&TopicKey::new(learner_id, topic))
    }

    /// Drops topics whose last review predates the cutoff, along with any
    /// pending sessions already in the past.
    pub fn prune_idle(&self, older_than: DateTime<Utc>) -> usize {
        let removed = self.inner.reviews.retain(|_, data| match data.last_review_time {
            Some(t) => t >= older_than,
            None => true,
        });
        let now = Utc::now();
        self.inner.pending.retain(|_, ledger| {
            ledger.retain(|s| s.scheduled_time > now);
            !ledger.is_empty()
        });
        if removed > 0 {
            tracing::info!(removed, "pruned idle topic review data");
        }
        removed
    }
}

impl Default for RetentionScheduler {
    fn default() -> Self {
        Self::new(SchedulerParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionOutcome;

    fn session(topic: &str, scores: &[f64]) -> CompletedSession {
        let outcomes = scores
            .iter()
            .enumerate()
            .map(|(i, &s)| SessionOutcome::new(format!("objective-{i}"), s))
            .collect();
        CompletedSession::new("s1", topic, outcomes)
    }

    #[test]
    fn interval_recurrence_table() {
        assert_eq!(calculate_next_interval(0, 2.5, 0.9), 1);
        assert_eq!(calculate_next_interval(1, 2.5, 0.9), 6);
        assert_eq!(calculate_next_interval(6, 2.5, 0.9), 15);
        assert_eq!(calculate_next_interval(100, 2.5, 0.9), 180);
        // Failing score resets no matter the history.
        assert_eq!(calculate_next_interval(100, 2.5, 0.3), 1);
        assert_eq!(calculate_next_interval(0, 2.5, 0.59), 1);
    }

    #[test]
    fn retention_decays_from_performance_toward_half() {
        let p = 0.9;
        // Fresh review: the curve starts at the performance score itself.
        assert!((retention_score(p, 0) - p).abs() < 1e-9);
        let month = retention_score(p, 30);
        let quarter = retention_score(p, 90);
        assert!(month < p);
        assert!(quarter < month);
        // The floor is half the performance score, never below.
        assert!(quarter > 0.5 * p);
        assert!((retention_score(p, 100_000) - 0.5 * p).abs() < 1e-9);
        // Out-of-domain inputs are clamped, not propagated.
        assert!((retention_score(1.5, -3) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn easiness_never_falls_below_floor() {
        let mut ef = 2.5;
        for _ in 0..50 {
            ef = next_easiness(ef, 0.0, 1.3);
        }
        assert!(ef >= 1.3);
    }

    #[test]
    fn easiness_grows_on_perfect_recall() {
        let ef = next_easiness(2.5, 1.0, 1.3);
        assert!(ef > 2.5);
    }

    #[tokio::test]
    async fn follow_up_produces_three_chained_sessions() {
        let scheduler = RetentionScheduler::default();
        let sessions = scheduler
            .schedule_follow_up("alice", &session("ownership", &[0.9, 0.9]))
            .await
            .unwrap();
        assert_eq!(sessions.len(), 3);
        for pair in sessions.windows(2) {
            assert!(pair[0].scheduled_time <= pair[1].scheduled_time);
        }
        assert_eq!(sessions[0].priority, Priority::Medium);
        assert_eq!(sessions[1].priority, Priority::Low);
        assert_eq!(sessions[2].priority, Priority::Low);
        assert_eq!(sessions[0].estimated_duration_minutes, 15);
        assert_eq!(sessions[2].estimated_duration_minutes, 25);
    }

    #[tokio::test]
    async fn weak_performance_schedules_high_priority() {
        let scheduler = RetentionScheduler::default();
        let sessions = scheduler
            .schedule_follow_up("alice", &session("ownership", &[0.2, 0.3]))
            .await
            .unwrap();
        assert!(sessions.iter().all(|s| s.priority == Priority::High));
        // Failed recall resets every interval in the chain to one day.
        let now = Utc::now();
        for s in &sessions {
            assert!((s.scheduled_time - now).num_days() <= 1);
        }
    }

    #[tokio::test]
    async fn assessment_without_history_has_zero_day_gap() {
        let scheduler = RetentionScheduler::default();
        let assessment = scheduler
            .assess_retention("alice", "ownership", &session("ownership", &[0.8]))
            .await
            .unwrap();
        assert_eq!(assessment.days_since_last_review, 0);
        // Fresh review: retention equals the performance score.
        assert!((assessment.retention_score - 0.8).abs() < 1e-9);
        assert_eq!(assessment.retention_level, RetentionLevel::Excellent);
    }

    #[tokio::test]
    async fn assessment_extracts_strengths_and_weaknesses() {
        let scheduler = RetentionScheduler::default();
        let review = CompletedSession::new(
            "s2",
            "ownership",
            vec![
                SessionOutcome::new("borrowing", 0.9),
                SessionOutcome::new("lifetimes", 0.4),
                SessionOutcome::new("slices", 0.7),
            ],
        );
        let assessment = scheduler
            .assess_retention("alice", "ownership", &review)
            .await
            .unwrap();
        assert_eq!(assessment.strength_areas, vec!["borrowing".to_string()]);
        assert_eq!(assessment.weakness_areas, vec!["lifetimes".to_string()]);
    }

    #[tokio::test]
    async fn assessment_defaults_strength_label() {
        let scheduler = RetentionScheduler::default();
        let review = session("ownership", &[0.7, 0.65]);
        let assessment = scheduler
            .assess_retention("alice", "ownership", &review)
            .await
            .unwrap();
        assert_eq!(assessment.strength_areas, vec!["Completed session".to_string()]);
    }

    #[tokio::test]
    async fn poor_retention_triggers_immediate_review() {
        let scheduler = RetentionScheduler::default();
        let assessment = scheduler
            .assess_retention("alice", "ownership", &session("ownership", &[0.2]))
            .await
            .unwrap();
        assert!(assessment.recommended_action.needs_immediate_review());

        let schedule = scheduler.adjust_schedule("alice", &assessment).await.unwrap();
        assert_eq!(schedule.sessions.len(), 2);
        assert_eq!(schedule.sessions[0].session_type, SessionType::ImmediateReview);
        assert_eq!(schedule.sessions[0].priority, Priority::High);
        assert_eq!(schedule.recommended_weekly_frequency, 5);
    }

    #[tokio::test]
    async fn good_retention_schedules_single_review() {
        let scheduler = RetentionScheduler::default();
        let assessment = scheduler
            .assess_retention("alice", "ownership", &session("ownership", &[0.85, 0.9]))
            .await
            .unwrap();
        let schedule = scheduler.adjust_schedule("alice", &assessment).await.unwrap();
        assert_eq!(schedule.sessions.len(), 1);
        assert_eq!(schedule.sessions[0].session_type, SessionType::ScheduledReview);
        assert_eq!(schedule.recommended_weekly_frequency, 1);
    }

    #[tokio::test]
    async fn pending_ledger_returns_upcoming_sorted() {
        let scheduler = RetentionScheduler::default();
        scheduler
            .schedule_follow_up("alice", &session("ownership", &[0.9]))
            .await
            .unwrap();
        scheduler
            .schedule_follow_up("alice", &session("traits", &[0.9]))
            .await
            .unwrap();
        let pending = scheduler.pending_follow_ups("alice").await.unwrap();
        assert_eq!(pending.len(), 6);
        for pair in pending.windows(2) {
            assert!(pair[0].scheduled_time <= pair[1].scheduled_time);
        }
        assert!(scheduler.pending_follow_ups("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn next_review_time_tracks_first_interval() {
        let scheduler = RetentionScheduler::default();
        assert!(scheduler
            .next_review_time("alice", "ownership")
            .await
            .unwrap()
            .is_none());
        scheduler
            .schedule_follow_up("alice", &session("ownership", &[0.9]))
            .await
            .unwrap();
        let next = scheduler
            .next_review_time("alice", "ownership")
            .await
            .unwrap()
            .expect("review scheduled");
        assert!((next - Utc::now()).num_days() <= 1);
    }

    #[tokio::test]
    async fn repeated_reviews_grow_intervals() {
        let scheduler = RetentionScheduler::default();
        let mut firsts = Vec::new();
        for _ in 0..3 {
            let sessions = scheduler
                .schedule_follow_up("alice", &session("ownership", &[0.95]))
                .await
                .unwrap();
            let days = (sessions[0].scheduled_time - Utc::now()).num_days();
            firsts.push(days);
        }
        // 1 day, then 6, then 6*EF.
        assert!(firsts[0] <= 1);
        assert!(firsts[1] > firsts[0]);
        assert!(firsts[2] > firsts[1]);
    }

    #[tokio::test]
    async fn validation_rejects_blank_learner() {
        let scheduler = RetentionScheduler::default();
        let result = scheduler
            .schedule_follow_up("", &session("ownership", &[0.9]))
            .await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn prune_trims_past_sessions_inside_a_live_ledger() {
        let scheduler = RetentionScheduler::default();
        let sessions = scheduler
            .schedule_follow_up("alice", &session("ownership", &[0.9]))
            .await
            .unwrap();
        // Backdate one ledger entry; the rest stay in the future.
        let backdated = scheduler
            .inner
            .pending
            .update_existing(&"alice".to_string(), |ledger| {
                ledger[0].scheduled_time = Utc::now() - Duration::days(10);
            });
        assert!(backdated.is_some());

        scheduler.prune_idle(Utc::now() - Duration::days(365));
        let ledger = scheduler.inner.pending.get(&"alice".to_string()).unwrap();
        assert_eq!(ledger.len(), sessions.len() - 1);
        let now = Utc::now();
        assert!(ledger.iter().all(|s| s.scheduled_time > now));
    }

    #[tokio::test]
    async fn prune_drops_stale_topics() {
        let scheduler = RetentionScheduler::default();
        scheduler
            .schedule_follow_up("alice", &session("ownership", &[0.9]))
            .await
            .unwrap();
        assert_eq!(scheduler.prune_idle(Utc::now() - Duration::days(1)), 0);
        assert_eq!(scheduler.prune_idle(Utc::now() + Duration::days(1)), 1);
        assert!(scheduler.review_data("alice", "ownership").is_none());
    }
}
