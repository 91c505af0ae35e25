//! Property-based tests for the numeric invariants of the engine's pure
//! cores: BKT probability bounds, the SM-2 interval recurrence, and
//! Pearson similarity ranges.

use proptest::prelude::*;

use tutor_engine::recommend::pearson_similarity;
use tutor_engine::{
    calculate_next_interval, retention_score, BktPriors, KnowledgeStateTracker, SkillKey,
};

fn arb_unit() -> impl Strategy<Value = f64> {
    (0u64..=1000u64).prop_map(|v| v as f64 / 1000.0)
}

fn arb_priors() -> impl Strategy<Value = BktPriors> {
    (arb_unit(), arb_unit(), arb_unit(), arb_unit()).prop_map(
        |(initial_knowledge, learning_rate, guess_rate, slip_rate)| BktPriors {
            initial_knowledge,
            learning_rate,
            guess_rate,
            slip_rate,
        },
    )
}

proptest! {
    #[test]
    fn knowledge_probability_stays_in_unit_interval(
        priors in arb_priors(),
        observations in prop::collection::vec(any::<bool>(), 0..100),
    ) {
        let tracker = KnowledgeStateTracker::new(priors);
        let key = SkillKey::new("learner", "skill");
        for correct in observations {
            let p = tracker.update_knowledge(&key, correct).unwrap();
            prop_assert!((0.0..=1.0).contains(&p), "probability {p} escaped [0,1]");
        }
    }

    #[test]
    fn success_prediction_stays_in_unit_interval(
        priors in arb_priors(),
        observations in prop::collection::vec(any::<bool>(), 0..50),
    ) {
        let tracker = KnowledgeStateTracker::new(priors);
        let key = SkillKey::new("learner", "skill");
        for correct in observations {
            tracker.update_knowledge(&key, correct).unwrap();
        }
        let p = tracker.predict_success_probability(&key);
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn passing_scores_follow_the_sm2_recurrence(
        prev in 2u32..10_000,
        ef in 1.3f64..4.0,
        score in 0.6f64..=1.0,
    ) {
        let next = calculate_next_interval(prev, ef, score);
        let expected = ((prev as f64 * ef).ceil() as u32).min(180);
        prop_assert_eq!(next, expected);
        prop_assert!(next <= 180);
    }

    #[test]
    fn failing_scores_always_reset(prev in 0u32..10_000, ef in 1.3f64..4.0, score in 0.0f64..0.6) {
        prop_assert_eq!(calculate_next_interval(prev, ef, score), 1);
    }

    #[test]
    fn base_cases_ignore_easiness(ef in 1.3f64..4.0, score in 0.6f64..=1.0) {
        prop_assert_eq!(calculate_next_interval(0, ef, score), 1);
        prop_assert_eq!(calculate_next_interval(1, ef, score), 6);
    }

    #[test]
    fn retention_is_bounded_by_performance_and_its_half(
        performance in arb_unit(),
        days in 0i64..4000,
    ) {
        let r = retention_score(performance, days);
        prop_assert!(r <= performance + 1e-9, "retention {r} above performance {performance}");
        prop_assert!(r >= 0.5 * performance - 1e-9, "retention {r} below the decay floor");
        // Monotone along the days axis.
        prop_assert!(retention_score(performance, days + 30) <= r + 1e-9);
    }

    #[test]
    fn retention_anchors_at_performance_on_day_zero(performance in arb_unit()) {
        prop_assert!((retention_score(performance, 0) - performance).abs() < 1e-9);
    }

    #[test]
    fn pearson_stays_in_correlation_range(
        pairs in prop::collection::vec((arb_unit(), arb_unit()), 2..20),
    ) {
        let a: std::collections::HashMap<String, f64> = pairs
            .iter()
            .enumerate()
            .map(|(i, (x, _))| (format!("c{i}"), *x))
            .collect();
        let b: std::collections::HashMap<String, f64> = pairs
            .iter()
            .enumerate()
            .map(|(i, (_, y))| (format!("c{i}"), *y))
            .collect();
        if let Some(r) = pearson_similarity(&a, &b, 2) {
            prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&r), "correlation {r} out of range");
        }
    }

    #[test]
    fn opportunity_estimates_are_zero_once_mastered(
        threshold in arb_unit(),
        correct_runs in 0usize..30,
    ) {
        let tracker = KnowledgeStateTracker::default();
        let key = SkillKey::new("learner", "skill");
        for _ in 0..correct_runs {
            tracker.update_knowledge(&key, true).unwrap();
        }
        let estimate = tracker.estimate_opportunities_to_mastery(&key, threshold);
        if tracker.knowledge_probability(&key) >= threshold {
            prop_assert_eq!(estimate, 0);
        } else {
            prop_assert!(estimate >= 1);
        }
    }
}
