use chrono::{Duration, TimeZone, Utc};
use conductor::domain::models::{
    Classification, ExpertiseLevel, LexicalMarker, PolicyConfig, PolicyId, ProjectMode,
    RequestMarkers,
};
use conductor::services::{PolicySelector, SelectionInput};
use proptest::prelude::*;

fn level() -> impl Strategy<Value = ExpertiseLevel> {
    prop::sample::select(vec![
        ExpertiseLevel::Beginner,
        ExpertiseLevel::Intermediate,
        ExpertiseLevel::Expert,
    ])
}

fn markers() -> impl Strategy<Value = RequestMarkers> {
    (
        prop::bool::weighted(0.1),
        prop::option::weighted(0.2, prop::sample::select(vec![LexicalMarker::Brevity, LexicalMarker::Explanation])),
    )
        .prop_map(|(formal_command, lexical)| RequestMarkers {
            formal_command,
            lexical,
        })
}

fn input() -> impl Strategy<Value = SelectionInput> {
    (level(), 0.0f64..=1.0, markers(), prop::bool::weighted(0.1)).prop_map(
        |(level, confidence, markers, team)| SelectionInput {
            markers,
            project_mode: if team { ProjectMode::Team } else { ProjectMode::Personal },
            classification: Classification {
                level,
                beginner_score: 1.0,
                expert_score: 1.0,
                confidence,
            },
        },
    )
}

proptest! {
    /// Property: switches are spaced by at least the cooldown and always
    /// carry more than the minimum confidence
    #[test]
    fn prop_switches_respect_guard(
        rounds in prop::collection::vec((input(), 0i64..400), 1..60)
    ) {
        let config = PolicyConfig::default();
        let mut selector = PolicySelector::new(config.clone());
        let mut now = Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).single().unwrap();
        let mut last_switch: Option<chrono::DateTime<Utc>> = None;
        let mut switches = 0u32;

        for (input, gap) in rounds {
            now += Duration::seconds(gap);
            let before = selector.current();
            let decision = selector.select(&input, now);

            if decision.switched {
                prop_assert!(decision.confidence > config.min_confidence);
                prop_assert_ne!(decision.policy, before);
                if let Some(previous) = last_switch {
                    prop_assert!((now - previous).num_seconds() >= config.cooldown_secs);
                }
                last_switch = Some(now);
                switches += 1;
            } else {
                prop_assert_eq!(decision.policy, before);
            }
            prop_assert_eq!(selector.current(), decision.policy);
        }

        prop_assert_eq!(selector.state().switches, switches);
    }

    /// Property: with no elapsed time only the first switch can happen
    #[test]
    fn prop_no_time_means_at_most_one_switch(
        inputs in prop::collection::vec(input(), 1..40)
    ) {
        let mut selector = PolicySelector::new(PolicyConfig::default());
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).single().unwrap();

        let switched = inputs
            .iter()
            .filter(|input| selector.select(input, now).switched)
            .count();

        prop_assert!(switched <= 1);
    }

    /// Property: the candidate ignores the guard, so structural markers
    /// always name their policy
    #[test]
    fn prop_formal_command_candidate_is_project_manager(input in input()) {
        let selector = PolicySelector::new(PolicyConfig::default());
        let input = SelectionInput {
            markers: RequestMarkers {
                formal_command: true,
                ..input.markers
            },
            ..input
        };

        let (candidate, _, confidence) = selector.candidate(&input);
        prop_assert_eq!(candidate, PolicyId::ProjectManager);
        prop_assert!((confidence - 1.0).abs() < f64::EPSILON);
    }
}
