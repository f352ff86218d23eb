//! Property-based tests for the planning pipeline: weighted distribution,
//! round-robin interleaving, and deterministic decomposition.

use proptest::prelude::*;
use spool::config::RetryPolicy;
use spool::plan::{
    decompose, interleave, plan_distribution, CategoryQuota, CategoryWeight, ContentSpec,
    JobRequest, PinSpec, SlideSpec,
};
use spool::types::TaskKind;
use std::collections::HashSet;

fn weight_rows() -> impl Strategy<Value = Vec<CategoryWeight>> {
    prop::collection::vec(0.1f64..50.0, 1..8).prop_map(|weights| {
        weights
            .into_iter()
            .enumerate()
            .map(|(idx, weight)| CategoryWeight {
                category: format!("cat{}", idx),
                weight,
            })
            .collect()
    })
}

fn quota_targets() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..=12, 1..7)
}

fn build_quotas(targets: &[u32]) -> Vec<CategoryQuota> {
    targets
        .iter()
        .enumerate()
        .map(|(idx, target)| CategoryQuota::new(format!("cat{}", idx), *target))
        .collect()
}

fn requests() -> impl Strategy<Value = JobRequest> {
    (
        "[a-z]{1,24}",
        1u32..=20,
        prop::option::of((1u32..=12, any::<bool>())),
        prop::option::of((1u32..=40, 1usize..6)),
        any::<bool>(),
    )
        .prop_map(|(brief, chapters, slides, pins, test_mode)| JobRequest {
            brief,
            content: Some(ContentSpec { chapters }),
            slides: slides.map(|(count, lead_video)| SlideSpec { count, lead_video }),
            pins: pins.map(|(total, categories)| PinSpec {
                total,
                categories: (0..categories)
                    .map(|idx| CategoryWeight {
                        category: format!("cat{}", idx),
                        weight: (idx + 1) as f64,
                    })
                    .collect(),
            }),
            test_mode,
        })
}

/// Counts always sum to the requested total, with zero-count rows dropped.
#[test]
fn distribution_sums_to_total_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(1u32..=200, weight_rows()), |(total, weights)| {
            let counts = plan_distribution(total, &weights).unwrap();

            let sum: u32 = counts.iter().map(|c| c.count).sum();
            assert_eq!(sum, total);
            assert!(counts.iter().all(|c| c.count > 0));

            Ok(())
        })
        .unwrap();
}

/// Emitted categories keep the input order; planning twice gives the same
/// rows.
#[test]
fn distribution_order_and_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(1u32..=200, weight_rows()), |(total, weights)| {
            let counts = plan_distribution(total, &weights).unwrap();
            assert_eq!(counts, plan_distribution(total, &weights).unwrap());

            // Output categories must form a subsequence of the input list.
            let names: Vec<&str> = weights.iter().map(|w| w.category.as_str()).collect();
            let mut cursor = 0usize;
            for row in &counts {
                let offset = names[cursor..]
                    .iter()
                    .position(|name| *name == row.category)
                    .expect("category emitted out of input order");
                cursor += offset + 1;
            }

            Ok(())
        })
        .unwrap();
}

/// Every unit of quota is emitted exactly once and each category's variation
/// tags walk the 1..=5 cycle from the start.
#[test]
fn interleave_quota_and_variation_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&quota_targets(), |targets| {
            let slots = interleave(build_quotas(&targets));
            assert_eq!(slots.len() as u32, targets.iter().sum::<u32>());

            for (idx, target) in targets.iter().enumerate() {
                let name = format!("cat{}", idx);
                let variations: Vec<u8> = slots
                    .iter()
                    .filter(|slot| slot.category == name)
                    .map(|slot| slot.variation)
                    .collect();
                assert_eq!(variations.len() as u32, *target);

                let expected: Vec<u8> = (0..*target).map(|i| ((i % 5) + 1) as u8).collect();
                assert_eq!(variations, expected);
            }

            Ok(())
        })
        .unwrap();
}

/// No two consecutive emissions share a category while at least two
/// categories still hold quota. Only the single-category tail may repeat.
#[test]
fn interleave_adjacency_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&quota_targets(), |targets| {
            let slots = interleave(build_quotas(&targets));

            let mut remaining = targets.clone();
            let mut previous: Option<&str> = None;
            for slot in &slots {
                let live = remaining.iter().filter(|r| **r > 0).count();
                if live >= 2 {
                    if let Some(prev) = previous {
                        assert_ne!(
                            prev, slot.category,
                            "adjacent same-category emissions before the tail"
                        );
                    }
                }
                let idx: usize = slot.category.trim_start_matches("cat").parse().unwrap();
                remaining[idx] -= 1;
                previous = Some(slot.category.as_str());
            }

            Ok(())
        })
        .unwrap();
}

/// Decomposition is a pure function of its inputs: repeat plans are
/// identical, ids never collide, and the task count follows the request.
#[test]
fn decompose_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let policy = RetryPolicy::default();

    runner
        .run(&requests(), |request| {
            let first = decompose("job-prop", &request, &policy).unwrap();
            let second = decompose("job-prop", &request, &policy).unwrap();
            assert_eq!(first, second);

            let ids: HashSet<&str> = first.tasks.iter().map(|t| t.task_id.as_str()).collect();
            assert_eq!(ids.len(), first.total_tasks());

            let expected = if request.test_mode {
                request.enabled_kinds()
            } else {
                let chapters = request.content.as_ref().map_or(0, |c| c.chapters);
                let slides = request.slides.as_ref().map_or(0, |s| s.count);
                let pins = request.pins.as_ref().map_or(0, |p| p.total);
                (chapters + slides + pins) as usize
            };
            assert_eq!(first.total_tasks(), expected);

            // Chapters occupy the head of the plan in position order.
            let chapter_positions: Vec<u32> = first
                .tasks
                .iter()
                .filter(|t| t.kind == TaskKind::Chapter)
                .map(|t| t.position)
                .collect();
            let chapter_count = chapter_positions.len() as u32;
            assert_eq!(
                chapter_positions,
                (1..=chapter_count).collect::<Vec<u32>>()
            );

            Ok(())
        })
        .unwrap();
}

/// Task ids bind to the job id, so two jobs planned from one request never
/// share an id.
#[test]
fn task_ids_bind_to_job_id_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let policy = RetryPolicy::default();
    let request = JobRequest {
        brief: "window-box herbs".to_string(),
        content: Some(ContentSpec { chapters: 4 }),
        slides: Some(SlideSpec {
            count: 3,
            lead_video: true,
        }),
        pins: None,
        test_mode: false,
    };

    runner
        .run(&("[a-z]{1,12}", "[a-z]{1,12}"), |(a, b)| {
            prop_assume!(a != b);

            let plan_a = decompose(&format!("job-{}", a), &request, &policy).unwrap();
            let plan_b = decompose(&format!("job-{}", b), &request, &policy).unwrap();

            let ids_a: HashSet<&str> = plan_a.tasks.iter().map(|t| t.task_id.as_str()).collect();
            let ids_b: HashSet<&str> = plan_b.tasks.iter().map(|t| t.task_id.as_str()).collect();
            assert!(ids_a.is_disjoint(&ids_b));

            Ok(())
        })
        .unwrap();
}
