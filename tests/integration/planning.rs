//! Integration tests for job planning through the api and store
//!
//! Starts real jobs and inspects the persisted task records: kind layout,
//! weighted pin split, interleaving, variation cycling, and id determinism.

use crate::integration::test_utils::{
    fast_config, open_api, reference_request, CountingGenerator,
};
use spool::store::{TaskRecord, TaskStatus, TaskStore};
use spool::types::TaskKind;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn pins_of(tasks: &[TaskRecord]) -> Vec<&TaskRecord> {
    tasks.iter().filter(|t| t.kind == TaskKind::Pin).collect()
}

#[test]
fn reference_job_lays_out_fifty_six_tasks_in_kind_order() {
    let dir = TempDir::new().unwrap();
    let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));

    let started = api
        .start_job("job-ref".to_string(), reference_request())
        .unwrap();
    assert_eq!(started.total_tasks, 56);
    assert!(!started.test_mode);

    let tasks = store.list_by_job("job-ref").unwrap();
    assert_eq!(tasks.len(), 56);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Queued));

    // Chapters occupy the head with their own 1..=14 numbering.
    for (idx, task) in tasks[..14].iter().enumerate() {
        assert_eq!(task.kind, TaskKind::Chapter);
        assert_eq!(task.position, idx as u32 + 1);
    }

    // The deck follows: video on deck position 1, images on 2..=10.
    assert_eq!(tasks[14].kind, TaskKind::Video);
    assert_eq!(tasks[14].position, 1);
    for (idx, task) in tasks[15..24].iter().enumerate() {
        assert_eq!(task.kind, TaskKind::Slide);
        assert_eq!(task.position, idx as u32 + 2);
    }

    // Pins close out the job on positions 1..=32.
    for (idx, task) in tasks[24..].iter().enumerate() {
        assert_eq!(task.kind, TaskKind::Pin);
        assert_eq!(task.position, idx as u32 + 1);
    }
}

#[test]
fn pin_counts_follow_the_weighted_split() {
    let dir = TempDir::new().unwrap();
    let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));
    api.start_job("job-ref".to_string(), reference_request())
        .unwrap();

    let tasks = store.list_by_job("job-ref").unwrap();
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for pin in pins_of(&tasks) {
        *counts.entry(pin.category.as_deref().unwrap()).or_insert(0) += 1;
    }

    assert_eq!(counts["quotes"], 9);
    assert_eq!(counts["tips"], 8);
    assert_eq!(counts["howto"], 5);
    assert_eq!(counts["stats"], 4);
    assert_eq!(counts["myths"], 3);
    assert_eq!(counts["stories"], 3);
    assert_eq!(counts.values().sum::<u32>(), 32);
}

#[test]
fn pin_schedule_separates_categories_until_the_tail() {
    let dir = TempDir::new().unwrap();
    let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));
    api.start_job("job-ref".to_string(), reference_request())
        .unwrap();

    let tasks = store.list_by_job("job-ref").unwrap();
    let pins = pins_of(&tasks);

    // Remaining quota per category, walked down as the schedule is checked.
    let mut remaining: HashMap<&str, u32> = HashMap::new();
    for pin in &pins {
        *remaining.entry(pin.category.as_deref().unwrap()).or_insert(0) += 1;
    }

    for window in pins.windows(2) {
        let live = remaining.values().filter(|v| **v > 0).count();
        if live <= 1 {
            break;
        }
        assert_ne!(
            window[0].category, window[1].category,
            "same category back to back while others still had quota"
        );
        let head = window[0].category.as_deref().unwrap();
        *remaining.get_mut(head).unwrap() -= 1;
    }
}

#[test]
fn variations_cycle_independently_per_category() {
    let dir = TempDir::new().unwrap();
    let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));
    api.start_job("job-ref".to_string(), reference_request())
        .unwrap();

    let tasks = store.list_by_job("job-ref").unwrap();
    let mut by_category: HashMap<String, Vec<u8>> = HashMap::new();
    for pin in pins_of(&tasks) {
        by_category
            .entry(pin.category.clone().unwrap())
            .or_default()
            .push(pin.variation.unwrap());
    }

    for (category, variations) in by_category {
        let expected: Vec<u8> = (0..variations.len()).map(|i| (i % 5) as u8 + 1).collect();
        assert_eq!(variations, expected, "category {}", category);
    }
}

#[test]
fn replanning_after_delete_reproduces_identical_task_ids() {
    let dir = TempDir::new().unwrap();
    let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));

    api.start_job("job-ref".to_string(), reference_request())
        .unwrap();
    let first: Vec<String> = store
        .list_by_job("job-ref")
        .unwrap()
        .into_iter()
        .map(|t| t.task_id)
        .collect();

    assert!(api.delete_job(&"job-ref".to_string()).unwrap());
    api.start_job("job-ref".to_string(), reference_request())
        .unwrap();
    let second: Vec<String> = store
        .list_by_job("job-ref")
        .unwrap()
        .into_iter()
        .map(|t| t.task_id)
        .collect();

    assert_eq!(first, second);
}

#[test]
fn test_mode_collapses_to_one_probe_task_per_kind() {
    let dir = TempDir::new().unwrap();
    let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));

    let mut request = reference_request();
    request.test_mode = true;
    let started = api.start_job("job-probe".to_string(), request).unwrap();
    assert_eq!(started.total_tasks, 3);
    assert!(started.test_mode);

    let tasks = store.list_by_job("job-probe").unwrap();
    let kinds: Vec<TaskKind> = tasks.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TaskKind::Chapter, TaskKind::Video, TaskKind::Pin]);
    assert!(tasks.iter().all(|t| t.position == 1));

    // The probe pin bypasses distribution: first category, variation 1.
    assert_eq!(tasks[2].category.as_deref(), Some("quotes"));
    assert_eq!(tasks[2].variation, Some(1));
}

#[test]
fn payloads_carry_the_brief_and_sequence_context() {
    let dir = TempDir::new().unwrap();
    let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));
    api.start_job("job-ref".to_string(), reference_request())
        .unwrap();

    let tasks = store.list_by_job("job-ref").unwrap();
    let brief = "container gardening on small balconies";

    let chapter = &tasks[3];
    assert_eq!(chapter.payload["brief"].as_str(), Some(brief));
    assert_eq!(chapter.payload["chapter"].as_u64(), Some(4));
    assert_eq!(chapter.payload["chapter_count"].as_u64(), Some(14));

    let video = &tasks[14];
    assert_eq!(video.payload["format"].as_str(), Some("video"));
    assert_eq!(video.payload["slide"].as_u64(), Some(1));

    let pin = &tasks[24];
    assert_eq!(pin.payload["brief"].as_str(), Some(brief));
    assert_eq!(
        pin.payload["category"].as_str(),
        pin.category.as_deref()
    );
    assert_eq!(
        pin.payload["variation"].as_u64(),
        pin.variation.map(u64::from)
    );
}
