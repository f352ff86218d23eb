//! Integration tests for the task store across realistic job lifecycles
//!
//! Exercises the persisted state machine the way the runner drives it,
//! including process restarts simulated by closing and reopening the store.

use crate::integration::test_utils::{chapters_request, fast_config, open_api, CountingGenerator};
use spool::config::RetryPolicy;
use spool::store::{SledTaskStore, TaskStatus, TaskStore};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn policy_snapshot_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let custom = RetryPolicy {
        attempt_delays_secs: vec![1, 9, 42],
        max_attempts: 4,
    };

    {
        let mut config = fast_config(4);
        config.retry = custom.clone();
        let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), config);
        api.start_job("job-a".to_string(), chapters_request(3))
            .unwrap();
        store.flush().unwrap();
    }

    let store = SledTaskStore::open(dir.path().join("store")).unwrap();
    let job = store.get_job("job-a").unwrap().unwrap();
    assert_eq!(job.policy, custom);
    assert_eq!(job.total_tasks, 3);
    assert_eq!(store.list_by_job("job-a").unwrap().len(), 3);
}

#[test]
fn interrupted_lifecycle_resumes_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");
    let ids;

    // First session: two tasks finish, one is caught mid-attempt when the
    // process dies.
    {
        let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));
        api.start_job("job-a".to_string(), chapters_request(5))
            .unwrap();
        ids = store
            .list_by_job("job-a")
            .unwrap()
            .into_iter()
            .map(|t| t.task_id)
            .collect::<Vec<_>>();

        for id in &ids[..2] {
            store.set_status(id, TaskStatus::InProgress, None).unwrap();
            store.set_status(id, TaskStatus::Completed, None).unwrap();
        }
        store
            .set_status(&ids[2], TaskStatus::InProgress, None)
            .unwrap();
        store.flush().unwrap();
    }

    // Second session sees exactly the persisted board.
    let store = SledTaskStore::open(&path).unwrap();
    let tasks = store.list_by_job("job-a").unwrap();
    let statuses: Vec<TaskStatus> = tasks.iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        vec![
            TaskStatus::Completed,
            TaskStatus::Completed,
            TaskStatus::InProgress,
            TaskStatus::Queued,
            TaskStatus::Queued,
        ]
    );

    // The stranded task goes back to the queue with its attempt kept, and
    // can then complete normally.
    store
        .set_status(
            &ids[2],
            TaskStatus::Queued,
            Some("process interrupted mid-attempt".to_string()),
        )
        .unwrap();
    let record = store
        .set_status(&ids[2], TaskStatus::InProgress, None)
        .unwrap();
    assert_eq!(record.attempts, 2);
    store
        .set_status(&ids[2], TaskStatus::Completed, None)
        .unwrap();

    let record = store.get_task(&ids[2]).unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert!(record.last_error.is_none());
}

#[test]
fn jobs_are_isolated_from_each_other() {
    let dir = TempDir::new().unwrap();
    let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));

    api.start_job("job-a".to_string(), chapters_request(4))
        .unwrap();
    api.start_job("job-b".to_string(), chapters_request(2))
        .unwrap();

    assert_eq!(store.list_by_job("job-a").unwrap().len(), 4);
    assert_eq!(store.list_by_job("job-b").unwrap().len(), 2);
    assert!(store
        .list_by_job("job-a")
        .unwrap()
        .iter()
        .all(|t| t.job_id == "job-a"));

    assert!(api.delete_job(&"job-a".to_string()).unwrap());
    assert!(store.list_by_job("job-a").unwrap().is_empty());
    assert_eq!(store.list_by_job("job-b").unwrap().len(), 2);

    let jobs = api.list_jobs().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, "job-b");
}

#[test]
fn failed_task_records_its_full_attempt_history() {
    let dir = TempDir::new().unwrap();
    let (api, store) = open_api(&dir, Arc::new(CountingGenerator::reliable()), fast_config(3));
    api.start_job("job-a".to_string(), chapters_request(1))
        .unwrap();
    let id = store.list_by_job("job-a").unwrap()[0].task_id.clone();

    let errors = ["connect refused", "rate limited", "gateway timeout"];
    for (attempt, error) in errors.iter().enumerate() {
        let record = store.set_status(&id, TaskStatus::InProgress, None).unwrap();
        assert_eq!(record.attempts, attempt as u32 + 1);
        if attempt + 1 < errors.len() {
            store
                .set_status(&id, TaskStatus::Queued, Some((*error).to_string()))
                .unwrap();
        } else {
            store
                .set_status(&id, TaskStatus::Failed, Some((*error).to_string()))
                .unwrap();
        }
    }

    let record = store.get_task(&id).unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.attempts, 3);
    // Only the latest error is retained.
    assert_eq!(record.last_error.as_deref(), Some("gateway timeout"));
}
