//! Integration tests for the skillpad-kernel crate.
//!
//! These tests drive the command queue through the scripted runner and check
//! the two guarantees callers rely on: launch order equals submission order
//! with no overlap, and one failing job never affects the others.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use skillpad_kernel::testing::ScriptedRunner;
use skillpad_kernel::{CommandQueue, CommandSpec, KernelError};

fn job(i: usize) -> CommandSpec {
    CommandSpec::new("npx", ["-y".to_string(), "skills".to_string(), format!("job-{i}")])
}

async fn run_batch(n: usize) -> Arc<ScriptedRunner> {
    let runner = Arc::new(ScriptedRunner::new().with_delay(Duration::from_millis(5)));
    let (queue, _worker) = CommandQueue::start(runner.clone());

    let results = join_all((0..n).map(|i| queue.execute(job(i)))).await;
    assert!(results.iter().all(|r| r.is_ok()));
    runner
}

// ═══════════════════════════════════════════════════════════════════════
//  Ordering
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn launches_follow_submission_order_for_three_jobs() {
    let runner = run_batch(3).await;
    let launched: Vec<String> = runner.call_args().into_iter().map(|a| a[2].clone()).collect();
    assert_eq!(launched, vec!["job-0", "job-1", "job-2"]);
}

#[tokio::test]
async fn launches_follow_submission_order_for_ten_jobs() {
    let runner = run_batch(10).await;
    let launched: Vec<String> = runner.call_args().into_iter().map(|a| a[2].clone()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("job-{i}")).collect();
    assert_eq!(launched, expected);
}

#[tokio::test]
async fn never_runs_two_jobs_at_once() {
    let runner = run_batch(10).await;
    assert_eq!(runner.max_concurrency(), 1);
}

#[tokio::test]
async fn concurrent_tasks_are_serialized() {
    let runner = Arc::new(ScriptedRunner::new().with_delay(Duration::from_millis(10)));
    let (queue, _worker) = CommandQueue::start(runner.clone());

    let mut handles = Vec::new();
    for i in 0..5 {
        let q = queue.clone();
        handles.push(tokio::spawn(async move { q.execute(job(i)).await }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    assert_eq!(runner.calls().len(), 5);
    assert_eq!(runner.max_concurrency(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Fault isolation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn launch_failure_does_not_poison_later_jobs() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.push_ok("first");
    runner.push_spawn_error("boom");
    runner.push_ok("third");
    runner.push_ok("fourth");
    let (queue, _worker) = CommandQueue::start(runner.clone());

    let results = join_all((0..4).map(|i| queue.execute(job(i)))).await;

    assert_eq!(results[0].as_ref().unwrap().stdout, "first");
    assert!(matches!(results[1], Err(KernelError::Spawn { .. })));
    assert_eq!(results[2].as_ref().unwrap().stdout, "third");
    assert_eq!(results[3].as_ref().unwrap().stdout, "fourth");
}

#[tokio::test]
async fn non_zero_exit_is_reported_to_its_own_caller_only() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.push_exit(1, "", "lock busy");
    runner.push_ok("fine");
    let (queue, _worker) = CommandQueue::start(runner.clone());

    let (a, b) = tokio::join!(queue.execute(job(0)), queue.execute(job(1)));

    let a = a.unwrap();
    assert_eq!(a.exit_code, 1);
    assert_eq!(a.stderr, "lock busy");
    assert!(b.unwrap().success());
}

#[tokio::test]
async fn dropped_caller_does_not_stall_the_queue() {
    let runner = Arc::new(ScriptedRunner::new().with_delay(Duration::from_millis(20)));
    let (queue, _worker) = CommandQueue::start(runner.clone());

    let abandoned = tokio::spawn({
        let q = queue.clone();
        async move { q.execute(job(0)).await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    abandoned.abort();

    let out = queue.execute(job(1)).await.unwrap();
    assert!(out.success());
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn worker_stops_when_all_handles_dropped() {
    let runner = Arc::new(ScriptedRunner::new());
    let (queue, worker) = CommandQueue::start(runner);
    queue.execute(job(0)).await.unwrap();
    drop(queue);
    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .expect("worker exits")
        .unwrap();
}
