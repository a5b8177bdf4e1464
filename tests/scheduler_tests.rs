//! Scheduling behavior of merge batches under each concurrency mode

mod common;

use common::{gauged_copy, suffix, ConcurrencyGauge, TestWorkspaceBuilder};
use hearth::context::ConcurrencyMode;
use hearth::{merge, path_map, ErrorCode, ExecutionContext, Job, Transform, UnitRef};

fn failing(name: &str, input: &str, output: &str) -> UnitRef {
    Transform::builder(name)
        .input(input)
        .output(output)
        .script(|_| anyhow::bail!("deliberate failure"))
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_thread_pool_respects_max_threads() {
    let ws = TestWorkspaceBuilder::new()
        .unwrap()
        .with_file("in.txt", "payload")
        .build()
        .unwrap();
    let gauge = ConcurrencyGauge::new();

    let unit = merge(vec![
        gauged_copy("One", "source", "one", gauge.clone()),
        gauged_copy("Two", "source", "two", gauge.clone()),
        gauged_copy("Three", "source", "three", gauge.clone()),
    ])
    .unwrap();
    let job = Job::new(
        unit,
        path_map([("source", ws.file("in.txt"))]),
        path_map([
            ("one", ws.file("one.txt")),
            ("two", ws.file("two.txt")),
            ("three", ws.file("three.txt")),
        ]),
    )
    .unwrap();

    let config = ws
        .config()
        .with_concurrency(ConcurrencyMode::Threads)
        .with_max_threads(2);
    ExecutionContext::new(config)
        .unwrap()
        .run(&job)
        .await
        .unwrap();

    for name in ["one.txt", "two.txt", "three.txt"] {
        assert_eq!(ws.read_file(name).unwrap(), "payload");
    }
    assert_eq!(gauge.peak(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_thread_pool_runs_small_batch_fully_parallel() {
    let ws = TestWorkspaceBuilder::new()
        .unwrap()
        .with_file("in.txt", "payload")
        .build()
        .unwrap();
    let gauge = ConcurrencyGauge::new();

    let unit = merge(vec![
        gauged_copy("One", "source", "one", gauge.clone()),
        gauged_copy("Two", "source", "two", gauge.clone()),
    ])
    .unwrap();
    let job = Job::new(
        unit,
        path_map([("source", ws.file("in.txt"))]),
        path_map([("one", ws.file("one.txt")), ("two", ws.file("two.txt"))]),
    )
    .unwrap();

    let config = ws
        .config()
        .with_concurrency(ConcurrencyMode::Threads)
        .with_max_threads(8);
    ExecutionContext::new(config)
        .unwrap()
        .run(&job)
        .await
        .unwrap();

    assert_eq!(gauge.peak(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_serial_mode_never_overlaps() {
    let ws = TestWorkspaceBuilder::new()
        .unwrap()
        .with_file("in.txt", "payload")
        .build()
        .unwrap();
    let gauge = ConcurrencyGauge::new();

    let unit = merge(vec![
        gauged_copy("One", "source", "one", gauge.clone()),
        gauged_copy("Two", "source", "two", gauge.clone()),
    ])
    .unwrap();
    let job = Job::new(
        unit,
        path_map([("source", ws.file("in.txt"))]),
        path_map([("one", ws.file("one.txt")), ("two", ws.file("two.txt"))]),
    )
    .unwrap();

    ExecutionContext::new(ws.config())
        .unwrap()
        .run(&job)
        .await
        .unwrap();

    assert_eq!(gauge.peak(), 1);
    assert!(ws.file_exists("two.txt"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_thread_pool_failure_does_not_cancel_siblings() {
    let ws = TestWorkspaceBuilder::new()
        .unwrap()
        .with_file("in.txt", "payload")
        .build()
        .unwrap();
    let gauge = ConcurrencyGauge::new();

    let unit = merge(vec![
        failing("Broken", "source", "broken"),
        gauged_copy("Slow", "source", "slow", gauge.clone()),
        suffix("Quick", "source", "quick", "!"),
    ])
    .unwrap();
    let job = Job::new(
        unit,
        path_map([("source", ws.file("in.txt"))]),
        path_map([
            ("broken", ws.file("broken.txt")),
            ("slow", ws.file("slow.txt")),
            ("quick", ws.file("quick.txt")),
        ]),
    )
    .unwrap();

    let config = ws.config().with_concurrency(ConcurrencyMode::Threads);
    let err = ExecutionContext::new(config)
        .unwrap()
        .run(&job)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::SCRIPT_FAILED);
    assert!(err.message().contains("deliberate failure"));
    assert_eq!(ws.read_file("slow.txt").unwrap(), "payload");
    assert_eq!(ws.read_file("quick.txt").unwrap(), "payload!");
    assert_eq!(ws.scratch_entries(), 0);
}

#[tokio::test]
async fn test_serial_stops_at_first_failure() {
    let ws = TestWorkspaceBuilder::new()
        .unwrap()
        .with_file("in.txt", "payload")
        .build()
        .unwrap();

    let unit = merge(vec![
        failing("Broken", "source", "broken"),
        suffix("Later", "source", "later", "!"),
    ])
    .unwrap();
    let job = Job::new(
        unit,
        path_map([("source", ws.file("in.txt"))]),
        path_map([
            ("broken", ws.file("broken.txt")),
            ("later", ws.file("later.txt")),
        ]),
    )
    .unwrap();

    let err = ExecutionContext::new(ws.config())
        .unwrap()
        .run(&job)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SCRIPT_FAILED);
    assert!(!ws.file_exists("later.txt"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_runs_are_rejected() {
    let ws = TestWorkspaceBuilder::new()
        .unwrap()
        .with_file("in.txt", "payload")
        .build()
        .unwrap();
    let gauge = ConcurrencyGauge::new();
    let context = ExecutionContext::new(ws.config()).unwrap();

    let slow = Job::new(
        gauged_copy("Slow", "source", "target", gauge),
        path_map([("source", ws.file("in.txt"))]),
        path_map([("target", ws.file("first.txt"))]),
    )
    .unwrap();
    let competing = Job::new(
        suffix("Competing", "source", "target", "!"),
        path_map([("source", ws.file("in.txt"))]),
        path_map([("target", ws.file("second.txt"))]),
    )
    .unwrap();

    let (first, second) = tokio::join!(context.run(&slow), context.run(&competing));
    first.unwrap();
    let err = second.unwrap_err();
    assert_eq!(err.code(), ErrorCode::EXEC_RUN_OVERLAP);
    assert!(err.message().contains("in.txt"));
    assert!(!ws.file_exists("second.txt"));

    assert_eq!(context.active_runs(), 0);
    context.run(&competing).await.unwrap();
    assert_eq!(ws.read_file("second.txt").unwrap(), "payload!");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_runs_share_a_context() {
    let ws = TestWorkspaceBuilder::new()
        .unwrap()
        .with_file("a.txt", "a")
        .with_file("b.txt", "b")
        .build()
        .unwrap();
    let context = ExecutionContext::new(ws.config()).unwrap();

    let first = Job::new(
        suffix("First", "source", "target", "1"),
        path_map([("source", ws.file("a.txt"))]),
        path_map([("target", ws.file("a.out"))]),
    )
    .unwrap();
    let second = Job::new(
        suffix("Second", "source", "target", "2"),
        path_map([("source", ws.file("b.txt"))]),
        path_map([("target", ws.file("b.out"))]),
    )
    .unwrap();

    let (a, b) = tokio::join!(context.run(&first), context.run(&second));
    assert_ne!(a.unwrap().run_id, b.unwrap().run_id);
    assert_eq!(ws.read_file("a.out").unwrap(), "a1");
    assert_eq!(ws.read_file("b.out").unwrap(), "b2");
}
