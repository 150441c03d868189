// crates/vmharness-core/tests/events.rs
// ============================================================================
// Module: Run Event Tests
// Description: Lifecycle events emitted by the scheduler and clusters.
// Purpose: Validate event ordering and JSON-line sinks.
// ============================================================================

//! ## Overview
//! Captures events through the memory sink and the file sink.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use vmharness_core::ExecutionContext;
use vmharness_core::InMemoryPlatform;
use vmharness_core::NativeFuncError;
use vmharness_core::OsVersion;
use vmharness_core::Outcome;
use vmharness_core::RunEvent;
use vmharness_core::RunEventKind;
use vmharness_core::RunEventSink;
use vmharness_core::Scheduler;
use vmharness_core::SchedulerConfig;
use vmharness_core::TestDescriptor;
use vmharness_core::TestName;
use vmharness_core::TestRegistry;
use vmharness_core::native_fn;
use vmharness_core::runtime::FileEventSink;
use vmharness_core::runtime::MemoryEventSink;

fn ready() -> Result<(), NativeFuncError> {
    Ok(())
}

/// Verifies a run emits lifecycle events in order for each test.
#[test]
fn run_emits_lifecycle_events() {
    let platform = InMemoryPlatform::new();
    platform.fail_destroy("busy");
    let sink = Arc::new(MemoryEventSink::new());
    let mut registry = TestRegistry::new();
    registry
        .register(
            TestDescriptor::builder("cl.events", |c| {
                let machine = c.machines()[0].clone();
                c.log("booted");
                c.run("native", |c| {
                    c.run_native(&machine, "Ready", &[])?;
                    Ok(())
                });
                Ok(())
            })
            .cluster_size(1)
            .native("Ready", native_fn(ready)),
        )
        .unwrap();
    registry.register(TestDescriptor::builder("cl.filtered", |_| Ok(())).platforms(["aws"])).unwrap();

    let ctx = ExecutionContext::new("qemu", "cl", "stable", OsVersion::major(3500), "amd64");
    let report = Scheduler::new(ctx, Arc::new(platform), SchedulerConfig::default())
        .with_events(sink.clone())
        .run(&registry);
    assert_eq!(report.summary.passed, 1);

    assert_eq!(
        sink.kinds(),
        vec![
            "test_filtered",
            "test_started",
            "cluster_provisioned",
            "test_log",
            "native_invoked",
            "subtest_finished",
            "teardown_failed",
            "test_finished",
        ]
    );
    let subtest = &sink.of_kind(RunEventKind::SubtestFinished)[0];
    assert_eq!(subtest.path.as_deref(), Some("native"));
    assert_eq!(subtest.outcome, Some(Outcome::Pass));
    let filtered = &sink.of_kind(RunEventKind::TestFiltered)[0];
    assert_eq!(filtered.test.as_deref(), Some("cl.filtered"));
    assert_eq!(filtered.outcome, Some(Outcome::Exclude));
}

/// Verifies the file sink appends one JSON object per line.
#[test]
fn file_sink_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let test = TestName::parse("cl.file").unwrap();
    {
        let sink = FileEventSink::new(&path).unwrap();
        sink.record(&RunEvent::for_test(RunEventKind::TestStarted, &test).with_machines(2));
        sink.record(
            &RunEvent::for_test(RunEventKind::TestFinished, &test).with_outcome(Outcome::Pass),
        );
    }
    let sink = FileEventSink::new(&path).unwrap();
    sink.record(&RunEvent::new(RunEventKind::RunCancelled).with_detail("interrupted"));

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> =
        contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["event"], "test_started");
    assert_eq!(lines[0]["machines"], 2);
    assert_eq!(lines[1]["outcome"], "pass");
    assert_eq!(lines[2]["event"], "run_cancelled");
    assert!(lines[2].get("test").is_none());
    assert!(lines[2]["timestamp_ms"].as_u64().unwrap() > 0);
}
