// system-tests/tests/suites/scenarios.rs
// ============================================================================
// Module: Scenario Tests
// Description: Whole-run scenarios over scripted platforms.
// Purpose: Confirm gating, isolation, failure containment, and teardown.
// Dependencies: system-tests helpers
// ============================================================================

use std::sync::Arc;

use helpers::harness::TestError;
use helpers::harness::context;
use helpers::harness::ensure;
use helpers::harness::run;
use helpers::harness::scripted_platform;
use system_tests::suite::MARKER_CONTENT;
use system_tests::suite::sample_registry;
use vmharness_core::CancellationFlag;
use vmharness_core::CommandOutput;
use vmharness_core::GuestConfig;
use vmharness_core::InMemoryPlatform;
use vmharness_core::Outcome;
use vmharness_core::Scheduler;
use vmharness_core::SchedulerConfig;
use vmharness_core::TestCluster;
use vmharness_core::TestDescriptor;
use vmharness_core::TestRegistry;
use vmharness_core::TestResult;

use crate::helpers;

// ============================================================================
// SECTION: Bodies
// ============================================================================

/// Passes without touching the cluster.
fn noop(_c: &mut TestCluster<'_>) -> TestResult {
    Ok(())
}

/// One failing sub-test followed by a passing one.
fn mixed_subtests(c: &mut TestCluster<'_>) -> TestResult {
    c.run("first", |c| Err(c.fatal("first broke")));
    c.run("second", |_| Ok(()));
    Ok(())
}

/// Grows the cluster, then panics.
#[allow(clippy::panic, reason = "Exercises panic containment in test bodies.")]
fn grow_then_panic(c: &mut TestCluster<'_>) -> TestResult {
    c.new_machines(2, &GuestConfig::default())?;
    panic!("body exploded");
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

#[test]
fn platform_gating_never_provisions_excluded_tests() -> Result<(), TestError> {
    let mut registry = TestRegistry::new();
    registry.register(TestDescriptor::builder("cl.aws.only", noop).platforms(["aws"]))?;
    registry.register(TestDescriptor::builder("cl.not.aws", noop).exclude_platforms(["aws"]))?;

    let platform = InMemoryPlatform::new();
    let report =
        run(&registry, Arc::new(platform.clone()), context("aws", 3500), SchedulerConfig::default());
    let excluded = report.record("cl.not.aws").ok_or("missing cl.not.aws")?;
    ensure(excluded.outcome == Outcome::Exclude, "cl.not.aws should be excluded on aws")?;
    let included = report.record("cl.aws.only").ok_or("missing cl.aws.only")?;
    ensure(included.outcome == Outcome::Pass, "cl.aws.only should run on aws")?;
    ensure(
        platform.provisions().iter().all(|record| record.test != "cl.not.aws"),
        "excluded test reached the platform",
    )?;

    let report = run(
        &registry,
        Arc::new(InMemoryPlatform::new()),
        context("gce", 3500),
        SchedulerConfig::default(),
    );
    let only = report.record("cl.aws.only").ok_or("missing cl.aws.only")?;
    ensure(only.outcome == Outcome::Exclude, "cl.aws.only should be excluded on gce")?;
    Ok(())
}

#[test]
fn failed_subtest_does_not_stop_siblings() -> Result<(), TestError> {
    let mut registry = TestRegistry::new();
    registry.register(TestDescriptor::builder("cl.subtests", mixed_subtests))?;
    let report = run(
        &registry,
        Arc::new(InMemoryPlatform::new()),
        context("qemu", 3500),
        SchedulerConfig::default(),
    );
    let record = report.record("cl.subtests").ok_or("missing cl.subtests")?;
    ensure(record.outcome == Outcome::Fail, "parent should fail with its child")?;
    let root = record.root.as_ref().ok_or("executed test has no result tree")?;
    let first = root.child("first").ok_or("missing first")?;
    let second = root.child("second").ok_or("missing second")?;
    ensure(first.outcome == Outcome::Fail, "first should fail")?;
    ensure(second.outcome == Outcome::Pass, "second should still run and pass")?;
    ensure(first.error() == Some("first broke"), "first error message")?;
    ensure(root.failed_paths().len() == 2, "root and first are the failed paths")?;
    Ok(())
}

#[test]
fn panicking_body_still_tears_down() -> Result<(), TestError> {
    let mut registry = TestRegistry::new();
    registry.register(TestDescriptor::builder("cl.panics", grow_then_panic))?;
    registry.register(TestDescriptor::builder("cl.after", noop).cluster_size(1))?;
    let platform = InMemoryPlatform::new();
    let report =
        run(&registry, Arc::new(platform.clone()), context("qemu", 3500), SchedulerConfig::default());

    let panicked = report.record("cl.panics").ok_or("missing cl.panics")?;
    ensure(panicked.outcome == Outcome::Fail, "panic should fail the test")?;
    let root = panicked.root.as_ref().ok_or("missing result tree")?;
    ensure(
        root.error().is_some_and(|message| message.contains("body exploded")),
        "panic message should be recorded",
    )?;
    ensure(panicked.machines_provisioned == 2, "runtime machines counted")?;
    let after = report.record("cl.after").ok_or("missing cl.after")?;
    ensure(after.outcome == Outcome::Pass, "later tests still run")?;
    ensure(platform.destroy_calls() == platform.provision_calls(), "every batch destroyed")?;
    ensure(platform.live_machines().is_empty(), "machines leaked")?;
    Ok(())
}

#[test]
fn provisioning_failure_fails_tests_and_run_completes() -> Result<(), TestError> {
    let registry = sample_registry()?;
    let platform = scripted_platform();
    platform.fail_provisioning("quota exceeded", 0);
    let report =
        run(&registry, Arc::new(platform.clone()), context("qemu", 3500), SchedulerConfig::default());

    let basic = report.record("cl.basic").ok_or("missing cl.basic")?;
    ensure(basic.outcome == Outcome::Fail, "cl.basic should fail to provision")?;
    ensure(
        basic.reason.as_deref().is_some_and(|reason| reason.contains("quota exceeded")),
        "provision error should be the failure reason",
    )?;
    ensure(report.summary.failed == 6, format!("failed = {}", report.summary.failed))?;
    ensure(report.summary.excluded == 1, "gating is unaffected by provisioning")?;
    ensure(platform.live_machines().is_empty(), "machines leaked")?;
    Ok(())
}

#[test]
fn transport_failure_is_contained_to_its_subtest() -> Result<(), TestError> {
    let registry = sample_registry()?;
    let platform = InMemoryPlatform::new();
    platform.fail_transport("uname -s", "connection reset");
    platform.respond("cat ", CommandOutput::success(MARKER_CONTENT));
    let report =
        run(&registry, Arc::new(platform.clone()), context("qemu", 3500), SchedulerConfig::default());

    let basic = report.record("cl.basic").ok_or("missing cl.basic")?;
    ensure(basic.outcome == Outcome::Fail, "cl.basic should fail")?;
    let root = basic.root.as_ref().ok_or("missing result tree")?;
    let uname = root.child("uname").ok_or("missing uname")?;
    let config = root.child("guest-config").ok_or("missing guest-config")?;
    ensure(uname.outcome == Outcome::Fail, "uname should fail")?;
    ensure(config.outcome == Outcome::Pass, "guest-config should pass")?;
    let marker = report.record("cl.native.marker").ok_or("missing cl.native.marker")?;
    ensure(marker.outcome == Outcome::Pass, "unrelated tests keep passing")?;
    Ok(())
}

#[test]
fn cancelled_run_dispatches_nothing() -> Result<(), TestError> {
    let registry = sample_registry()?;
    let platform = scripted_platform();
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let scheduler =
        Scheduler::new(context("qemu", 3500), Arc::new(platform.clone()), SchedulerConfig::default())
            .with_cancellation(cancel);
    let report = scheduler.run(&registry);

    ensure(platform.provision_calls() == 0, "cancelled run provisioned machines")?;
    ensure(report.summary.cancelled == 6, format!("cancelled = {}", report.summary.cancelled))?;
    ensure(report.summary.passed == 0, "nothing should pass")?;
    ensure(report.summary.excluded == 1, "filter decisions are still reported")?;
    Ok(())
}
