// crates/vmharness-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for run, list, and config validation.
// Purpose: Ensure the launcher wires config, scheduler, and reports together.
// ============================================================================

//! ## Overview
//! Drives [`vmharness_cli::execute`] with an in-memory platform and captured
//! stdout.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use vmharness_cli::CommandOutcome;
use vmharness_cli::DriverFactory;
use vmharness_cli::execute;
use vmharness_core::ExecutionContext;
use vmharness_core::InMemoryPlatform;
use vmharness_core::PlatformDriver;
use vmharness_core::TestDescriptor;
use vmharness_core::TestRegistry;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn registry() -> Arc<TestRegistry> {
    let mut registry = TestRegistry::new();
    registry
        .register(
            TestDescriptor::builder("cl.basic", |c| {
                let machine = c.machines()[0].clone();
                c.must_exec(&machine, "systemctl is-system-running")?;
                Ok(())
            })
            .cluster_size(1),
        )
        .unwrap();
    registry
        .register(
            TestDescriptor::builder("cl.broken", |c| {
                c.run("first", |c| Err(c.fatal("service did not start")));
                Ok(())
            })
            .cluster_size(1),
        )
        .unwrap();
    registry
        .register(TestDescriptor::builder("cl.aws-only", |_| Ok(())).platforms(["aws"]))
        .unwrap();
    Arc::new(registry)
}

fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("vmharness.toml");
    let events = dir.join("events.jsonl");
    let text = format!(
        "[context]\nplatform = \"qemu\"\nversion = \"3500.0.0\"\n\n[run]\nevent_log = \"{}\"\n{extra}",
        events.display()
    );
    fs::write(&path, text).unwrap();
    path
}

fn factory(platform: &InMemoryPlatform) -> Box<DriverFactory> {
    let platform = platform.clone();
    Box::new(move |_ctx: &ExecutionContext| Ok(Arc::new(platform.clone()) as Arc<dyn PlatformDriver>))
}

async fn run_cli(
    args: &[&str],
    platform: &InMemoryPlatform,
) -> (Result<CommandOutcome, String>, String) {
    let mut out = Vec::new();
    let factory = factory(platform);
    let argv = std::iter::once("vmharness").chain(args.iter().copied());
    let result =
        execute(argv, registry(), factory.as_ref(), &mut out).await.map_err(|err| err.to_string());
    (result, String::from_utf8(out).unwrap())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies a run with a failing test reports failure and writes artifacts.
#[tokio::test]
async fn run_reports_failures_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "parallelism = 2\n");
    let report_path = dir.path().join("report.json");
    let platform = InMemoryPlatform::new();
    let (result, out) = run_cli(
        &[
            "run",
            "--config",
            config.to_str().unwrap(),
            "--report",
            report_path.to_str().unwrap(),
        ],
        &platform,
    )
    .await;
    assert_eq!(result.unwrap(), CommandOutcome::TestsFailed);
    assert!(out.contains("--- PASS: cl.basic"), "{out}");
    assert!(out.contains("--- FAIL: cl.broken"), "{out}");
    assert!(out.contains("--- EXCLUDE: cl.aws-only"), "{out}");
    assert!(out.ends_with("passed=1 failed=1 skipped=0 excluded=1 cancelled=0 teardown_warnings=0\n"));

    let report: serde_json::Value =
        serde_json::from_slice(&fs::read(&report_path).unwrap()).unwrap();
    assert_eq!(report["summary"]["failed"], 1);
    assert_eq!(report["tests"].as_array().unwrap().len(), 3);
    assert_eq!(platform.provision_calls(), 2);
    assert_eq!(platform.destroy_calls(), 2);

    let events = fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
    assert!(events.lines().any(|line| line.contains("\"test_finished\"")));
}

/// Verifies pattern overrides narrow the run to passing tests.
#[tokio::test]
async fn pattern_override_selects_tests() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let platform = InMemoryPlatform::new();
    let (result, out) = run_cli(
        &["run", "--config", config.to_str().unwrap(), "--pattern", "cl.basic"],
        &platform,
    )
    .await;
    assert_eq!(result.unwrap(), CommandOutcome::Success);
    assert!(out.contains("--- EXCLUDE: cl.broken [not selected]"), "{out}");
    assert_eq!(platform.provision_calls(), 1);
}

/// Verifies invalid overrides fail before any provisioning.
#[tokio::test]
async fn invalid_parallelism_override_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let platform = InMemoryPlatform::new();
    let (result, _) = run_cli(
        &["run", "--config", config.to_str().unwrap(), "--parallelism", "0"],
        &platform,
    )
    .await;
    assert!(result.unwrap_err().contains("run.parallelism"));
    assert_eq!(platform.provision_calls(), 0);
}

/// Verifies list shows names, and decisions when a config is given.
#[tokio::test]
async fn list_shows_names_and_decisions() {
    let platform = InMemoryPlatform::new();
    let (result, out) = run_cli(&["list"], &platform).await;
    assert_eq!(result.unwrap(), CommandOutcome::Success);
    assert_eq!(out.lines().collect::<Vec<_>>(), vec!["cl.aws-only", "cl.basic", "cl.broken"]);

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let (result, out) = run_cli(&["list", "--config", config.to_str().unwrap()], &platform).await;
    assert_eq!(result.unwrap(), CommandOutcome::Success);
    assert!(out.contains("cl.aws-only\tEXCLUDE (platform qemu not supported)"), "{out}");
    assert!(out.contains("cl.basic\tRUN"), "{out}");
    assert_eq!(platform.provision_calls(), 0);
}

/// Verifies config validation succeeds and fails closed.
#[tokio::test]
async fn config_validate_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let platform = InMemoryPlatform::new();
    let (result, out) =
        run_cli(&["config", "validate", "--config", config.to_str().unwrap()], &platform).await;
    assert_eq!(result.unwrap(), CommandOutcome::Success);
    assert!(out.starts_with("config ok: platform=qemu"), "{out}");

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[context]\nplatform = \"qemu\"\nversion = \"x\"\n").unwrap();
    let (result, _) =
        run_cli(&["config", "validate", "--config", bad.to_str().unwrap()], &platform).await;
    assert!(result.unwrap_err().contains("context.version"));
}

/// Verifies unknown subcommands are usage errors and help succeeds.
#[tokio::test]
async fn usage_errors_and_help() {
    let platform = InMemoryPlatform::new();
    let (result, _) = run_cli(&["deploy"], &platform).await;
    assert!(result.is_err());
    let (result, out) = run_cli(&["--help"], &platform).await;
    assert_eq!(result.unwrap(), CommandOutcome::Success);
    assert!(out.contains("run"), "{out}");
}
