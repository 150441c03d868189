// system-tests/tests/suites/native_e2e.rs
// ============================================================================
// Module: Native Function End-to-End Tests
// Description: Native dispatch through the sample agent on local machines.
// Purpose: Confirm agent exit codes and file effects reach the test body.
// Dependencies: system-tests helpers
// ============================================================================

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use helpers::harness::TestError;
use helpers::harness::agent_binary;
use helpers::harness::context;
use helpers::harness::ensure;
use helpers::harness::local_agent;
use helpers::harness::run;
use helpers::timeouts::wait_with_timeout;
use system_tests::local::LocalPlatform;
use system_tests::suite::MARKER_CONTENT;
use system_tests::suite::sample_registry;
use vmharness_config::HarnessConfig;
use vmharness_core::Outcome;
use vmharness_core::SchedulerConfig;
use vmharness_core::TestSelection;
use vmharness_core::runtime::native::EXIT_FUNCTION_FAILED;
use vmharness_core::runtime::native::EXIT_SUCCESS;
use vmharness_core::runtime::native::EXIT_USAGE;

use crate::helpers;

/// Budget for one direct agent invocation.
const AGENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the sample agent in `workdir` and returns its exit status.
fn agent_status(workdir: &Path, args: &[&str]) -> Result<i32, TestError> {
    let child = Command::new(agent_binary())
        .args(args)
        .current_dir(workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let output = wait_with_timeout(child, AGENT_TIMEOUT)?;
    output.status.code().ok_or_else(|| "agent terminated by signal".into())
}

#[test]
fn sample_suite_passes_on_local_machines() -> Result<(), TestError> {
    let dir = tempfile::tempdir()?;
    let registry = sample_registry()?;
    let platform = LocalPlatform::new(dir.path());
    let config = SchedulerConfig {
        parallelism: NonZeroUsize::new(2).ok_or("parallelism")?,
        agent: local_agent("env"),
        ..SchedulerConfig::default()
    };
    let report = run(
        &registry,
        Arc::new(platform.clone()),
        context("local", 3500),
        config,
    );

    ensure(!report.has_failures(), format!("unexpected failures:\n{}", report.render_text()))?;
    ensure(report.summary.passed == 6, format!("passed = {}", report.summary.passed))?;
    ensure(platform.provision_calls() == platform.destroy_calls(), "unbalanced teardown")?;
    ensure(platform.live_workdirs().is_empty(), "machines leaked")?;
    ensure(fs::read_dir(dir.path())?.next().is_none(), "work directories left behind")?;
    Ok(())
}

#[test]
fn detached_invocation_without_wrapper_runs_inline() -> Result<(), TestError> {
    let dir = tempfile::tempdir()?;
    let registry = sample_registry()?;
    let config = SchedulerConfig {
        selection: TestSelection::new(["cl.native.detached"]),
        agent: local_agent(""),
        ..SchedulerConfig::default()
    };
    let report = run(
        &registry,
        Arc::new(LocalPlatform::new(dir.path())),
        context("local", 3500),
        config,
    );
    let detached = report.record("cl.native.detached").ok_or("missing cl.native.detached")?;
    ensure(detached.outcome == Outcome::Pass, format!("detached run:\n{}", report.render_text()))?;
    let logs = detached.root.as_ref().map(|root| root.logs.clone()).unwrap_or_default();
    ensure(
        logs.iter().any(|line| line.ends_with("runs synchronously")),
        format!("synchronous fallback was not logged: {}", logs.join(" | ")),
    )?;
    ensure(report.summary.passed == 1, "only the selected test runs")?;
    Ok(())
}

#[test]
fn config_file_drives_native_selection() -> Result<(), TestError> {
    let dir = tempfile::tempdir()?;
    let agent = agent_binary();
    let config = HarnessConfig::parse(&format!(
        "[context]\nplatform = \"local\"\nversion = \"3500.1.0\"\n\n[run]\npatterns = \
         [\"cl.native.*\"]\n\n[agent]\nbinary_path = \"{}\"\ndetach_wrapper = \"env\"\n",
        agent.display()
    ))?;
    let report = run(
        &sample_registry()?,
        Arc::new(LocalPlatform::new(dir.path())),
        config.execution_context()?,
        config.scheduler_config()?,
    );

    for name in ["cl.native.marker", "cl.native.failure", "cl.native.detached"] {
        let record = report.record(name).ok_or_else(|| format!("missing {name}"))?;
        ensure(record.outcome == Outcome::Pass, format!("{name} was {}", record.outcome))?;
    }
    let basic = report.record("cl.basic").ok_or("missing cl.basic")?;
    ensure(basic.outcome == Outcome::Exclude, "unselected tests are excluded")?;
    Ok(())
}

#[test]
fn agent_exit_codes_follow_protocol() -> Result<(), TestError> {
    let dir = tempfile::tempdir()?;
    let workdir = dir.path();

    let status = agent_status(workdir, &["run", "cl.native.marker", "WriteMarker", "out.txt"])?;
    ensure(status == EXIT_SUCCESS, format!("WriteMarker exited {status}"))?;
    let written = fs::read_to_string(workdir.join("out.txt"))?;
    ensure(written == MARKER_CONTENT, "marker content")?;

    let status = agent_status(workdir, &["run", "cl.native.failure", "Refuse"])?;
    ensure(status == EXIT_FUNCTION_FAILED, format!("Refuse exited {status}"))?;

    let status = agent_status(workdir, &["run", "cl.native.marker", "Missing"])?;
    ensure(status == EXIT_USAGE, format!("unknown function exited {status}"))?;

    let status = agent_status(workdir, &["run", "cl.native.marker", "WriteMarker"])?;
    ensure(status == EXIT_USAGE, format!("missing argument exited {status}"))?;

    let status = agent_status(workdir, &["frobnicate"])?;
    ensure(status == EXIT_USAGE, format!("malformed request exited {status}"))?;
    Ok(())
}
