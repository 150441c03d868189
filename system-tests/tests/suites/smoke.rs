// system-tests/tests/suites/smoke.rs
// ============================================================================
// Module: Smoke Tests
// Description: Runs the sample suite on scripted and local platforms.
// Purpose: Confirm a full run passes, gates correctly, and leaks nothing.
// Dependencies: system-tests helpers
// ============================================================================

use std::fs;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use helpers::harness::TestError;
use helpers::harness::context;
use helpers::harness::ensure;
use helpers::harness::local_agent;
use helpers::harness::run;
use helpers::harness::scripted_platform;
use helpers::harness::suite_binary;
use helpers::timeouts::wait_with_timeout;
use system_tests::config::SystemTestEnv;
use system_tests::suite::sample_registry;
use vmharness_core::Outcome;
use vmharness_core::SchedulerConfig;

use crate::helpers;

/// Budget for one launcher process.
const SUITE_TIMEOUT: Duration = Duration::from_secs(120);

#[test]
fn sample_suite_passes_on_scripted_platform() -> Result<(), TestError> {
    let registry = sample_registry()?;
    let platform = scripted_platform();
    let report = run(
        &registry,
        Arc::new(platform.clone()),
        context("qemu", 3500),
        SchedulerConfig::default(),
    );

    ensure(!report.has_failures(), format!("unexpected failures:\n{}", report.render_text()))?;
    ensure(report.summary.passed == 6, format!("passed = {}", report.summary.passed))?;
    ensure(report.summary.excluded == 1, "cl.future should be excluded")?;
    let future = report.record("cl.future").ok_or("missing cl.future record")?;
    ensure(future.outcome == Outcome::Exclude, "cl.future outcome")?;
    ensure(platform.provision_calls() == 6, "one provision per executed test")?;
    ensure(platform.destroy_calls() == 6, "one destroy per provisioned batch")?;
    ensure(platform.live_machines().is_empty(), "machines leaked")?;
    Ok(())
}

#[test]
fn old_esx_release_skips_boot_test() -> Result<(), TestError> {
    let registry = sample_registry()?;
    let platform = scripted_platform();
    let report =
        run(&registry, Arc::new(platform.clone()), context("esx", 3033), SchedulerConfig::default());

    let boot = report.record("cl.esx.boot").ok_or("missing cl.esx.boot record")?;
    ensure(boot.outcome == Outcome::Skip, format!("cl.esx.boot was {}", boot.outcome))?;
    ensure(boot.machines_provisioned == 0, "skipped test provisioned machines")?;
    ensure(report.summary.skipped == 1, "exactly one skip expected")?;
    ensure(platform.provisions().iter().all(|p| p.test != "cl.esx.boot"), "skip provisioned")?;

    let fixed = run(
        &registry,
        Arc::new(scripted_platform()),
        context("esx", 3034),
        SchedulerConfig::default(),
    );
    let boot = fixed.record("cl.esx.boot").ok_or("missing cl.esx.boot record")?;
    ensure(boot.outcome == Outcome::Pass, "cl.esx.boot should run on the fixed release")?;
    Ok(())
}

#[test]
fn launcher_binary_runs_sample_suite_locally() -> Result<(), TestError> {
    let dir = tempfile::tempdir()?;
    let run_root = dir.path().join("machines");
    fs::create_dir_all(&run_root)?;
    let report_path = dir.path().join("report.json");
    let events_path = dir.path().join("events.jsonl");
    let agent = local_agent("env");
    let config_path = dir.path().join("vmharness.toml");
    fs::write(
        &config_path,
        format!(
            "[context]\nplatform = \"local\"\nversion = \"3500\"\n\n[run]\nparallelism = \
             2\nevent_log = \"{}\"\n\n[agent]\nbinary_path = \"{}\"\ndetach_wrapper = \"{}\"\n",
            events_path.display(),
            agent.binary_path,
            agent.detach_wrapper
        ),
    )?;

    let child = Command::new(suite_binary())
        .arg("run")
        .arg("--config")
        .arg(&config_path)
        .arg("--report")
        .arg(&report_path)
        .env(SystemTestEnv::RunRoot.as_str(), &run_root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let output = wait_with_timeout(child, SUITE_TIMEOUT)?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    ensure(
        output.status.success(),
        format!("launcher failed:\n{stdout}\n{}", String::from_utf8_lossy(&output.stderr)),
    )?;
    ensure(stdout.contains("passed=6 failed=0"), format!("unexpected summary:\n{stdout}"))?;

    let report: serde_json::Value = serde_json::from_slice(&fs::read(&report_path)?)?;
    ensure(report["summary"]["passed"] == 6, "report summary mismatch")?;
    ensure(report["summary"]["excluded"] == 1, "report exclusion mismatch")?;
    let events = fs::read_to_string(&events_path)?;
    ensure(events.lines().count() > 0, "event log is empty")?;
    ensure(fs::read_dir(&run_root)?.next().is_none(), "machine directories leaked")?;
    Ok(())
}
