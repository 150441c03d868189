// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: System Test Harness
// Description: Run fixtures for the sample suite.
// Purpose: Build contexts, platforms, and binary paths shared by suites.
// ============================================================================

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use vmharness_core::AgentSettings;
use vmharness_core::CommandOutput;
use vmharness_core::ExecutionContext;
use vmharness_core::InMemoryPlatform;
use vmharness_core::OsVersion;
use vmharness_core::PlatformDriver;
use vmharness_core::RunReport;
use vmharness_core::Scheduler;
use vmharness_core::SchedulerConfig;
use vmharness_core::TestRegistry;

/// Boxed error used by system-test bodies.
pub type TestError = Box<dyn Error>;

/// Fails with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), TestError> {
    if condition { Ok(()) } else { Err(message.into().into()) }
}

/// Path of the sample agent binary built alongside the tests.
#[must_use]
pub fn agent_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vmharness_sample_agent"))
}

/// Path of the sample launcher binary built alongside the tests.
#[must_use]
pub fn suite_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vmharness_sample_suite"))
}

/// Agent settings pointing at the sample agent, with the given detach wrapper.
#[must_use]
pub fn local_agent(detach_wrapper: &str) -> AgentSettings {
    AgentSettings {
        binary_path: agent_binary().display().to_string(),
        detach_wrapper: detach_wrapper.to_string(),
    }
}

/// Context for `platform` at `major.0.0` on amd64.
#[must_use]
pub fn context(platform: &str, major: u64) -> ExecutionContext {
    ExecutionContext::new(platform, "cl", "stable", OsVersion::major(major), "amd64")
}

/// In-memory platform scripted so every sample test can pass.
#[must_use]
pub fn scripted_platform() -> InMemoryPlatform {
    let platform = InMemoryPlatform::new();
    platform.respond("uname -s", CommandOutput::success(b"Linux".to_vec()));
    platform.respond("cat ", CommandOutput::success(b"written".to_vec()));
    platform.respond("Refuse", CommandOutput::failure(1, b"refused".to_vec()));
    platform
}

/// Runs `registry` on `driver` with `config`.
#[must_use]
pub fn run(
    registry: &TestRegistry,
    driver: Arc<dyn PlatformDriver>,
    ctx: ExecutionContext,
    config: SchedulerConfig,
) -> RunReport {
    Scheduler::new(ctx, driver, config).run(registry)
}
