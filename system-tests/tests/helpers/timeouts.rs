// system-tests/tests/helpers/timeouts.rs
// ============================================================================
// Module: System Test Timeouts
// Description: Centralized timeout configuration with env overrides.
// Purpose: Keep system-test timeouts consistent and configurable across suites.
// ============================================================================

use std::process::Child;
use std::process::Output;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use system_tests::config::SystemTestConfig;

/// Poll interval while waiting for a child process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Returns the effective timeout, honoring `VMHARNESS_SYSTEM_TEST_TIMEOUT_SEC` when set.
/// The override acts as a minimum to avoid shortening explicitly longer test timeouts.
pub fn resolve_timeout(requested: Duration) -> Result<Duration, String> {
    let config = SystemTestConfig::load()?;
    Ok(config.resolve_timeout(requested))
}

/// Waits for `child` to exit, killing it once `timeout` elapses.
/// A timeout past the representable range waits indefinitely.
pub fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<Output, String> {
    let timeout = resolve_timeout(timeout)?;
    let deadline = Instant::now().checked_add(timeout);
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return child.wait_with_output().map_err(|err| err.to_string()),
            Ok(None) if deadline.is_some_and(|at| Instant::now() >= at) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("process did not exit within {}s", timeout.as_secs()));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => return Err(err.to_string()),
        }
    }
}
