// system-tests/src/bin/vmharness_sample_agent.rs
// ============================================================================
// Module: Sample Agent
// Description: Guest agent binary for the sample suite.
// Purpose: Dispatch the sample suite's native functions in end-to-end tests.
// Dependencies: system-tests, vmharness-agent
// ============================================================================

//! Guest agent binary for the sample suite.

use std::io::Write;
use std::process::ExitCode;

use system_tests::suite::sample_registry;
use vmharness_agent::run_agent;

fn main() -> ExitCode {
    match sample_registry() {
        Ok(registry) => run_agent(&registry),
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "vmharness-sample-agent: {err}");
            ExitCode::from(2)
        }
    }
}
