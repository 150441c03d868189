// crates/vmharness-cli/src/output.rs
// ============================================================================
// Module: VM Harness CLI Output
// Description: Line-oriented writers for stdout and stderr.
// Purpose: Keep stream handling out of command code.
// Dependencies: std
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::process::ExitCode;

// ============================================================================
// SECTION: Writers
// ============================================================================

/// Writes a single line to stderr.
///
/// # Errors
///
/// Returns an I/O error when stderr is closed.
pub fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats a stream write failure.
#[must_use]
pub fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
#[must_use]
pub fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
