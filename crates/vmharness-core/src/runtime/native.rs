// crates/vmharness-core/src/runtime/native.rs
// ============================================================================
// Module: VM Harness Native Invocation Protocol
// Description: Command-line RPC for guest-side native functions.
// Purpose: Encode invocation requests carried over the command channel.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! A native invocation is a single command line executed on the guest:
//!
//! ```text
//! <agent> run <test-name> <func-name> [args...]
//! ```
//!
//! The agent looks the function up in its compiled catalog and reports the
//! result only through its exit status. Detached invocations prefix the line
//! with the configured wrapper (for example `sudo systemd-run --quiet`) so the
//! caller returns as soon as the function is started.
//!
//! Security posture: test and function names are validated identifiers, and
//! every argument is single-quoted before it reaches the guest shell.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::NativeFuncName;
use crate::core::TestName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Agent subcommand that dispatches a native function.
pub const AGENT_RUN_COMMAND: &str = "run";
/// Agent subcommand that lists available native functions.
pub const AGENT_LIST_COMMAND: &str = "list";
/// Exit status for a successful native function.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status for a native function that returned an error.
pub const EXIT_FUNCTION_FAILED: i32 = 1;
/// Exit status for an unknown function or malformed request.
pub const EXIT_USAGE: i32 = 2;
/// Default guest path of the agent binary.
pub const DEFAULT_AGENT_BINARY: &str = "./vmharness-agent";
/// Default wrapper used to detach native functions from the command session.
pub const DEFAULT_DETACH_WRAPPER: &str = "sudo systemd-run --quiet";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Guest agent location and launch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Path of the agent binary on the guest.
    pub binary_path: String,
    /// Command prefix used for detached invocations.
    pub detach_wrapper: String,
}

impl AgentSettings {
    /// Returns true when a detach wrapper is configured.
    #[must_use]
    pub fn can_detach(&self) -> bool {
        !self.detach_wrapper.trim().is_empty()
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            binary_path: DEFAULT_AGENT_BINARY.to_string(),
            detach_wrapper: DEFAULT_DETACH_WRAPPER.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Invocation
// ============================================================================

/// Request to run one native function on a guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeInvocation {
    /// Test owning the function.
    pub test: TestName,
    /// Function name.
    pub function: NativeFuncName,
    /// Trailing arguments.
    pub args: Vec<String>,
}

impl NativeInvocation {
    /// Creates an invocation request.
    #[must_use]
    pub const fn new(test: TestName, function: NativeFuncName, args: Vec<String>) -> Self {
        Self {
            test,
            function,
            args,
        }
    }

    /// Returns the agent argument vector (without the binary path).
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(3 + self.args.len());
        argv.push(AGENT_RUN_COMMAND.to_string());
        argv.push(self.test.to_string());
        argv.push(self.function.to_string());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Renders the synchronous command line.
    #[must_use]
    pub fn command_line(&self, agent: &AgentSettings) -> String {
        let mut line = agent.binary_path.clone();
        for arg in self.argv() {
            line.push(' ');
            line.push_str(&shell_quote(&arg));
        }
        line
    }

    /// Renders the detached command line.
    ///
    /// Without a wrapper this is the synchronous line; callers check
    /// [`AgentSettings::can_detach`] first.
    #[must_use]
    pub fn detached_command_line(&self, agent: &AgentSettings) -> String {
        if !agent.can_detach() {
            return self.command_line(agent);
        }
        format!("{} {}", agent.detach_wrapper.trim(), self.command_line(agent))
    }
}

/// Quotes a value for a POSIX shell unless it is made of safe characters.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value.chars().all(|ch| {
            ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | '+' | '/' | '=' | ':' | ',')
        });
    if safe {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
