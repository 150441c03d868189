// crates/vmharness-agent/src/agent.rs
// ============================================================================
// Module: VM Harness Agent Dispatcher
// Description: Argument parsing, catalog lookup, and exit status mapping.
// Purpose: Execute one native function per process invocation.
// Dependencies: clap, thiserror, vmharness-core
// ============================================================================

//! ## Overview
//! [`dispatch`] parses the agent command line, resolves the requested
//! function in the registry, and runs it with panics contained. Output goes
//! to caller-supplied writers so the same path serves the real binary and
//! tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use clap::error::ErrorKind;
use thiserror::Error;
use vmharness_core::NativeFuncError;
use vmharness_core::TestRegistry;
use vmharness_core::runtime::native::EXIT_FUNCTION_FAILED;
use vmharness_core::runtime::native::EXIT_SUCCESS;
use vmharness_core::runtime::native::EXIT_USAGE;
use vmharness_core::runtime::panic_message;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Agent command line.
#[derive(Parser, Debug)]
#[command(name = "vmharness-agent", disable_help_subcommand = true, disable_version_flag = true)]
struct AgentCli {
    /// Requested operation.
    #[command(subcommand)]
    command: AgentCommand,
}

/// Agent subcommands.
#[derive(Subcommand, Debug)]
enum AgentCommand {
    /// Run one native function and report through the exit status.
    Run {
        /// Test that owns the function.
        #[arg(value_name = "TEST")]
        test: String,
        /// Function name within the test.
        #[arg(value_name = "FUNC")]
        function: String,
        /// Arguments passed through to the function.
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List available `test/function` pairs.
    List,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// The command line did not parse.
    #[error("{0}")]
    Usage(String),
    /// No test with the requested name is compiled in.
    #[error("unknown test {0}")]
    UnknownTest(String),
    /// The test has no native function with the requested name.
    #[error("test {test} has no native function {function}")]
    UnknownFunction {
        /// Test name.
        test: String,
        /// Function name.
        function: String,
    },
    /// The function returned an error.
    #[error("native function {test}/{function} failed: {source}")]
    Failed {
        /// Test name.
        test: String,
        /// Function name.
        function: String,
        /// Error returned by the function.
        source: NativeFuncError,
    },
    /// The function panicked.
    #[error("native function {test}/{function} panicked: {message}")]
    Panicked {
        /// Test name.
        test: String,
        /// Function name.
        function: String,
        /// Panic message.
        message: String,
    },
    /// Writing output failed.
    #[error("output write failed: {0}")]
    Output(String),
}

impl AgentError {
    /// Exit status reported for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::UnknownTest(_) | Self::UnknownFunction { .. } => EXIT_USAGE,
            Self::Failed {
                source: NativeFuncError::InvalidArguments(_),
                ..
            } => EXIT_USAGE,
            Self::Failed { .. } | Self::Panicked { .. } | Self::Output(_) => EXIT_FUNCTION_FAILED,
        }
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Agent entry point for a suite binary; reads `std::env::args_os`.
pub fn run_agent(registry: &TestRegistry) -> ExitCode {
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let code = dispatch(registry, std::env::args_os(), &mut stdout, &mut stderr);
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

/// Parses `args` (including the program name) and executes the request.
///
/// Returns the process exit status.
pub fn dispatch<I, T>(
    registry: &TestRegistry,
    args: I,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match AgentCli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            if error.kind() == ErrorKind::DisplayHelp {
                let _ = write!(out, "{error}");
                return EXIT_SUCCESS;
            }
            let _ = write!(err, "{error}");
            return EXIT_USAGE;
        }
    };
    let result = match cli.command {
        AgentCommand::Run {
            test,
            function,
            args,
        } => invoke(registry, &test, &function, &args),
        AgentCommand::List => write_list(registry, out),
    };
    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(error) => {
            let _ = writeln!(err, "vmharness-agent: {error}");
            error.exit_code()
        }
    }
}

/// Runs one native function with panics contained.
///
/// # Errors
///
/// Returns [`AgentError`] when the function is unknown, fails, or panics.
pub fn invoke(
    registry: &TestRegistry,
    test: &str,
    function: &str,
    args: &[String],
) -> Result<(), AgentError> {
    let descriptor = registry.get(test).ok_or_else(|| AgentError::UnknownTest(test.to_string()))?;
    let func = descriptor.native_func(function).ok_or_else(|| AgentError::UnknownFunction {
        test: test.to_string(),
        function: function.to_string(),
    })?;
    match catch_unwind(AssertUnwindSafe(|| func(args))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(AgentError::Failed {
            test: test.to_string(),
            function: function.to_string(),
            source,
        }),
        Err(payload) => Err(AgentError::Panicked {
            test: test.to_string(),
            function: function.to_string(),
            message: panic_message(payload.as_ref()).to_string(),
        }),
    }
}

/// Returns every `test/function` pair in name order.
#[must_use]
pub fn list_functions(registry: &TestRegistry) -> Vec<String> {
    registry.native_functions().into_iter().map(|(test, func)| format!("{test}/{func}")).collect()
}

/// Writes the function listing, one pair per line.
fn write_list(registry: &TestRegistry, out: &mut dyn Write) -> Result<(), AgentError> {
    for line in list_functions(registry) {
        writeln!(out, "{line}").map_err(|err| AgentError::Output(err.to_string()))?;
    }
    Ok(())
}
