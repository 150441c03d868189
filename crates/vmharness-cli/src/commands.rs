// crates/vmharness-cli/src/commands.rs
// ============================================================================
// Module: VM Harness CLI Commands
// Description: Dispatcher and command implementations for the launcher.
// Purpose: Load config, run the scheduler, and publish reports.
// Dependencies: clap, thiserror, tokio, vmharness-config, vmharness-core
// ============================================================================

//! ## Overview
//! [`execute`] parses arguments and dispatches to a command. `run` executes
//! the scheduler on a blocking thread while a Ctrl-C listener flips the
//! run's cancellation flag; in-flight tests still reach teardown before the
//! report is written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::error::ErrorKind;
use thiserror::Error;
use tokio::task::JoinHandle;
use vmharness_config::HarnessConfig;
use vmharness_core::CancellationFlag;
use vmharness_core::Decision;
use vmharness_core::DestroyError;
use vmharness_core::ExecutionContext;
use vmharness_core::MachineHandle;
use vmharness_core::PlatformDriver;
use vmharness_core::ProvisionError;
use vmharness_core::ProvisionRequest;
use vmharness_core::RunEventSink;
use vmharness_core::RunReport;
use vmharness_core::Scheduler;
use vmharness_core::SchedulerConfig;
use vmharness_core::TestRegistry;
use vmharness_core::runtime::FileEventSink;
use vmharness_core::runtime::StderrEventSink;

use crate::args::Cli;
use crate::args::Commands;
use crate::args::ConfigCommand;
use crate::args::ListCommand;
use crate::args::RunCommand;
use crate::output::emit_error;
use crate::output::output_error;
use crate::output::write_stderr_line;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Builds the platform driver for a run's execution context.
pub type DriverFactory =
    dyn Fn(&ExecutionContext) -> Result<Arc<dyn PlatformDriver>, String> + Send + Sync;

/// Result of a successfully dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Command completed and every executed test passed.
    Success,
    /// At least one test failed or the run was interrupted.
    TestsFailed,
}

impl CommandOutcome {
    /// Process exit status for this outcome.
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::TestsFailed => ExitCode::FAILURE,
        }
    }

    /// Classifies a finished run.
    #[must_use]
    pub const fn from_report(report: &RunReport) -> Self {
        if report.has_failures() || report.summary.cancelled > 0 {
            Self::TestsFailed
        } else {
            Self::Success
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    #[must_use]
    pub const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Suite binary entry point: parses process arguments and runs the command.
pub async fn main_with(registry: TestRegistry, factory: &DriverFactory) -> ExitCode {
    let mut stdout = std::io::stdout();
    match execute(std::env::args_os(), Arc::new(registry), factory, &mut stdout).await {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses `args` (including the program name) and dispatches the command.
///
/// # Errors
///
/// Returns [`CliError`] when arguments, configuration, or output fail.
pub async fn execute<I, T>(
    args: I,
    registry: Arc<TestRegistry>,
    factory: &DriverFactory,
    out: &mut dyn Write,
) -> CliResult<CommandOutcome>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) if error.kind() == ErrorKind::DisplayHelp => {
            write!(out, "{error}").map_err(|err| CliError::new(output_error("stdout", &err)))?;
            return Ok(CommandOutcome::Success);
        }
        Err(error) => return Err(CliError::new(error.to_string())),
    };
    match cli.command {
        Commands::Run(command) => command_run(command, registry, factory, out).await,
        Commands::List(command) => command_list(&command, &registry, out),
        Commands::Config {
            command,
        } => command_config(command, out),
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes `run`.
async fn command_run(
    command: RunCommand,
    registry: Arc<TestRegistry>,
    factory: &DriverFactory,
    out: &mut dyn Write,
) -> CliResult<CommandOutcome> {
    let mut config = load_config(command.config.as_deref())?;
    if !command.patterns.is_empty() {
        config.run.patterns = command.patterns;
    }
    if let Some(parallelism) = command.parallelism {
        config.run.parallelism = parallelism;
    }
    config.validate().map_err(|err| CliError::new(err.to_string()))?;
    let (ctx, scheduler_config) = run_settings(&config)?;
    let driver = factory(&ctx)
        .map_err(|err| CliError::new(format!("platform driver init failed: {err}")))?;
    let events = event_sink(&config)?;

    let cancel = CancellationFlag::new();
    let scheduler = Scheduler::new(ctx, driver, scheduler_config)
        .with_events(events)
        .with_cancellation(cancel.clone());
    let interrupt = spawn_interrupt_listener(cancel);
    let report = tokio::task::spawn_blocking(move || scheduler.run(&registry))
        .await
        .map_err(|err| CliError::new(format!("run join failed: {err}")));
    interrupt.abort();
    let report = report?;

    out.write_all(report.render_text().as_bytes())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    if let Some(path) = &command.report {
        write_report(path, &report)?;
    }
    Ok(CommandOutcome::from_report(&report))
}

/// Cancels the run on the first Ctrl-C.
fn spawn_interrupt_listener(cancel: CancellationFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = write_stderr_line("interrupt received; finishing in-flight tests");
            cancel.cancel();
        }
    })
}

/// Writes the canonical JSON report.
fn write_report(path: &Path, report: &RunReport) -> CliResult<()> {
    let bytes =
        report.to_canonical_json().map_err(|err| CliError::new(format!("report failed: {err}")))?;
    fs::write(path, bytes).map_err(|err| {
        CliError::new(format!("failed to write report {}: {err}", path.display()))
    })
}

/// Selects the event sink configured by `run.event_log`.
fn event_sink(config: &HarnessConfig) -> CliResult<Arc<dyn RunEventSink>> {
    match config.run.event_log_path() {
        Some(path) => {
            let sink = FileEventSink::new(&path).map_err(|err| {
                CliError::new(format!("failed to open event log {}: {err}", path.display()))
            })?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrEventSink)),
    }
}

// ============================================================================
// SECTION: List Command
// ============================================================================

/// Executes `list`.
fn command_list(
    command: &ListCommand,
    registry: &TestRegistry,
    out: &mut dyn Write,
) -> CliResult<CommandOutcome> {
    let mut lines = Vec::with_capacity(registry.len());
    match &command.config {
        None => {
            for descriptor in registry.iter() {
                lines.push(descriptor.name().to_string());
            }
        }
        Some(path) => {
            let config = load_config(Some(path))?;
            let (ctx, scheduler_config) = run_settings(&config)?;
            let scheduler = Scheduler::new(ctx, Arc::new(NoDriver), scheduler_config);
            for planned in scheduler.plan(registry) {
                let verdict = match &planned.decision {
                    Decision::Run => "RUN".to_string(),
                    Decision::Skip(reason) => format!("SKIP ({reason})"),
                    Decision::Exclude(reason) => format!("EXCLUDE ({reason})"),
                };
                lines.push(format!("{}\t{verdict}", planned.descriptor.name()));
            }
        }
    }
    for line in lines {
        writeln!(out, "{line}").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(CommandOutcome::Success)
}

/// Driver for planning only; never asked to provision.
struct NoDriver;

impl PlatformDriver for NoDriver {
    fn provision(
        &self,
        _ctx: &ExecutionContext,
        _request: &ProvisionRequest<'_>,
    ) -> Result<Vec<MachineHandle>, ProvisionError> {
        Err(ProvisionError::new("planning does not provision machines"))
    }

    fn destroy(&self, _machines: &[MachineHandle]) -> Result<(), DestroyError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes `config validate`.
fn command_config(command: ConfigCommand, out: &mut dyn Write) -> CliResult<CommandOutcome> {
    match command {
        ConfigCommand::Validate {
            config,
        } => {
            let config = load_config(config.as_deref())?;
            run_settings(&config)?;
            writeln!(
                out,
                "config ok: platform={} version={}",
                config.context.platform, config.context.version
            )
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(CommandOutcome::Success)
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates the harness config.
fn load_config(path: Option<&Path>) -> CliResult<HarnessConfig> {
    HarnessConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Derives the execution context and scheduler settings.
fn run_settings(config: &HarnessConfig) -> CliResult<(ExecutionContext, SchedulerConfig)> {
    let ctx = config.execution_context().map_err(|err| CliError::new(err.to_string()))?;
    let scheduler_config = config.scheduler_config().map_err(|err| CliError::new(err.to_string()))?;
    Ok((ctx, scheduler_config))
}
