// crates/vmharness-cli/src/args.rs
// ============================================================================
// Module: VM Harness CLI Arguments
// Description: clap argument model for the launcher.
// Purpose: Define subcommands and flags in one place.
// Dependencies: clap
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level launcher arguments.
#[derive(Parser, Debug)]
#[command(name = "vmharness", disable_help_subcommand = true, disable_version_flag = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Launcher subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the selected tests against the configured platform.
    Run(RunCommand),
    /// List registered tests, with decisions when a config is given.
    List(ListCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Config file path (defaults to `VMHARNESS_CONFIG` or `vmharness.toml`).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Test name glob; repeatable, replaces `run.patterns`.
    #[arg(long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,
    /// Worker count override.
    #[arg(long, value_name = "N")]
    pub parallelism: Option<usize>,
    /// Write the canonical JSON report to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Config file used to evaluate applicability.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a config file.
    Validate {
        /// Config file path.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}
