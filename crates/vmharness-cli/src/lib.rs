// crates/vmharness-cli/src/lib.rs
// ============================================================================
// Module: VM Harness CLI Library
// Description: Host-side launcher for a compiled test suite.
// Purpose: Shared command model and dispatcher for suite binaries.
// Dependencies: clap, thiserror, tokio, vmharness-config, vmharness-core
// ============================================================================

//! ## Overview
//! A suite binary registers its tests and hands the registry to
//! [`main_with`] together with a factory for its platform driver:
//!
//! ```text
//! vmharness run [--config PATH] [--pattern GLOB]... [--parallelism N] [--report PATH]
//! vmharness list [--config PATH]
//! vmharness config validate [--config PATH]
//! ```
//!
//! `run` exits non-zero when any test failed or the run was interrupted.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// clap argument model for the launcher.
pub mod args;
pub mod commands;
/// Line-oriented writers for stdout and stderr.
pub mod output;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use commands::CliError;
pub use commands::CliResult;
pub use commands::CommandOutcome;
pub use commands::DriverFactory;
pub use commands::execute;
pub use commands::main_with;
