// crates/vmharness-agent/src/lib.rs
// ============================================================================
// Module: VM Harness Agent Library
// Description: Guest-side dispatch of native functions by name.
// Purpose: Turn a compiled test registry into the on-guest agent binary.
// Dependencies: clap, thiserror, vmharness-core
// ============================================================================

//! ## Overview
//! A test suite links its [`vmharness_core::TestRegistry`] into a small binary
//! whose `main` calls [`run_agent`]. The harness copies that binary onto each
//! guest and invokes it as:
//!
//! ```text
//! vmharness-agent run <test-name> <func-name> [args...]
//! vmharness-agent list
//! ```
//!
//! Results travel only through the exit status: `0` on success, `1` when the
//! function ran and failed, `2` for an unknown function or malformed request.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod agent;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use agent::AgentError;
pub use agent::dispatch;
pub use agent::invoke;
pub use agent::list_functions;
pub use agent::run_agent;
