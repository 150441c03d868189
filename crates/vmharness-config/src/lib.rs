// crates/vmharness-config/src/lib.rs
// ============================================================================
// Module: VM Harness Config Library
// Description: Canonical run configuration model and validation.
// Purpose: Single source of truth for vmharness.toml semantics.
// Dependencies: vmharness-core, serde, toml
// ============================================================================

//! ## Overview
//! `vmharness-config` defines the run configuration for the harness: the
//! execution context under test, scheduler settings, and guest agent
//! location. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
