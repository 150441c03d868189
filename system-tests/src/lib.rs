// system-tests/src/lib.rs
// ============================================================================
// Module: VM Harness System Tests Library
// Description: Shared configuration, sample suite, and local platform.
// Purpose: Provide common utilities for the system-test binaries.
// Dependencies: vmharness-core
// ============================================================================

//! ## Overview
//! This crate hosts the sample suite compiled into the sample agent and
//! launcher binaries, a host-process platform driver, and env-backed settings
//! used by the system-tests binaries in `system-tests/tests`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod local;
pub mod suite;
