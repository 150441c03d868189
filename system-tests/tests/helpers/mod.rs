// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for VM harness system-tests.
// Purpose: Provide run fixtures, binary locations, and timeouts.
// Dependencies: system-tests, vmharness-core
// ============================================================================

//! ## Overview
//! Shared helpers for VM harness system-tests.
//! Invariants:
//! - System-test execution is deterministic and fail-closed.
//! - Every run is checked for leaked machines.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod harness;
pub mod timeouts;
