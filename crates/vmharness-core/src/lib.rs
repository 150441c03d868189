// crates/vmharness-core/src/lib.rs
// ============================================================================
// Module: VM Harness Core Library
// Description: Public API surface for the VM harness engine.
// Purpose: Expose core types, platform interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! VM harness core selects which registered OS integration tests apply to a
//! build and platform, provisions ephemeral machines for them through a
//! pluggable [`PlatformDriver`], drives those machines through shell commands
//! and guest-side native functions, and aggregates nested results into a
//! deterministic [`RunReport`]. Machines are always torn down, whatever the
//! test outcome.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CommandOutput;
pub use interfaces::DestroyError;
pub use interfaces::GuestConfig;
pub use interfaces::Machine;
pub use interfaces::MachineHandle;
pub use interfaces::PlatformDriver;
pub use interfaces::ProvisionError;
pub use interfaces::ProvisionRequest;
pub use interfaces::TransportError;
pub use runtime::AgentSettings;
pub use runtime::CancellationFlag;
pub use runtime::Decision;
pub use runtime::ExcludeReason;
pub use runtime::ExecError;
pub use runtime::InMemoryPlatform;
pub use runtime::RegistryError;
pub use runtime::RunEvent;
pub use runtime::RunEventKind;
pub use runtime::RunEventSink;
pub use runtime::Scheduler;
pub use runtime::SchedulerConfig;
pub use runtime::TestAbort;
pub use runtime::TestCluster;
pub use runtime::TestRegistry;
pub use runtime::TestResult;
pub use runtime::TestSelection;
pub use runtime::decide;
pub use runtime::retry;
