// crates/vmharness-core/src/runtime/mod.rs
// ============================================================================
// Module: VM Harness Runtime
// Description: Filtering, scheduling, cluster execution, and helpers.
// Purpose: Execute registered tests against a platform driver.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the applicability filter, the worker-pool
//! scheduler, cluster and sub-test execution, the native invocation protocol,
//! retry combinators, run events, and the reference in-memory and SSH
//! backends. Every entry point funnels through [`Scheduler`] so results and
//! teardown follow one code path.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod cluster;
pub mod events;
pub mod filter;
pub mod memory;
pub mod native;
pub mod registry;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod selection;
pub mod ssh;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cluster::Cluster;
pub use cluster::ExecError;
pub use cluster::TestAbort;
pub use cluster::TestCluster;
pub use cluster::TestResult;
pub use cluster::execute_body;
pub use cluster::panic_message;
pub use events::FileEventSink;
pub use events::MemoryEventSink;
pub use events::NoopEventSink;
pub use events::RunEvent;
pub use events::RunEventKind;
pub use events::RunEventSink;
pub use events::StderrEventSink;
pub use filter::Decision;
pub use filter::ExcludeReason;
pub use filter::decide;
pub use memory::InMemoryMachine;
pub use memory::InMemoryPlatform;
pub use native::AgentSettings;
pub use native::NativeInvocation;
pub use registry::RegistryError;
pub use registry::TestRegistry;
pub use report::ResultAggregator;
pub use retry::retry;
pub use retry::retry_conditional;
pub use retry::retry_until;
pub use scheduler::CancellationFlag;
pub use scheduler::PlannedTest;
pub use scheduler::Scheduler;
pub use scheduler::SchedulerConfig;
pub use selection::TestSelection;
pub use ssh::SshMachine;
pub use ssh::SshTarget;
