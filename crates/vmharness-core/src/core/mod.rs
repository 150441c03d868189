// crates/vmharness-core/src/core/mod.rs
// ============================================================================
// Module: VM Harness Core Types
// Description: Identifiers, contexts, descriptors, and result structures.
// Purpose: Provide stable, serializable types shared by every harness layer.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Core types describe what a run targets ([`ExecutionContext`]), what a test
//! declares ([`TestDescriptor`]), and what a run produced ([`RunReport`]).
//! They carry no execution logic beyond validation and ordering.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod context;
pub mod descriptor;
pub mod identifiers;
pub mod result;
pub mod version;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::ExecutionContext;
pub use context::SkipInput;
pub use descriptor::DescriptorError;
pub use descriptor::NativeFunc;
pub use descriptor::NativeFuncError;
pub use descriptor::SkipPredicate;
pub use descriptor::TestBody;
pub use descriptor::TestDescriptor;
pub use descriptor::TestDescriptorBuilder;
pub use descriptor::TestFlag;
pub use descriptor::native_fn;
pub use identifiers::Architecture;
pub use identifiers::Channel;
pub use identifiers::DistroTag;
pub use identifiers::IdentifierError;
pub use identifiers::NativeFuncName;
pub use identifiers::PlatformName;
pub use identifiers::TestName;
pub use result::Outcome;
pub use result::ReportError;
pub use result::ResultNode;
pub use result::RunReport;
pub use result::RunSummary;
pub use result::TestRecord;
pub use version::OsVersion;
pub use version::VersionError;
