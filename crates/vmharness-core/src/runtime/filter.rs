// crates/vmharness-core/src/runtime/filter.rs
// ============================================================================
// Module: VM Harness Applicability Filter
// Description: Pure run/skip/exclude decision for a test under a context.
// Purpose: Narrow the registry to the tests applicable to the current run.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! [`decide`] evaluates a descriptor's constraints against an
//! [`ExecutionContext`] in a fixed order and short-circuits on the first
//! negative match:
//!
//! 1. architecture allow-list
//! 2. distro allow-list
//! 3. platform allow-list
//! 4. platform deny-list
//! 5. minimum version
//! 6. skip predicate
//!
//! Steps 1-5 yield [`Decision::Exclude`]; step 6 yields [`Decision::Skip`].
//! The function reads only its arguments, so identical inputs always produce
//! identical decisions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::core::Architecture;
use crate::core::DistroTag;
use crate::core::ExecutionContext;
use crate::core::OsVersion;
use crate::core::PlatformName;
use crate::core::TestDescriptor;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Reason a test is structurally inapplicable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExcludeReason {
    /// Context architecture is not in the allow-list.
    Architecture(Architecture),
    /// Context distro is not in the allow-list.
    Distro(DistroTag),
    /// Context platform is not in the allow-list.
    Platform(PlatformName),
    /// Context platform is in the deny-list.
    ExcludedPlatform(PlatformName),
    /// Context version is below the minimum.
    MinVersion {
        /// Required minimum.
        required: OsVersion,
        /// Context version.
        actual: OsVersion,
    },
    /// Test name did not match the run's selection patterns.
    NotSelected,
}

impl fmt::Display for ExcludeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Architecture(arch) => write!(f, "architecture {arch} not supported"),
            Self::Distro(distro) => write!(f, "distro {distro} not supported"),
            Self::Platform(platform) => write!(f, "platform {platform} not supported"),
            Self::ExcludedPlatform(platform) => write!(f, "platform {platform} excluded"),
            Self::MinVersion {
                required,
                actual,
            } => write!(f, "version {actual} below minimum {required}"),
            Self::NotSelected => f.write_str("not selected"),
        }
    }
}

/// Filter decision for a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Test applies and should execute.
    Run,
    /// Test applies but is deliberately bypassed.
    Skip(String),
    /// Test does not apply to this context.
    Exclude(ExcludeReason),
}

// ============================================================================
// SECTION: Filter
// ============================================================================

/// Reason recorded when a skip predicate fires.
pub const SKIP_PREDICATE_REASON: &str = "skip predicate matched";

/// Decides whether a test runs, skips, or is excluded under `ctx`.
#[must_use]
pub fn decide(test: &TestDescriptor, ctx: &ExecutionContext) -> Decision {
    if !test.architectures().is_empty() && !test.architectures().contains(&ctx.architecture) {
        return Decision::Exclude(ExcludeReason::Architecture(ctx.architecture.clone()));
    }
    if !test.distros().is_empty() && !test.distros().contains(&ctx.distro) {
        return Decision::Exclude(ExcludeReason::Distro(ctx.distro.clone()));
    }
    if !test.platforms().is_empty() && !test.platforms().contains(&ctx.platform) {
        return Decision::Exclude(ExcludeReason::Platform(ctx.platform.clone()));
    }
    if test.exclude_platforms().contains(&ctx.platform) {
        return Decision::Exclude(ExcludeReason::ExcludedPlatform(ctx.platform.clone()));
    }
    if let Some(required) = test.min_version()
        && ctx.version < required
    {
        return Decision::Exclude(ExcludeReason::MinVersion {
            required,
            actual: ctx.version,
        });
    }
    if let Some(predicate) = test.skip_predicate()
        && predicate.evaluate(&ctx.skip_input())
    {
        return Decision::Skip(SKIP_PREDICATE_REASON.to_string());
    }
    Decision::Run
}
