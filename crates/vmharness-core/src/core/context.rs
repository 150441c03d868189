// crates/vmharness-core/src/core/context.rs
// ============================================================================
// Module: VM Harness Execution Context
// Description: Resolved facts about the build and platform under test.
// Purpose: Provide the read-only input shared by filtering and execution.
// Dependencies: crate::core::{identifiers, version}, serde
// ============================================================================

//! ## Overview
//! An [`ExecutionContext`] is built once per harness invocation and never
//! mutated afterwards. The scheduler shares it behind an `Arc` with every
//! worker and cluster.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::Architecture;
use crate::core::identifiers::Channel;
use crate::core::identifiers::DistroTag;
use crate::core::identifiers::PlatformName;
use crate::core::version::OsVersion;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Target build and platform for a harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Provisioning backend.
    pub platform: PlatformName,
    /// Distribution family.
    pub distro: DistroTag,
    /// Release train.
    pub channel: Channel,
    /// OS release version.
    pub version: OsVersion,
    /// CPU architecture.
    pub architecture: Architecture,
    /// Enabled feature flags for this run.
    #[serde(default)]
    pub features: BTreeSet<String>,
}

impl ExecutionContext {
    /// Creates a context with no enabled features.
    #[must_use]
    pub fn new(
        platform: impl Into<PlatformName>,
        distro: impl Into<DistroTag>,
        channel: impl Into<Channel>,
        version: OsVersion,
        architecture: impl Into<Architecture>,
    ) -> Self {
        Self {
            platform: platform.into(),
            distro: distro.into(),
            channel: channel.into(),
            version,
            architecture: architecture.into(),
            features: BTreeSet::new(),
        }
    }

    /// Returns a copy of the context with an additional feature enabled.
    #[must_use]
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into());
        self
    }

    /// Returns true when the named feature is enabled.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// Returns the four-field record consumed by skip predicates.
    #[must_use]
    pub const fn skip_input(&self) -> SkipInput<'_> {
        SkipInput {
            version: &self.version,
            channel: &self.channel,
            architecture: &self.architecture,
            platform: &self.platform,
        }
    }
}

/// Explicit input record for skip predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipInput<'a> {
    /// OS release version.
    pub version: &'a OsVersion,
    /// Release train.
    pub channel: &'a Channel,
    /// CPU architecture.
    pub architecture: &'a Architecture,
    /// Provisioning backend.
    pub platform: &'a PlatformName,
}
