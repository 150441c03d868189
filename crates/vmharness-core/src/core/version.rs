// crates/vmharness-core/src/core/version.rs
// ============================================================================
// Module: VM Harness OS Versions
// Description: Ordered OS release versions used for version gating.
// Purpose: Parse and compare `major.minor.patch` release numbers.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! OS releases are numbered `major.minor.patch` (for example `3033.2.4`).
//! Missing components default to zero, so `3034` and `3034.0.0` compare
//! equal. Build metadata after `+` is ignored; pre-release suffixes are
//! rejected since release images never carry them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Version parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// Version string was empty.
    #[error("version must not be empty")]
    Empty,
    /// Version had more than three components.
    #[error("version has too many components: {0}")]
    TooManyComponents(String),
    /// A component was not a non-negative integer.
    #[error("invalid version component {component:?} in {value}")]
    InvalidComponent {
        /// Offending component.
        component: String,
        /// Full version string.
        value: String,
    },
    /// Pre-release suffixes are not valid OS versions.
    #[error("pre-release versions are not supported: {0}")]
    PreRelease(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// OS release version ordered by `(major, minor, patch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OsVersion {
    /// Major release number.
    pub major: u64,
    /// Minor release number.
    pub minor: u64,
    /// Patch release number.
    pub patch: u64,
}

impl OsVersion {
    /// Creates a version from explicit components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Creates a `major.0.0` version.
    #[must_use]
    pub const fn major(major: u64) -> Self {
        Self::new(major, 0, 0)
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for OsVersion {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = trimmed.split_once('+').map_or(trimmed, |(core, _)| core);
        if core.is_empty() {
            return Err(VersionError::Empty);
        }
        if core.contains('-') {
            return Err(VersionError::PreRelease(value.to_string()));
        }
        let mut parts = [0_u64; 3];
        let mut count = 0;
        for component in core.split('.') {
            if count == parts.len() {
                return Err(VersionError::TooManyComponents(value.to_string()));
            }
            let parsed = component
                .parse::<u64>()
                .ok()
                .filter(|_| !component.is_empty() && component.bytes().all(|b| b.is_ascii_digit()))
                .ok_or_else(|| VersionError::InvalidComponent {
                    component: component.to_string(),
                    value: value.to_string(),
                })?;
            parts[count] = parsed;
            count += 1;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Serialize for OsVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OsVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
