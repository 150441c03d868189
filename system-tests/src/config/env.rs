// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed settings for the system-test binaries.
// Purpose: Parse the run root and timeout floor read by launcher tests.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Two variables tune a system-test run:
//! - `VMHARNESS_SYSTEM_TEST_RUN_ROOT` names the directory local machines are
//!   created under. Spawned agents resolve it from their own work dirs, so it
//!   must be absolute. It is read as an OS string and may hold non-UTF-8 bytes.
//! - `VMHARNESS_SYSTEM_TEST_TIMEOUT_SEC` raises every suite timeout to at
//!   least the given number of whole seconds, capped at one day.
//!
//! A variable that is set but unusable is an error, never a silent default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Largest accepted timeout floor, in seconds.
pub const MAX_TIMEOUT_FLOOR_SECS: u64 = 24 * 60 * 60;

// ============================================================================
// SECTION: Environment Keys
// ============================================================================

/// Environment keys read by [`SystemTestConfig::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Directory under which local machines get their work dirs.
    RunRoot,
    /// Floor applied to suite timeouts, in whole seconds.
    TimeoutSeconds,
}

impl SystemTestEnv {
    /// Returns the environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunRoot => "VMHARNESS_SYSTEM_TEST_RUN_ROOT",
            Self::TimeoutSeconds => "VMHARNESS_SYSTEM_TEST_TIMEOUT_SEC",
        }
    }

    /// Returns the raw value, or `None` when the variable is unset.
    fn raw(self) -> Option<OsString> {
        std::env::var_os(self.as_str())
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Settings derived from the system-test environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemTestConfig {
    /// Run root override; the launcher falls back to the temp dir.
    pub run_root: Option<PathBuf>,
    /// Floor applied by [`SystemTestConfig::resolve_timeout`].
    pub timeout: Option<Duration>,
}

impl SystemTestConfig {
    /// Reads both variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable when a set value is unusable.
    pub fn load() -> Result<Self, String> {
        Ok(Self {
            run_root: SystemTestEnv::RunRoot.raw().map(parse_run_root).transpose()?,
            timeout: SystemTestEnv::TimeoutSeconds.raw().map(parse_timeout_floor).transpose()?,
        })
    }

    /// Returns `requested`, raised to the configured floor when that is larger.
    #[must_use]
    pub fn resolve_timeout(&self, requested: Duration) -> Duration {
        self.timeout.map_or(requested, |floor| requested.max(floor))
    }
}

// ============================================================================
// SECTION: Parsers
// ============================================================================

/// Parses a run root value into an absolute directory path.
///
/// # Errors
///
/// Returns an error when the value is blank or a relative path.
pub fn parse_run_root(raw: OsString) -> Result<PathBuf, String> {
    let name = SystemTestEnv::RunRoot.as_str();
    if raw.to_string_lossy().trim().is_empty() {
        return Err(format!("{name} is set but blank"));
    }
    let path = PathBuf::from(raw);
    if path.is_relative() {
        return Err(format!("{name} must be an absolute path, got {}", path.display()));
    }
    Ok(path)
}

/// Parses a timeout floor given as whole seconds.
///
/// # Errors
///
/// Returns an error when the value is not UTF-8 digits, is zero, or exceeds
/// [`MAX_TIMEOUT_FLOOR_SECS`].
pub fn parse_timeout_floor(raw: OsString) -> Result<Duration, String> {
    let name = SystemTestEnv::TimeoutSeconds.as_str();
    let text = raw.into_string().map_err(|_| format!("{name} must be valid UTF-8"))?;
    let digits = text.trim();
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(format!("{name} must be whole seconds, got '{text}'"));
    }
    match digits.parse::<u64>() {
        Ok(0) => Err(format!("{name} must be greater than zero")),
        Ok(secs) if secs <= MAX_TIMEOUT_FLOOR_SECS => Ok(Duration::from_secs(secs)),
        _ => Err(format!("{name} must not exceed {MAX_TIMEOUT_FLOOR_SECS} seconds")),
    }
}
