// crates/vmharness-config/src/config.rs
// ============================================================================
// Module: VM Harness Configuration
// Description: Configuration loading and validation for harness runs.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: vmharness-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The `[context]` table names the build under test, `[run]` carries
//! scheduler settings, and `[agent]` locates the guest agent. Missing or
//! invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use vmharness_core::AgentSettings;
use vmharness_core::ExecutionContext;
use vmharness_core::OsVersion;
use vmharness_core::SchedulerConfig;
use vmharness_core::TestSelection;
use vmharness_core::runtime::native::DEFAULT_AGENT_BINARY;
use vmharness_core::runtime::native::DEFAULT_DETACH_WRAPPER;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "vmharness.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "VMHARNESS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a context label.
pub(crate) const MAX_LABEL_LENGTH: usize = 64;
/// Maximum number of feature flags.
pub(crate) const MAX_FEATURES: usize = 64;
/// Maximum number of selection patterns.
pub(crate) const MAX_PATTERNS: usize = 256;
/// Maximum length of a selection pattern.
pub(crate) const MAX_PATTERN_LENGTH: usize = 256;
/// Maximum worker count.
pub(crate) const MAX_PARALLELISM: usize = 256;
/// Default worker count.
const DEFAULT_PARALLELISM: usize = 1;
/// Default per-test timeout in seconds.
const DEFAULT_TEST_TIMEOUT_SECS: u64 = 600;
/// Maximum per-test timeout in seconds.
pub(crate) const MAX_TEST_TIMEOUT_SECS: u64 = 86_400;
/// Maximum length of the detach wrapper command.
pub(crate) const MAX_WRAPPER_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Build and platform under test.
    pub context: ContextConfig,
    /// Scheduler settings.
    #[serde(default)]
    pub run: RunConfig,
    /// Guest agent settings.
    #[serde(default)]
    pub agent: AgentConfig,
}

impl HarnessConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path comes from `path`, then `VMHARNESS_CONFIG`, then
    /// `vmharness.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::parse(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.context.validate()?;
        self.run.validate()?;
        self.agent.validate()?;
        Ok(())
    }

    /// Builds the execution context described by `[context]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the version does not parse.
    pub fn execution_context(&self) -> Result<ExecutionContext, ConfigError> {
        let version = self.context.os_version()?;
        let ctx = self.context.features.iter().fold(
            ExecutionContext::new(
                self.context.platform.as_str(),
                self.context.distro.as_str(),
                self.context.channel.as_str(),
                version,
                self.context.architecture.as_str(),
            ),
            |ctx, feature| ctx.with_feature(feature.as_str()),
        );
        Ok(ctx)
    }

    /// Builds scheduler settings from `[run]` and `[agent]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parallelism is out of range.
    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        let parallelism = NonZeroUsize::new(self.run.parallelism)
            .ok_or_else(|| ConfigError::Invalid("run.parallelism must be at least 1".to_string()))?;
        Ok(SchedulerConfig {
            parallelism,
            default_timeout: Some(Duration::from_secs(self.run.test_timeout_secs)),
            selection: TestSelection::new(self.run.patterns.iter().map(String::as_str)),
            agent: self.agent.settings(),
        })
    }
}

/// Build and platform under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Provisioning backend name (e.g. `qemu`, `aws`, `esx`).
    pub platform: String,
    /// Distribution family tag.
    #[serde(default = "default_distro")]
    pub distro: String,
    /// Release channel.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// OS release version (`major[.minor[.patch]]`).
    pub version: String,
    /// CPU architecture.
    #[serde(default = "default_architecture")]
    pub architecture: String,
    /// Enabled feature flags.
    #[serde(default)]
    pub features: Vec<String>,
}

impl ContextConfig {
    /// Validates context labels and the version string.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_label("context.platform", &self.platform)?;
        validate_label("context.distro", &self.distro)?;
        validate_label("context.channel", &self.channel)?;
        validate_label("context.architecture", &self.architecture)?;
        self.os_version()?;
        if self.features.len() > MAX_FEATURES {
            return Err(ConfigError::Invalid(format!(
                "context.features exceeds {MAX_FEATURES} entries"
            )));
        }
        for feature in &self.features {
            validate_label("context.features", feature)?;
        }
        Ok(())
    }

    /// Parses the configured version.
    fn os_version(&self) -> Result<OsVersion, ConfigError> {
        self.version
            .parse::<OsVersion>()
            .map_err(|err| ConfigError::Invalid(format!("context.version: {err}")))
    }
}

/// Scheduler settings for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Maximum number of tests executing concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Glob patterns selecting test names; empty selects everything.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Timeout for tests that do not declare their own.
    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,
    /// Optional JSON-lines event log path; events go to stderr when unset.
    #[serde(default)]
    pub event_log: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            patterns: Vec::new(),
            test_timeout_secs: default_test_timeout_secs(),
            event_log: None,
        }
    }
}

impl RunConfig {
    /// Validates scheduler limits and patterns.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(ConfigError::Invalid(format!(
                "run.parallelism must be between 1 and {MAX_PARALLELISM}"
            )));
        }
        if self.test_timeout_secs == 0 || self.test_timeout_secs > MAX_TEST_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "run.test_timeout_secs must be between 1 and {MAX_TEST_TIMEOUT_SECS}"
            )));
        }
        if self.patterns.len() > MAX_PATTERNS {
            return Err(ConfigError::Invalid(format!(
                "run.patterns exceeds {MAX_PATTERNS} entries"
            )));
        }
        for pattern in &self.patterns {
            if pattern.trim().is_empty() {
                return Err(ConfigError::Invalid("run.patterns entries must be non-empty".to_string()));
            }
            if pattern.len() > MAX_PATTERN_LENGTH {
                return Err(ConfigError::Invalid("run.patterns entry exceeds max length".to_string()));
            }
        }
        if let Some(path) = &self.event_log {
            validate_path_string("run.event_log", path)?;
        }
        Ok(())
    }

    /// Returns the event log path, if configured.
    #[must_use]
    pub fn event_log_path(&self) -> Option<PathBuf> {
        self.event_log.as_deref().map(|path| PathBuf::from(path.trim()))
    }
}

/// Guest agent location and launch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Path of the agent binary on the guest.
    #[serde(default = "default_agent_binary")]
    pub binary_path: String,
    /// Command prefix for detached invocations; empty runs them synchronously.
    #[serde(default = "default_detach_wrapper")]
    pub detach_wrapper: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary_path: default_agent_binary(),
            detach_wrapper: default_detach_wrapper(),
        }
    }
}

impl AgentConfig {
    /// Validates the agent path and wrapper.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("agent.binary_path", &self.binary_path)?;
        if self.binary_path.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "agent.binary_path must not contain whitespace".to_string(),
            ));
        }
        if self.detach_wrapper.len() > MAX_WRAPPER_LENGTH {
            return Err(ConfigError::Invalid("agent.detach_wrapper exceeds max length".to_string()));
        }
        if self.detach_wrapper.contains(['\n', '\r']) {
            return Err(ConfigError::Invalid(
                "agent.detach_wrapper must be a single line".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts to runtime agent settings.
    #[must_use]
    pub fn settings(&self) -> AgentSettings {
        AgentSettings {
            binary_path: self.binary_path.clone(),
            detach_wrapper: self.detach_wrapper.trim().to_string(),
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default distribution tag.
fn default_distro() -> String {
    "cl".to_string()
}

/// Default release channel.
fn default_channel() -> String {
    "stable".to_string()
}

/// Default architecture.
fn default_architecture() -> String {
    "amd64".to_string()
}

/// Default worker count.
const fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

/// Default per-test timeout.
const fn default_test_timeout_secs() -> u64 {
    DEFAULT_TEST_TIMEOUT_SECS
}

/// Default guest agent path.
fn default_agent_binary() -> String {
    DEFAULT_AGENT_BINARY.to_string()
}

/// Default detach wrapper.
fn default_detach_wrapper() -> String {
    DEFAULT_DETACH_WRAPPER.to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a context label: ASCII alphanumerics plus `.`, `-`, `_`.
fn validate_label(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_LABEL_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds {MAX_LABEL_LENGTH} characters")));
    }
    if let Some(found) =
        value.chars().find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_')))
    {
        return Err(ConfigError::Invalid(format!("{field} contains invalid character '{found}'")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
