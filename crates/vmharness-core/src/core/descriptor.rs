// crates/vmharness-core/src/core/descriptor.rs
// ============================================================================
// Module: VM Harness Test Descriptors
// Description: Immutable declarations of registered tests.
// Purpose: Capture test bodies, applicability constraints, and native functions.
// Dependencies: crate::{core, interfaces, runtime::cluster}, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`TestDescriptor`] is assembled through [`TestDescriptorBuilder`] and is
//! immutable once built. Applicability constraints are plain sets consumed by
//! the filter; skip predicates receive an explicit [`SkipInput`] record so they
//! never capture ambient run state.
//!
//! Security posture: native function names are validated at build time
//! because they are spliced into guest command lines.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::context::SkipInput;
use crate::core::identifiers::Architecture;
use crate::core::identifiers::DistroTag;
use crate::core::identifiers::IdentifierError;
use crate::core::identifiers::NativeFuncName;
use crate::core::identifiers::PlatformName;
use crate::core::identifiers::TestName;
use crate::core::version::OsVersion;
use crate::interfaces::GuestConfig;
use crate::runtime::cluster::TestCluster;
use crate::runtime::cluster::TestResult;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Descriptor construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Test name failed validation.
    #[error("invalid test name: {0}")]
    InvalidName(IdentifierError),
    /// Native function name failed validation.
    #[error("invalid native function name for {test}: {source}")]
    InvalidNativeName {
        /// Owning test name.
        test: String,
        /// Validation failure.
        source: IdentifierError,
    },
    /// Native function was declared twice.
    #[error("duplicate native function {function} in {test}")]
    DuplicateNative {
        /// Owning test name.
        test: String,
        /// Duplicated function name.
        function: String,
    },
    /// Timeout was zero.
    #[error("timeout for {0} must be greater than zero")]
    ZeroTimeout(String),
}

/// Error returned by a guest-side native function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeFuncError {
    /// The function ran and failed.
    #[error("{0}")]
    Failed(String),
    /// The function rejected its arguments.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

impl NativeFuncError {
    /// Creates a failure with the given message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

// ============================================================================
// SECTION: Callable Types
// ============================================================================

/// Test body invoked with the test's cluster handle.
pub type TestBody = Arc<dyn Fn(&mut TestCluster<'_>) -> TestResult + Send + Sync>;

/// Guest-side function dispatched by name through the agent.
pub type NativeFunc = Arc<dyn Fn(&[String]) -> Result<(), NativeFuncError> + Send + Sync>;

/// Adapts a zero-argument native function to the argument-taking form.
pub fn native_fn(
    func: fn() -> Result<(), NativeFuncError>,
) -> impl Fn(&[String]) -> Result<(), NativeFuncError> + Send + Sync + 'static {
    move |_args: &[String]| func()
}

/// Pure skip predicate over the four-field skip input.
#[derive(Clone)]
pub struct SkipPredicate(Arc<dyn Fn(&SkipInput<'_>) -> bool + Send + Sync>);

impl SkipPredicate {
    /// Wraps a predicate function.
    pub fn new(predicate: impl Fn(&SkipInput<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn evaluate(&self, input: &SkipInput<'_>) -> bool {
        (self.0)(input)
    }
}

impl fmt::Debug for SkipPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SkipPredicate(..)")
    }
}

// ============================================================================
// SECTION: Flags
// ============================================================================

/// Behavioral toggles consumed by platform drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestFlag {
    /// Do not inject the harness SSH key into user data.
    NoSshKeyInUserData,
    /// Do not inject the harness SSH key into instance metadata.
    NoSshKeyInMetadata,
    /// Do not fail the test when the guest drops to an emergency shell.
    NoEmergencyShellCheck,
    /// Do not enable the guest security subsystem.
    NoEnableSelinux,
    /// Do not scan guest consoles for kernel panics.
    NoKernelPanicCheck,
}

impl TestFlag {
    /// Returns the stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSshKeyInUserData => "no_ssh_key_in_user_data",
            Self::NoSshKeyInMetadata => "no_ssh_key_in_metadata",
            Self::NoEmergencyShellCheck => "no_emergency_shell_check",
            Self::NoEnableSelinux => "no_enable_selinux",
            Self::NoKernelPanicCheck => "no_kernel_panic_check",
        }
    }
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Immutable declaration of a registered test.
#[derive(Clone)]
pub struct TestDescriptor {
    /// Unique test name.
    name: TestName,
    /// Test body.
    body: TestBody,
    /// Machines provisioned before the body runs.
    cluster_size: usize,
    /// Native functions keyed by name.
    native_funcs: BTreeMap<NativeFuncName, NativeFunc>,
    /// Platform allow-list; empty means all.
    platforms: BTreeSet<PlatformName>,
    /// Platform deny-list.
    exclude_platforms: BTreeSet<PlatformName>,
    /// Distro allow-list; empty means all.
    distros: BTreeSet<DistroTag>,
    /// Architecture allow-list; empty means all.
    architectures: BTreeSet<Architecture>,
    /// Minimum OS version.
    min_version: Option<OsVersion>,
    /// Optional skip predicate.
    skip: Option<SkipPredicate>,
    /// Provisioning flags.
    flags: BTreeSet<TestFlag>,
    /// Optional per-test timeout.
    timeout: Option<Duration>,
    /// Opaque guest configuration for provisioning.
    guest_config: GuestConfig,
}

impl TestDescriptor {
    /// Starts building a descriptor.
    pub fn builder(
        name: impl Into<String>,
        body: impl Fn(&mut TestCluster<'_>) -> TestResult + Send + Sync + 'static,
    ) -> TestDescriptorBuilder {
        TestDescriptorBuilder::new(name, body)
    }

    /// Returns the test name.
    #[must_use]
    pub const fn name(&self) -> &TestName {
        &self.name
    }

    /// Returns the test body.
    #[must_use]
    pub const fn body(&self) -> &TestBody {
        &self.body
    }

    /// Returns the number of machines provisioned before the body runs.
    #[must_use]
    pub const fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    /// Returns the native function catalog.
    #[must_use]
    pub const fn native_funcs(&self) -> &BTreeMap<NativeFuncName, NativeFunc> {
        &self.native_funcs
    }

    /// Looks up a native function by name.
    #[must_use]
    pub fn native_func(&self, name: &str) -> Option<&NativeFunc> {
        self.native_funcs.iter().find(|(key, _)| key.as_str() == name).map(|(_, func)| func)
    }

    /// Returns the platform allow-list.
    #[must_use]
    pub const fn platforms(&self) -> &BTreeSet<PlatformName> {
        &self.platforms
    }

    /// Returns the platform deny-list.
    #[must_use]
    pub const fn exclude_platforms(&self) -> &BTreeSet<PlatformName> {
        &self.exclude_platforms
    }

    /// Returns the distro allow-list.
    #[must_use]
    pub const fn distros(&self) -> &BTreeSet<DistroTag> {
        &self.distros
    }

    /// Returns the architecture allow-list.
    #[must_use]
    pub const fn architectures(&self) -> &BTreeSet<Architecture> {
        &self.architectures
    }

    /// Returns the minimum OS version.
    #[must_use]
    pub const fn min_version(&self) -> Option<OsVersion> {
        self.min_version
    }

    /// Returns the skip predicate.
    #[must_use]
    pub const fn skip_predicate(&self) -> Option<&SkipPredicate> {
        self.skip.as_ref()
    }

    /// Returns the provisioning flags.
    #[must_use]
    pub const fn flags(&self) -> &BTreeSet<TestFlag> {
        &self.flags
    }

    /// Returns the per-test timeout override.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the guest configuration blob.
    #[must_use]
    pub const fn guest_config(&self) -> &GuestConfig {
        &self.guest_config
    }
}

impl fmt::Debug for TestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDescriptor")
            .field("name", &self.name)
            .field("cluster_size", &self.cluster_size)
            .field("native_funcs", &self.native_funcs.keys().collect::<Vec<_>>())
            .field("platforms", &self.platforms)
            .field("exclude_platforms", &self.exclude_platforms)
            .field("distros", &self.distros)
            .field("architectures", &self.architectures)
            .field("min_version", &self.min_version)
            .field("skip", &self.skip)
            .field("flags", &self.flags)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`TestDescriptor`].
pub struct TestDescriptorBuilder {
    /// Raw test name, validated on build.
    name: String,
    /// Test body.
    body: TestBody,
    /// Machines provisioned before the body runs.
    cluster_size: usize,
    /// Raw native function declarations, validated on build.
    natives: Vec<(String, NativeFunc)>,
    /// Platform allow-list.
    platforms: BTreeSet<PlatformName>,
    /// Platform deny-list.
    exclude_platforms: BTreeSet<PlatformName>,
    /// Distro allow-list.
    distros: BTreeSet<DistroTag>,
    /// Architecture allow-list.
    architectures: BTreeSet<Architecture>,
    /// Minimum OS version.
    min_version: Option<OsVersion>,
    /// Skip predicate.
    skip: Option<SkipPredicate>,
    /// Provisioning flags.
    flags: BTreeSet<TestFlag>,
    /// Per-test timeout.
    timeout: Option<Duration>,
    /// Guest configuration.
    guest_config: GuestConfig,
}

impl TestDescriptorBuilder {
    /// Creates a builder with empty constraints and no pre-provisioned machines.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&mut TestCluster<'_>) -> TestResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
            cluster_size: 0,
            natives: Vec::new(),
            platforms: BTreeSet::new(),
            exclude_platforms: BTreeSet::new(),
            distros: BTreeSet::new(),
            architectures: BTreeSet::new(),
            min_version: None,
            skip: None,
            flags: BTreeSet::new(),
            timeout: None,
            guest_config: GuestConfig::default(),
        }
    }

    /// Sets the number of machines provisioned before the body runs.
    #[must_use]
    pub const fn cluster_size(mut self, size: usize) -> Self {
        self.cluster_size = size;
        self
    }

    /// Restricts the test to the given platforms.
    #[must_use]
    pub fn platforms<I, P>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PlatformName>,
    {
        self.platforms.extend(platforms.into_iter().map(Into::into));
        self
    }

    /// Excludes the test from the given platforms.
    #[must_use]
    pub fn exclude_platforms<I, P>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PlatformName>,
    {
        self.exclude_platforms.extend(platforms.into_iter().map(Into::into));
        self
    }

    /// Restricts the test to the given distros.
    #[must_use]
    pub fn distros<I, D>(mut self, distros: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DistroTag>,
    {
        self.distros.extend(distros.into_iter().map(Into::into));
        self
    }

    /// Restricts the test to the given architectures.
    #[must_use]
    pub fn architectures<I, A>(mut self, architectures: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Architecture>,
    {
        self.architectures.extend(architectures.into_iter().map(Into::into));
        self
    }

    /// Sets the minimum OS version.
    #[must_use]
    pub const fn min_version(mut self, version: OsVersion) -> Self {
        self.min_version = Some(version);
        self
    }

    /// Sets the skip predicate.
    #[must_use]
    pub fn skip_when(
        mut self,
        predicate: impl Fn(&SkipInput<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.skip = Some(SkipPredicate::new(predicate));
        self
    }

    /// Adds a provisioning flag.
    #[must_use]
    pub fn flag(mut self, flag: TestFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    /// Declares a native function dispatched by the guest agent.
    #[must_use]
    pub fn native(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&[String]) -> Result<(), NativeFuncError> + Send + Sync + 'static,
    ) -> Self {
        self.natives.push((name.into(), Arc::new(func)));
        self
    }

    /// Overrides the run-level timeout for this test.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the guest configuration passed to the platform driver.
    #[must_use]
    pub fn guest_config(mut self, config: GuestConfig) -> Self {
        self.guest_config = config;
        self
    }

    /// Validates and builds the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when the test name or a native function name
    /// is invalid, a native function is declared twice, or the timeout is zero.
    pub fn build(self) -> Result<TestDescriptor, DescriptorError> {
        let name = TestName::parse(self.name).map_err(DescriptorError::InvalidName)?;
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(DescriptorError::ZeroTimeout(name.to_string()));
        }
        let mut native_funcs = BTreeMap::new();
        for (raw, func) in self.natives {
            let function = NativeFuncName::parse(raw).map_err(|source| {
                DescriptorError::InvalidNativeName {
                    test: name.to_string(),
                    source,
                }
            })?;
            if native_funcs.contains_key(&function) {
                return Err(DescriptorError::DuplicateNative {
                    test: name.to_string(),
                    function: function.to_string(),
                });
            }
            native_funcs.insert(function, func);
        }
        Ok(TestDescriptor {
            name,
            body: self.body,
            cluster_size: self.cluster_size,
            native_funcs,
            platforms: self.platforms,
            exclude_platforms: self.exclude_platforms,
            distros: self.distros,
            architectures: self.architectures,
            min_version: self.min_version,
            skip: self.skip,
            flags: self.flags,
            timeout: self.timeout,
            guest_config: self.guest_config,
        })
    }
}
