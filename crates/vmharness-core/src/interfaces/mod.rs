// crates/vmharness-core/src/interfaces/mod.rs
// ============================================================================
// Module: VM Harness Interfaces
// Description: Backend-agnostic contracts for platforms and machines.
// Purpose: Define the provisioning and command-execution seams of the engine.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! The engine never boots machines or opens connections itself. A
//! [`PlatformDriver`] creates and destroys machines for a backend; each
//! [`Machine`] exposes its addresses and a blocking command-execution
//! capability. Both traits are object safe and shared across worker threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ExecutionContext;
use crate::core::TestFlag;
use crate::core::TestName;

// ============================================================================
// SECTION: Command Output
// ============================================================================

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// Process exit code.
    pub exit_code: i32,
}

impl CommandOutput {
    /// Creates a successful output with the given stdout.
    #[must_use]
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            exit_code: 0,
        }
    }

    /// Creates a failed output with the given exit code and stderr.
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Returns true when the command exited with status zero.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns stdout as trimmed, lossily decoded text.
    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    /// Returns stderr as trimmed, lossily decoded text.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

// ============================================================================
// SECTION: Machines
// ============================================================================

/// Command transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The machine could not be reached.
    #[error("machine {machine} unavailable: {message}")]
    Unavailable {
        /// Machine identifier.
        machine: String,
        /// Failure detail.
        message: String,
    },
    /// Local I/O failed while driving the transport.
    #[error("transport io error: {0}")]
    Io(String),
    /// The machine does not support the requested operation.
    #[error("operation {operation} unsupported on {machine}")]
    Unsupported {
        /// Machine identifier.
        machine: String,
        /// Unsupported operation.
        operation: &'static str,
    },
}

/// Provisioned machine exposing addresses and command execution.
pub trait Machine: Send + Sync {
    /// Returns the backend-assigned machine identifier.
    fn id(&self) -> &str;

    /// Returns the private network address.
    fn private_ip(&self) -> &str;

    /// Returns the public network address.
    fn public_ip(&self) -> &str;

    /// Runs a shell command and blocks until it exits.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the command could not be delivered or
    /// its result could not be collected. A non-zero exit is not an error at
    /// this layer.
    fn exec(&self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Reboots the machine and waits until it accepts commands again.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unsupported`] unless the backend overrides it.
    fn reboot(&self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported {
            machine: self.id().to_string(),
            operation: "reboot",
        })
    }
}

/// Shared handle to a provisioned machine.
#[derive(Clone)]
pub struct MachineHandle(Arc<dyn Machine>);

impl MachineHandle {
    /// Wraps a machine implementation.
    pub fn new(machine: impl Machine + 'static) -> Self {
        Self(Arc::new(machine))
    }

    /// Wraps an already shared machine implementation.
    #[must_use]
    pub fn from_arc(machine: Arc<dyn Machine>) -> Self {
        Self(machine)
    }

    /// Returns the address tests should use to reach the machine.
    #[must_use]
    pub fn address(&self) -> &str {
        let public = self.0.public_ip();
        if public.is_empty() { self.0.private_ip() } else { public }
    }
}

impl std::ops::Deref for MachineHandle {
    type Target = dyn Machine;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for MachineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineHandle")
            .field("id", &self.0.id())
            .field("private_ip", &self.0.private_ip())
            .field("public_ip", &self.0.public_ip())
            .finish()
    }
}

// ============================================================================
// SECTION: Platform Drivers
// ============================================================================

/// Opaque guest configuration blob (ignition or cloud-init style).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestConfig(Vec<u8>);

impl GuestConfig {
    /// Wraps raw configuration bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw configuration bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns true when no configuration was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Request to create machines for one test.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionRequest<'a> {
    /// Test the machines belong to.
    pub test: &'a TestName,
    /// Guest configuration for every machine in the batch.
    pub config: &'a GuestConfig,
    /// Number of machines to create.
    pub count: usize,
    /// Provisioning flags declared by the test.
    pub flags: &'a BTreeSet<TestFlag>,
}

/// Provisioning failure carrying any machines created before the failure.
#[derive(Debug, Error)]
#[error("provisioning failed: {message}")]
pub struct ProvisionError {
    /// Failure detail.
    pub message: String,
    /// Machines created before the failure; the caller destroys them.
    pub partial: Vec<MachineHandle>,
}

impl ProvisionError {
    /// Creates a failure with no partially created machines.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: Vec::new(),
        }
    }

    /// Attaches partially created machines.
    #[must_use]
    pub fn with_partial(mut self, partial: Vec<MachineHandle>) -> Self {
        self.partial = partial;
        self
    }
}

/// Teardown failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("destroy failed: {0}")]
pub struct DestroyError(pub String);

/// Backend capable of creating and destroying machines.
pub trait PlatformDriver: Send + Sync {
    /// Creates `request.count` machines.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] on failure, listing any machines that were
    /// created before the failure in [`ProvisionError::partial`].
    fn provision(
        &self,
        ctx: &ExecutionContext,
        request: &ProvisionRequest<'_>,
    ) -> Result<Vec<MachineHandle>, ProvisionError>;

    /// Destroys a batch of machines. Must tolerate partial batches.
    ///
    /// # Errors
    ///
    /// Returns [`DestroyError`] when any machine could not be released.
    fn destroy(&self, machines: &[MachineHandle]) -> Result<(), DestroyError>;
}
