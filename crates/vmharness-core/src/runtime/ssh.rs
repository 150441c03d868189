// crates/vmharness-core/src/runtime/ssh.rs
// ============================================================================
// Module: VM Harness SSH Machines
// Description: Machine implementation backed by the system `ssh` client.
// Purpose: Run guest commands on real machines reachable over SSH.
// Dependencies: crate::{interfaces, runtime::retry}, serde
// ============================================================================

//! ## Overview
//! [`SshMachine`] shells out to the OpenSSH client in batch mode and collects
//! the remote exit status and streams. The client reserves exit status 255
//! for its own failures, which are reported as transport errors; every other
//! status belongs to the remote command.
//!
//! Security posture: host keys of ephemeral test machines are not pinned,
//! so host key checking is disabled and no known-hosts file is written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::interfaces::CommandOutput;
use crate::interfaces::Machine;
use crate::interfaces::TransportError;
use crate::runtime::retry::retry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exit status the OpenSSH client uses for its own errors.
pub const SSH_CLIENT_FAILURE: i32 = 255;
/// Command printing the guest boot identifier.
const BOOT_ID_COMMAND: &str = "cat /proc/sys/kernel/random/boot_id";
/// Command issued to reboot the guest.
const REBOOT_COMMAND: &str = "sudo systemctl reboot";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Connection parameters for one SSH-reachable machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshTarget {
    /// Host name or address.
    pub host: String,
    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Remote user.
    #[serde(default = "default_user")]
    pub user: String,
    /// Private key file.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u32,
    /// SSH client binary.
    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,
}

/// Default SSH port.
const fn default_port() -> u16 {
    22
}

/// Default remote user.
fn default_user() -> String {
    "core".to_string()
}

/// Default connection timeout.
const fn default_connect_timeout() -> u32 {
    10
}

/// Default client binary.
fn default_ssh_binary() -> String {
    "ssh".to_string()
}

impl SshTarget {
    /// Creates a target with default port, user, and timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: default_user(),
            identity_file: None,
            connect_timeout_secs: default_connect_timeout(),
            ssh_binary: default_ssh_binary(),
        }
    }
}

/// Reboot polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebootPolicy {
    /// Maximum polls for the new boot.
    pub attempts: u32,
    /// Interval between polls.
    pub interval: Duration,
}

impl Default for RebootPolicy {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(10),
        }
    }
}

/// Machine reached through the system SSH client.
#[derive(Debug, Clone)]
pub struct SshMachine {
    /// Machine identifier.
    id: String,
    /// Private address.
    private_ip: String,
    /// Connection parameters; `host` is the public address.
    target: SshTarget,
    /// Reboot polling settings.
    reboot: RebootPolicy,
}

impl SshMachine {
    /// Creates a machine handle.
    #[must_use]
    pub fn new(id: impl Into<String>, private_ip: impl Into<String>, target: SshTarget) -> Self {
        Self {
            id: id.into(),
            private_ip: private_ip.into(),
            target,
            reboot: RebootPolicy::default(),
        }
    }

    /// Overrides the reboot polling settings.
    #[must_use]
    pub const fn with_reboot_policy(mut self, reboot: RebootPolicy) -> Self {
        self.reboot = reboot;
        self
    }

    /// Returns the connection parameters.
    #[must_use]
    pub const fn target(&self) -> &SshTarget {
        &self.target
    }

    /// Builds the client argument vector for `command`.
    #[must_use]
    pub fn command_args(&self, command: &str) -> Vec<String> {
        let target = &self.target;
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", target.connect_timeout_secs),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-p".to_string(),
            target.port.to_string(),
        ];
        if let Some(identity) = &target.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(format!("{}@{}", target.user, target.host));
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    /// Reads the guest boot identifier.
    fn boot_id(&self) -> Result<String, TransportError> {
        let output = self.exec(BOOT_ID_COMMAND)?;
        if !output.succeeded() {
            return Err(TransportError::Unavailable {
                machine: self.id.clone(),
                message: format!("boot id query exited with status {}", output.exit_code),
            });
        }
        Ok(output.stdout_text())
    }
}

impl Machine for SshMachine {
    fn id(&self) -> &str {
        &self.id
    }

    fn private_ip(&self) -> &str {
        &self.private_ip
    }

    fn public_ip(&self) -> &str {
        &self.target.host
    }

    fn exec(&self, command: &str) -> Result<CommandOutput, TransportError> {
        let output = Command::new(&self.target.ssh_binary)
            .args(self.command_args(command))
            .output()
            .map_err(|err| TransportError::Io(format!("{}: {err}", self.target.ssh_binary)))?;
        let Some(exit_code) = output.status.code() else {
            return Err(TransportError::Unavailable {
                machine: self.id.clone(),
                message: "ssh client terminated by signal".to_string(),
            });
        };
        if exit_code == SSH_CLIENT_FAILURE {
            return Err(TransportError::Unavailable {
                machine: self.id.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
        })
    }

    fn reboot(&self) -> Result<(), TransportError> {
        let before = self.boot_id()?;
        // The session usually drops mid-command.
        let _ = self.exec(REBOOT_COMMAND);
        retry(self.reboot.attempts, self.reboot.interval, || {
            let current = self.boot_id()?;
            if current == before {
                return Err(TransportError::Unavailable {
                    machine: self.id.clone(),
                    message: "machine has not rebooted yet".to_string(),
                });
            }
            Ok(())
        })
    }
}
