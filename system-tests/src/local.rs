// system-tests/src/local.rs
// ============================================================================
// Module: Local Process Platform
// Description: Platform driver whose machines are directories on the host.
// Purpose: Run suites end to end, including native functions, without VMs.
// Dependencies: vmharness-core
// ============================================================================

//! ## Overview
//! Each [`LocalMachine`] owns a work directory under the platform root.
//! Commands run through `/bin/sh -c` with that directory as the working
//! directory, so a native invocation line starts the real agent binary and
//! the agent's exit status flows back unchanged. The guest configuration is
//! written to `guest-config` inside the work directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use vmharness_core::CommandOutput;
use vmharness_core::DestroyError;
use vmharness_core::ExecutionContext;
use vmharness_core::Machine;
use vmharness_core::MachineHandle;
use vmharness_core::PlatformDriver;
use vmharness_core::ProvisionError;
use vmharness_core::ProvisionRequest;
use vmharness_core::TransportError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Loopback address reported for every local machine.
const LOOPBACK: &str = "127.0.0.1";
/// File holding the guest configuration blob.
pub const GUEST_CONFIG_FILE: &str = "guest-config";

// ============================================================================
// SECTION: Machine
// ============================================================================

/// Host directory standing in for a guest.
#[derive(Debug, Clone)]
pub struct LocalMachine {
    /// Machine identifier.
    id: String,
    /// Working directory for commands.
    workdir: PathBuf,
}

impl LocalMachine {
    /// Returns the machine's working directory.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl Machine for LocalMachine {
    fn id(&self) -> &str {
        &self.id
    }

    fn private_ip(&self) -> &str {
        LOOPBACK
    }

    fn public_ip(&self) -> &str {
        LOOPBACK
    }

    fn exec(&self, command: &str) -> Result<CommandOutput, TransportError> {
        if !self.workdir.is_dir() {
            return Err(TransportError::Unavailable {
                machine: self.id.clone(),
                message: "machine destroyed".to_string(),
            });
        }
        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .output()
            .map_err(|err| TransportError::Io(format!("/bin/sh: {err}")))?;
        let exit_code = output.status.code().ok_or_else(|| TransportError::Unavailable {
            machine: self.id.clone(),
            message: "command terminated by signal".to_string(),
        })?;
        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
        })
    }
}

// ============================================================================
// SECTION: Platform
// ============================================================================

/// Counters shared by clones of a [`LocalPlatform`].
#[derive(Debug, Default)]
struct LocalState {
    /// Next machine number.
    next: usize,
    /// Provision calls received.
    provisions: usize,
    /// Destroy calls received.
    destroys: usize,
    /// Work directory of each live machine.
    workdirs: BTreeMap<String, PathBuf>,
}

/// Platform driver creating [`LocalMachine`]s under a root directory.
#[derive(Debug, Clone)]
pub struct LocalPlatform {
    /// Parent of every machine work directory.
    root: PathBuf,
    /// Shared counters.
    state: Arc<Mutex<LocalState>>,
}

impl LocalPlatform {
    /// Creates a platform rooted at `root`; the directory must exist.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Arc::default(),
        }
    }

    /// Number of provision calls received.
    #[must_use]
    pub fn provision_calls(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).provisions
    }

    /// Number of destroy calls received.
    #[must_use]
    pub fn destroy_calls(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).destroys
    }

    /// Work directories of machines not yet destroyed.
    #[must_use]
    pub fn live_workdirs(&self) -> Vec<PathBuf> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.workdirs.values().cloned().collect()
    }

    /// Creates one machine directory and writes its guest config.
    fn create(&self, test: &str, config: &[u8]) -> Result<LocalMachine, String> {
        let number = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.next += 1;
            state.next
        };
        let id = format!("local-{number}");
        let workdir = self.root.join(format!("{}-{id}", test.replace('/', "_")));
        fs::create_dir_all(&workdir)
            .map_err(|err| format!("create {}: {err}", workdir.display()))?;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .workdirs
            .insert(id.clone(), workdir.clone());
        fs::write(workdir.join(GUEST_CONFIG_FILE), config)
            .map_err(|err| format!("write guest config for {id}: {err}"))?;
        Ok(LocalMachine {
            id,
            workdir,
        })
    }
}

impl PlatformDriver for LocalPlatform {
    fn provision(
        &self,
        _ctx: &ExecutionContext,
        request: &ProvisionRequest<'_>,
    ) -> Result<Vec<MachineHandle>, ProvisionError> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).provisions += 1;
        let mut machines = Vec::with_capacity(request.count);
        for _ in 0 .. request.count {
            match self.create(request.test.as_str(), request.config.as_bytes()) {
                Ok(machine) => machines.push(MachineHandle::new(machine)),
                Err(message) => return Err(ProvisionError::new(message).with_partial(machines)),
            }
        }
        Ok(machines)
    }

    fn destroy(&self, machines: &[MachineHandle]) -> Result<(), DestroyError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.destroys += 1;
        let workdirs: Vec<(String, PathBuf)> = machines
            .iter()
            .filter_map(|machine| {
                state.workdirs.remove(machine.id()).map(|dir| (machine.id().to_string(), dir))
            })
            .collect();
        drop(state);
        let failures: Vec<String> = workdirs
            .into_iter()
            .filter_map(|(id, dir)| {
                fs::remove_dir_all(&dir).err().map(|err| format!("{id}: {err}"))
            })
            .collect();
        if failures.is_empty() { Ok(()) } else { Err(DestroyError(failures.join("; "))) }
    }
}
