// crates/vmharness-core/src/runtime/memory.rs
// ============================================================================
// Module: VM Harness In-Memory Platform
// Description: Scripted platform driver and machines for tests and demos.
// Purpose: Exercise the engine deterministically without real backends.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryPlatform`] hands out [`InMemoryMachine`]s whose commands are
//! answered from a script of substring-matched responses. The platform counts
//! provision and destroy calls and tracks live machines so tests can assert
//! that nothing leaked. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::core::ExecutionContext;
use crate::core::TestFlag;
use crate::interfaces::CommandOutput;
use crate::interfaces::DestroyError;
use crate::interfaces::Machine;
use crate::interfaces::MachineHandle;
use crate::interfaces::PlatformDriver;
use crate::interfaces::ProvisionError;
use crate::interfaces::ProvisionRequest;
use crate::interfaces::TransportError;

// ============================================================================
// SECTION: State
// ============================================================================

/// One scripted reply.
type Reply = Result<CommandOutput, TransportError>;

/// Replies for commands containing a substring; the last reply repeats.
#[derive(Debug, Clone)]
struct Script {
    /// Substring matched against the command line.
    pattern: String,
    /// Replies in order.
    replies: Vec<Reply>,
    /// Index of the next reply.
    cursor: usize,
}

/// Provision request as seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRecord {
    /// Requesting test.
    pub test: String,
    /// Requested machine count.
    pub count: usize,
    /// Flags declared by the test.
    pub flags: BTreeSet<TestFlag>,
    /// Size of the guest configuration blob.
    pub config_len: usize,
    /// Platform named by the run context.
    pub platform: String,
}

/// Command as seen by a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    /// Machine identifier.
    pub machine: String,
    /// Command line.
    pub command: String,
}

/// Mutable platform state shared with machines.
#[derive(Debug, Default)]
struct PlatformState {
    /// Next machine sequence number.
    next_id: usize,
    /// Provision requests in call order.
    provisions: Vec<ProvisionRecord>,
    /// Number of destroy calls.
    destroy_calls: usize,
    /// Live machine identifiers.
    live: BTreeSet<String>,
    /// Command scripts, first match wins.
    scripts: Vec<Script>,
    /// Commands received in order.
    commands: Vec<CommandRecord>,
    /// Provisioning failure: message and number of machines created first.
    provision_failure: Option<(String, usize)>,
    /// Destroy failure message.
    destroy_failure: Option<String>,
}

impl PlatformState {
    /// Creates a live machine.
    fn spawn(&mut self, state: &Arc<Mutex<Self>>) -> MachineHandle {
        self.next_id += 1;
        let n = self.next_id;
        let id = format!("mem-{n}");
        self.live.insert(id.clone());
        MachineHandle::new(InMemoryMachine {
            id,
            private_ip: format!("10.0.{}.{}", n / 256, n % 256),
            public_ip: format!("203.0.{}.{}", 113 + n / 256, n % 256),
            state: Arc::clone(state),
        })
    }

    /// Returns the scripted reply for a command.
    fn reply(&mut self, command: &str) -> Reply {
        let Some(script) = self.scripts.iter_mut().find(|s| command.contains(&s.pattern)) else {
            return Ok(CommandOutput::success(Vec::new()));
        };
        let index = script.cursor.min(script.replies.len().saturating_sub(1));
        script.cursor = script.cursor.saturating_add(1);
        script.replies.get(index).cloned().unwrap_or_else(|| Ok(CommandOutput::default()))
    }
}

// ============================================================================
// SECTION: Platform
// ============================================================================

/// Scripted in-memory platform driver.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlatform {
    /// Shared state.
    state: Arc<Mutex<PlatformState>>,
}

impl InMemoryPlatform {
    /// Creates a platform with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state, recovering from poisoning for inspection helpers.
    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answers commands containing `pattern` with `output`.
    pub fn respond(&self, pattern: impl Into<String>, output: CommandOutput) {
        self.script(pattern, vec![Ok(output)]);
    }

    /// Answers commands containing `pattern` with `outputs` in order; the last
    /// output repeats.
    pub fn respond_sequence(&self, pattern: impl Into<String>, outputs: Vec<CommandOutput>) {
        self.script(pattern, outputs.into_iter().map(Ok).collect());
    }

    /// Fails commands containing `pattern` with a transport error.
    pub fn fail_transport(&self, pattern: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        self.script(
            pattern,
            vec![Err(TransportError::Unavailable {
                machine: "in-memory".to_string(),
                message,
            })],
        );
    }

    /// Registers a script.
    fn script(&self, pattern: impl Into<String>, replies: Vec<Reply>) {
        self.lock().scripts.push(Script {
            pattern: pattern.into(),
            replies,
            cursor: 0,
        });
    }

    /// Makes every provision call fail after creating `partial` machines.
    pub fn fail_provisioning(&self, message: impl Into<String>, partial: usize) {
        self.lock().provision_failure = Some((message.into(), partial));
    }

    /// Makes every destroy call fail and leak its machines.
    pub fn fail_destroy(&self, message: impl Into<String>) {
        self.lock().destroy_failure = Some(message.into());
    }

    /// Returns the number of provision calls.
    #[must_use]
    pub fn provision_calls(&self) -> usize {
        self.lock().provisions.len()
    }

    /// Returns provision requests in call order.
    #[must_use]
    pub fn provisions(&self) -> Vec<ProvisionRecord> {
        self.lock().provisions.clone()
    }

    /// Returns the number of destroy calls.
    #[must_use]
    pub fn destroy_calls(&self) -> usize {
        self.lock().destroy_calls
    }

    /// Returns the number of machines ever created.
    #[must_use]
    pub fn machines_created(&self) -> usize {
        self.lock().next_id
    }

    /// Returns identifiers of machines not yet destroyed.
    #[must_use]
    pub fn live_machines(&self) -> Vec<String> {
        self.lock().live.iter().cloned().collect()
    }

    /// Returns every command received, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.lock().commands.clone()
    }
}

impl PlatformDriver for InMemoryPlatform {
    fn provision(
        &self,
        ctx: &ExecutionContext,
        request: &ProvisionRequest<'_>,
    ) -> Result<Vec<MachineHandle>, ProvisionError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ProvisionError::new("in-memory platform mutex poisoned"))?;
        state.provisions.push(ProvisionRecord {
            test: request.test.to_string(),
            count: request.count,
            flags: request.flags.clone(),
            config_len: request.config.as_bytes().len(),
            platform: ctx.platform.to_string(),
        });
        if let Some((message, partial)) = state.provision_failure.clone() {
            let created: Vec<MachineHandle> =
                (0 .. partial.min(request.count)).map(|_| state.spawn(&self.state)).collect();
            return Err(ProvisionError::new(message).with_partial(created));
        }
        Ok((0 .. request.count).map(|_| state.spawn(&self.state)).collect())
    }

    fn destroy(&self, machines: &[MachineHandle]) -> Result<(), DestroyError> {
        let mut state =
            self.state.lock().map_err(|_| DestroyError("in-memory platform mutex poisoned".into()))?;
        state.destroy_calls += 1;
        if let Some(message) = state.destroy_failure.clone() {
            return Err(DestroyError(message));
        }
        for machine in machines {
            state.live.remove(machine.id());
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Machines
// ============================================================================

/// Machine created by [`InMemoryPlatform`].
#[derive(Debug)]
pub struct InMemoryMachine {
    /// Machine identifier.
    id: String,
    /// Private address.
    private_ip: String,
    /// Public address.
    public_ip: String,
    /// Shared platform state.
    state: Arc<Mutex<PlatformState>>,
}

impl Machine for InMemoryMachine {
    fn id(&self) -> &str {
        &self.id
    }

    fn private_ip(&self) -> &str {
        &self.private_ip
    }

    fn public_ip(&self) -> &str {
        &self.public_ip
    }

    fn exec(&self, command: &str) -> Result<CommandOutput, TransportError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TransportError::Io("in-memory platform mutex poisoned".to_string()))?;
        if !state.live.contains(&self.id) {
            return Err(TransportError::Unavailable {
                machine: self.id.clone(),
                message: "machine destroyed".to_string(),
            });
        }
        state.commands.push(CommandRecord {
            machine: self.id.clone(),
            command: command.to_string(),
        });
        state.reply(command)
    }

    fn reboot(&self) -> Result<(), TransportError> {
        self.exec("reboot").map(|_| ())
    }
}
