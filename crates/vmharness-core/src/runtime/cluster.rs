// crates/vmharness-core/src/runtime/cluster.rs
// ============================================================================
// Module: VM Harness Clusters
// Description: Machine ownership, command primitives, and sub-test frames.
// Purpose: Give test bodies a scoped handle over their provisioned machines.
// Dependencies: crate::{core, interfaces, runtime}, thiserror
// ============================================================================

//! ## Overview
//! A [`Cluster`] owns every machine provisioned for one top-level test. Each
//! provisioning batch is destroyed exactly once, in reverse order, either
//! when the test finishes or when the cluster is dropped.
//!
//! Test bodies receive a [`TestCluster`], which pairs the cluster with the
//! result frame currently being built. [`TestCluster::run`] pushes a child
//! frame, runs the sub-test synchronously, and appends the finished node to
//! the parent. A failing child marks the parent failed but does not stop
//! later siblings; a body that returns [`TestAbort::Fatal`] stops only
//! itself. To abort the remaining siblings on a fatal child, call the child
//! through [`TestCluster::must_run`] and propagate its error with `?`.
//!
//! Platform driver calls are panic-contained: a panic during provisioning
//! becomes a [`ProvisionError`] and a panic during destroy becomes a
//! teardown warning.
//!
//! Deadlines are cooperative: once a test's deadline passes, every primitive
//! fails with [`ExecError::TimedOut`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;

use crate::core::ExecutionContext;
use crate::core::NativeFuncName;
use crate::core::Outcome;
use crate::core::PlatformName;
use crate::core::ResultNode;
use crate::core::TestDescriptor;
use crate::core::TestFlag;
use crate::core::TestName;
use crate::interfaces::CommandOutput;
use crate::interfaces::DestroyError;
use crate::interfaces::GuestConfig;
use crate::interfaces::MachineHandle;
use crate::interfaces::PlatformDriver;
use crate::interfaces::ProvisionError;
use crate::interfaces::ProvisionRequest;
use crate::interfaces::TransportError;
use crate::runtime::events::RunEvent;
use crate::runtime::events::RunEventKind;
use crate::runtime::events::RunEventSink;
use crate::runtime::native::AgentSettings;
use crate::runtime::native::NativeInvocation;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Early exit from a test body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestAbort {
    /// Unrecoverable failure; the current node fails and its body stops.
    #[error("fatal: {0}")]
    Fatal(String),
    /// Deliberate bypass; the current node is skipped unless it already failed.
    #[error("skipped: {0}")]
    Skip(String),
}

/// Result type returned by test bodies.
pub type TestResult<T = ()> = Result<T, TestAbort>;

/// Command and native invocation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// Command exited with a non-zero status.
    #[error("command `{command}` on {machine} exited with status {exit_code}: {stderr}")]
    NonZeroExit {
        /// Machine identifier.
        machine: String,
        /// Command line.
        command: String,
        /// Exit status.
        exit_code: i32,
        /// Trimmed stdout.
        stdout: String,
        /// Trimmed stderr.
        stderr: String,
    },
    /// Command could not be delivered.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The test deadline has passed.
    #[error("test deadline of {seconds}s exceeded")]
    TimedOut {
        /// Configured timeout in seconds.
        seconds: u64,
    },
    /// Native function is not declared by the test.
    #[error("native function {function} is not declared by {test}")]
    UnknownNative {
        /// Test name.
        test: String,
        /// Requested function name.
        function: String,
    },
}

impl From<ExecError> for TestAbort {
    fn from(err: ExecError) -> Self {
        Self::Fatal(err.to_string())
    }
}

impl From<ProvisionError> for TestAbort {
    fn from(err: ProvisionError) -> Self {
        Self::Fatal(err.to_string())
    }
}

// ============================================================================
// SECTION: Cluster
// ============================================================================

/// Machines owned by one top-level test.
pub struct Cluster {
    /// Platform driver creating and destroying machines.
    driver: Arc<dyn PlatformDriver>,
    /// Run context.
    ctx: Arc<ExecutionContext>,
    /// Owning test name.
    test: TestName,
    /// Provisioning flags declared by the test.
    flags: BTreeSet<TestFlag>,
    /// Live provisioning batches in creation order.
    batches: Vec<Vec<MachineHandle>>,
    /// Machines provisioned over the cluster's life.
    provisioned: usize,
    /// Teardown warnings collected so far.
    warnings: Vec<String>,
    /// Event sink.
    events: Arc<dyn RunEventSink>,
}

impl Cluster {
    /// Creates an empty cluster for a test.
    #[must_use]
    pub fn new(
        driver: Arc<dyn PlatformDriver>,
        ctx: Arc<ExecutionContext>,
        test: &TestDescriptor,
        events: Arc<dyn RunEventSink>,
    ) -> Self {
        Self {
            driver,
            ctx,
            test: test.name().clone(),
            flags: test.flags().clone(),
            batches: Vec::new(),
            provisioned: 0,
            warnings: Vec::new(),
            events,
        }
    }

    /// Provisions `count` machines as one batch owned by this cluster.
    ///
    /// A zero count makes no driver call. On failure, the partial set is
    /// destroyed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the driver fails or returns the wrong
    /// number of machines.
    pub fn provision(
        &mut self,
        count: usize,
        config: &GuestConfig,
    ) -> Result<Vec<MachineHandle>, ProvisionError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let request = ProvisionRequest {
            test: &self.test,
            config,
            count,
            flags: &self.flags,
        };
        let result = catch_unwind(AssertUnwindSafe(|| self.driver.provision(&self.ctx, &request)))
            .unwrap_or_else(|payload| {
                Err(ProvisionError::new(format!(
                    "platform driver panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
            .and_then(|machines| {
                if machines.len() == count {
                    Ok(machines)
                } else {
                    let message =
                        format!("driver returned {} machines, expected {count}", machines.len());
                    Err(ProvisionError::new(message).with_partial(machines))
                }
            });
        match result {
            Ok(machines) => {
                self.provisioned += machines.len();
                self.batches.push(machines.clone());
                self.events.record(
                    &RunEvent::for_test(RunEventKind::ClusterProvisioned, &self.test)
                        .with_machines(machines.len()),
                );
                Ok(machines)
            }
            Err(mut err) => {
                let partial = std::mem::take(&mut err.partial);
                self.provisioned += partial.len();
                self.events.record(
                    &RunEvent::for_test(RunEventKind::ProvisionFailed, &self.test)
                        .with_machines(partial.len())
                        .with_detail(err.message.clone()),
                );
                self.destroy_batch(&partial);
                Err(err)
            }
        }
    }

    /// Returns every live machine in provisioning order.
    #[must_use]
    pub fn machines(&self) -> Vec<MachineHandle> {
        self.batches.iter().flatten().cloned().collect()
    }

    /// Destroys every live batch in reverse creation order.
    pub fn release(&mut self) {
        while let Some(batch) = self.batches.pop() {
            self.destroy_batch(&batch);
        }
    }

    /// Releases remaining machines and returns the teardown warnings.
    pub fn teardown(&mut self) -> Vec<String> {
        self.release();
        std::mem::take(&mut self.warnings)
    }

    /// Returns the number of machines provisioned so far.
    #[must_use]
    pub const fn provisioned(&self) -> usize {
        self.provisioned
    }

    /// Returns the run context.
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Destroys one batch, recording failures and driver panics as warnings.
    fn destroy_batch(&mut self, batch: &[MachineHandle]) {
        let result = catch_unwind(AssertUnwindSafe(|| self.driver.destroy(batch)))
            .unwrap_or_else(|payload| {
                Err(DestroyError(format!(
                    "platform driver panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
        if let Err(err) = result {
            let warning = err.to_string();
            self.events.record(
                &RunEvent::for_test(RunEventKind::TeardownFailed, &self.test)
                    .with_machines(batch.len())
                    .with_detail(warning.clone()),
            );
            self.warnings.push(warning);
        }
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        self.release();
    }
}

// ============================================================================
// SECTION: Result Frames
// ============================================================================

/// Result node under construction.
struct NodeFrame {
    /// Node name.
    name: String,
    /// Recorded errors.
    errors: Vec<String>,
    /// Recorded log lines.
    logs: Vec<String>,
    /// Finished children.
    children: Vec<ResultNode>,
    /// Start time.
    started: Instant,
}

impl NodeFrame {
    /// Opens a frame.
    fn open(name: &str) -> Self {
        Self {
            name: name.to_string(),
            errors: Vec::new(),
            logs: Vec::new(),
            children: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Returns true when the frame already has a failure recorded.
    fn failed(&self) -> bool {
        !self.errors.is_empty() || self.children.iter().any(|c| c.outcome == Outcome::Fail)
    }

    /// Closes the frame with the body's result.
    fn close(mut self, result: Result<TestResult, Box<dyn Any + Send>>) -> ResultNode {
        let mut skip_reason = None;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(TestAbort::Fatal(message))) => self.errors.push(message),
            Ok(Err(TestAbort::Skip(reason))) => skip_reason = Some(reason),
            Err(payload) => self.errors.push(format!("panic: {}", panic_message(payload.as_ref()))),
        }
        let outcome = if self.failed() {
            Outcome::Fail
        } else if skip_reason.is_some() {
            Outcome::Skip
        } else {
            Outcome::Pass
        };
        ResultNode {
            name: self.name,
            outcome,
            errors: self.errors,
            skip_reason: skip_reason.filter(|_| outcome == Outcome::Skip),
            logs: self.logs,
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            children: self.children,
        }
    }
}

/// Extracts a readable message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Cooperative deadline for a test.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    /// Instant after which primitives fail.
    at: Instant,
    /// Configured limit.
    limit: Duration,
}

// ============================================================================
// SECTION: Test Cluster
// ============================================================================

/// Handle passed to test bodies.
pub struct TestCluster<'c> {
    /// Owning cluster.
    cluster: &'c mut Cluster,
    /// Descriptor of the running test.
    descriptor: &'c TestDescriptor,
    /// Guest agent settings.
    agent: &'c AgentSettings,
    /// Frame currently being built.
    node: NodeFrame,
    /// Sub-test path below the root; empty at the root.
    path: String,
    /// Optional cooperative deadline.
    deadline: Option<Deadline>,
}

/// Runs a test body against `cluster` and returns its finished result tree.
///
/// Panics raised by the body are caught and recorded as failures.
pub fn execute_body(
    cluster: &mut Cluster,
    descriptor: &TestDescriptor,
    agent: &AgentSettings,
    timeout: Option<Duration>,
) -> ResultNode {
    let deadline = timeout.and_then(|limit| {
        Instant::now().checked_add(limit).map(|at| Deadline {
            at,
            limit,
        })
    });
    let body = Arc::clone(descriptor.body());
    let mut handle = TestCluster {
        cluster,
        descriptor,
        agent,
        node: NodeFrame::open(descriptor.name().as_str()),
        path: String::new(),
        deadline,
    };
    let result = catch_unwind(AssertUnwindSafe(|| body(&mut handle)));
    handle.node.close(result)
}

impl TestCluster<'_> {
    // ------------------------------------------------------------------------
    // Sub-tests
    // ------------------------------------------------------------------------

    /// Runs a named sub-test and returns true when it did not fail.
    ///
    /// The child's failure marks this node failed; later siblings still run.
    /// Once the deadline has passed the child is recorded as failed without
    /// being started.
    pub fn run(&mut self, name: &str, body: impl FnOnce(&mut TestCluster<'_>) -> TestResult) -> bool {
        let child_path =
            if self.path.is_empty() { name.to_string() } else { format!("{}/{name}", self.path) };
        let parent_node = std::mem::replace(&mut self.node, NodeFrame::open(name));
        let parent_path = std::mem::replace(&mut self.path, child_path);
        let result = match self.check_deadline() {
            Ok(()) => {
                let this = &mut *self;
                catch_unwind(AssertUnwindSafe(move || body(this)))
            }
            Err(err) => Ok(Err(TestAbort::from(err))),
        };
        let child = std::mem::replace(&mut self.node, parent_node).close(result);
        let child_path = std::mem::replace(&mut self.path, parent_path);
        let passed = child.outcome != Outcome::Fail;
        self.cluster.events.record(
            &RunEvent::for_test(RunEventKind::SubtestFinished, &self.cluster.test)
                .with_path(child_path)
                .with_outcome(child.outcome),
        );
        self.node.children.push(child);
        passed
    }

    /// Runs a required sub-test; a failure aborts the calling body via `?`.
    ///
    /// # Errors
    ///
    /// Returns [`TestAbort::Fatal`] when the sub-test failed.
    pub fn must_run(
        &mut self,
        name: &str,
        body: impl FnOnce(&mut TestCluster<'_>) -> TestResult,
    ) -> TestResult {
        if self.run(name, body) {
            Ok(())
        } else {
            Err(TestAbort::Fatal(format!("required sub-test {name} failed")))
        }
    }

    // ------------------------------------------------------------------------
    // Outcome control
    // ------------------------------------------------------------------------

    /// Records a log line on the current node.
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        let mut event =
            RunEvent::for_test(RunEventKind::TestLog, &self.cluster.test).with_detail(line.clone());
        if !self.path.is_empty() {
            event = event.with_path(self.path.clone());
        }
        self.cluster.events.record(&event);
        self.node.logs.push(line);
    }

    /// Marks the current node failed without stopping the body.
    pub fn error(&mut self, message: impl Into<String>) {
        self.node.errors.push(message.into());
    }

    /// Builds a fatal abort; return it from the body to stop it.
    #[must_use]
    pub fn fatal(&self, message: impl Into<String>) -> TestAbort {
        TestAbort::Fatal(message.into())
    }

    /// Builds a skip abort; return it from the body to skip the current node.
    #[must_use]
    pub fn skip(&self, reason: impl Into<String>) -> TestAbort {
        TestAbort::Skip(reason.into())
    }

    /// Returns true when the current node has a failure recorded.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.node.failed()
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Runs a command on a machine and returns its captured output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] on transport failure or after the deadline. A
    /// non-zero exit status is reported in the output, not as an error.
    pub fn exec(&self, machine: &MachineHandle, command: &str) -> Result<CommandOutput, ExecError> {
        self.check_deadline()?;
        Ok(machine.exec(command)?)
    }

    /// Runs a command that must succeed and returns its trimmed stdout.
    ///
    /// # Errors
    ///
    /// Returns [`TestAbort::Fatal`] on transport failure, timeout, or a
    /// non-zero exit status.
    pub fn must_exec(&self, machine: &MachineHandle, command: &str) -> TestResult<String> {
        let output = self.exec(machine, command)?;
        check_exit(machine, command, &output)?;
        Ok(output.stdout_text())
    }

    /// Reboots a machine and waits for it to accept commands.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the machine cannot reboot or after the
    /// deadline.
    pub fn reboot(&self, machine: &MachineHandle) -> Result<(), ExecError> {
        self.check_deadline()?;
        Ok(machine.reboot()?)
    }

    // ------------------------------------------------------------------------
    // Machines
    // ------------------------------------------------------------------------

    /// Provisions one additional machine owned by this cluster.
    ///
    /// # Errors
    ///
    /// Returns [`TestAbort::Fatal`] when provisioning fails or after the
    /// deadline.
    pub fn new_machine(&mut self, config: &GuestConfig) -> TestResult<MachineHandle> {
        let mut machines = self.new_machines(1, config)?;
        machines.pop().ok_or_else(|| TestAbort::Fatal("driver returned no machine".to_string()))
    }

    /// Provisions `count` additional machines as one batch.
    ///
    /// # Errors
    ///
    /// Returns [`TestAbort::Fatal`] when provisioning fails or after the
    /// deadline.
    pub fn new_machines(
        &mut self,
        count: usize,
        config: &GuestConfig,
    ) -> TestResult<Vec<MachineHandle>> {
        self.check_deadline()?;
        Ok(self.cluster.provision(count, config)?)
    }

    /// Destroys every machine held by the cluster before the test ends.
    pub fn release(&mut self) {
        self.cluster.release();
    }

    // ------------------------------------------------------------------------
    // Native functions
    // ------------------------------------------------------------------------

    /// Runs a native function on a machine and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the function is not declared, the command
    /// cannot be delivered, the deadline passed, or the function exits
    /// non-zero.
    pub fn run_native(
        &mut self,
        machine: &MachineHandle,
        function: &str,
        args: &[&str],
    ) -> Result<CommandOutput, ExecError> {
        let invocation = self.native_invocation(function, args)?;
        let command = invocation.command_line(self.agent);
        self.invoke_native(machine, &command, false)
    }

    /// Starts a native function detached from the command session.
    ///
    /// With no detach wrapper configured the function runs synchronously and
    /// a log line recording the fallback is added to the current node.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the function is not declared, the command
    /// cannot be delivered, the deadline passed, or the launcher exits
    /// non-zero.
    pub fn start_native(
        &mut self,
        machine: &MachineHandle,
        function: &str,
        args: &[&str],
    ) -> Result<(), ExecError> {
        let invocation = self.native_invocation(function, args)?;
        let detached = self.agent.can_detach();
        if !detached {
            self.log(format!("no detach wrapper configured; {function} runs synchronously"));
        }
        let command = invocation.detached_command_line(self.agent);
        self.invoke_native(machine, &command, detached).map(|_| ())
    }

    /// Validates a native function name against the descriptor.
    fn native_invocation(&self, function: &str, args: &[&str]) -> Result<NativeInvocation, ExecError> {
        self.check_deadline()?;
        let unknown = || ExecError::UnknownNative {
            test: self.descriptor.name().to_string(),
            function: function.to_string(),
        };
        if self.descriptor.native_func(function).is_none() {
            return Err(unknown());
        }
        let name = NativeFuncName::parse(function).map_err(|_| unknown())?;
        Ok(NativeInvocation::new(
            self.descriptor.name().clone(),
            name,
            args.iter().map(|arg| (*arg).to_string()).collect(),
        ))
    }

    /// Sends a native invocation command and checks its exit status.
    fn invoke_native(
        &mut self,
        machine: &MachineHandle,
        command: &str,
        detached: bool,
    ) -> Result<CommandOutput, ExecError> {
        let mode = if detached { "detached" } else { "sync" };
        self.cluster.events.record(
            &RunEvent::for_test(RunEventKind::NativeInvoked, &self.cluster.test)
                .with_detail(format!("{mode} {} {command}", machine.id())),
        );
        let output = machine.exec(command)?;
        check_exit(machine, command, &output)?;
        Ok(output)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Returns every live machine in provisioning order.
    #[must_use]
    pub fn machines(&self) -> Vec<MachineHandle> {
        self.cluster.machines()
    }

    /// Returns the run's platform name.
    #[must_use]
    pub fn platform(&self) -> &PlatformName {
        &self.cluster.ctx.platform
    }

    /// Returns the run context.
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        self.cluster.context()
    }

    /// Returns the running test's name.
    #[must_use]
    pub fn test_name(&self) -> &TestName {
        self.descriptor.name()
    }

    /// Returns the running test's provisioning flags.
    #[must_use]
    pub fn flags(&self) -> &BTreeSet<TestFlag> {
        self.descriptor.flags()
    }

    /// Returns the current sub-test path; empty at the root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fails when the test deadline has passed.
    fn check_deadline(&self) -> Result<(), ExecError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline.at => Err(ExecError::TimedOut {
                seconds: deadline.limit.as_secs(),
            }),
            _ => Ok(()),
        }
    }
}

/// Converts a non-zero exit status into [`ExecError::NonZeroExit`].
fn check_exit(
    machine: &MachineHandle,
    command: &str,
    output: &CommandOutput,
) -> Result<(), ExecError> {
    if output.succeeded() {
        return Ok(());
    }
    Err(ExecError::NonZeroExit {
        machine: machine.id().to_string(),
        command: command.to_string(),
        exit_code: output.exit_code,
        stdout: output.stdout_text(),
        stderr: output.stderr_text(),
    })
}
