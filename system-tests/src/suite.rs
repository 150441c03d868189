// system-tests/src/suite.rs
// ============================================================================
// Module: Sample Suite
// Description: A small test catalog exercising every engine primitive.
// Purpose: Shared by the sample agent, the sample launcher, and scenarios.
// Dependencies: vmharness-core
// ============================================================================

//! ## Overview
//! The catalog mirrors the shape of a distribution suite: a basic boot check,
//! native functions dispatched through the agent, a platform-specific skip,
//! a version-gated test, and a body that grows its own cluster.
//!
//! The same registry is compiled into the sample agent so native function
//! names line up on both sides of the command channel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::time::Duration;

use vmharness_core::ExecError;
use vmharness_core::GuestConfig;
use vmharness_core::MachineHandle;
use vmharness_core::NativeFuncError;
use vmharness_core::OsVersion;
use vmharness_core::RegistryError;
use vmharness_core::TestCluster;
use vmharness_core::TestDescriptor;
use vmharness_core::TestFlag;
use vmharness_core::TestRegistry;
use vmharness_core::TestResult;
use vmharness_core::native_fn;
use vmharness_core::retry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content written by the `WriteMarker` native function.
pub const MARKER_CONTENT: &str = "written";
/// Guest config used by the cluster expansion test.
pub const WORKER_CONFIG: &str = "role=worker";
/// First release where the esx boot regression is fixed.
const ESX_FIXED_MAJOR: u64 = 3034;
/// Polls made while waiting for a detached native function.
const DETACHED_POLLS: u32 = 50;
/// Delay between detached polls.
const DETACHED_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Builds the sample registry.
///
/// # Errors
///
/// Returns [`RegistryError`] if a descriptor is invalid.
pub fn sample_registry() -> Result<TestRegistry, RegistryError> {
    let mut registry = TestRegistry::new();
    registry.register(
        TestDescriptor::builder("cl.basic", basic).cluster_size(1).flag(TestFlag::NoEnableSelinux),
    )?;
    registry.register(
        TestDescriptor::builder("cl.native.marker", native_marker)
            .cluster_size(1)
            .native("WriteMarker", write_marker),
    )?;
    registry.register(
        TestDescriptor::builder("cl.native.failure", native_failure)
            .cluster_size(1)
            .native("Refuse", native_fn(refuse)),
    )?;
    registry.register(
        TestDescriptor::builder("cl.native.detached", native_detached)
            .cluster_size(1)
            .native("WriteMarker", write_marker),
    )?;
    registry.register(
        TestDescriptor::builder("cl.esx.boot", basic).cluster_size(1).skip_when(|input| {
            input.platform == "esx" && input.version.major < ESX_FIXED_MAJOR
        }),
    )?;
    registry.register(
        TestDescriptor::builder("cl.future", basic)
            .cluster_size(1)
            .min_version(OsVersion::new(9999, 0, 0)),
    )?;
    registry.register(TestDescriptor::builder("cl.cluster.expand", expand))?;
    Ok(registry)
}

// ============================================================================
// SECTION: Test Bodies
// ============================================================================

/// Checks the machine answers commands.
fn basic(c: &mut TestCluster<'_>) -> TestResult {
    let machine = first_machine(c)?;
    c.run("uname", |c| {
        let kernel = c.must_exec(&machine, "uname -s")?;
        if kernel.is_empty() {
            return Err(c.fatal("uname printed nothing"));
        }
        Ok(())
    });
    c.run("guest-config", |c| {
        c.must_exec(&machine, "test -f guest-config")?;
        Ok(())
    });
    Ok(())
}

/// Runs a native function that leaves a file behind, then reads it back.
fn native_marker(c: &mut TestCluster<'_>) -> TestResult {
    let machine = first_machine(c)?;
    c.run_native(&machine, "WriteMarker", &["marker.txt"])?;
    let content = c.must_exec(&machine, "cat marker.txt")?;
    if content != MARKER_CONTENT {
        return Err(c.fatal(format!("marker holds '{content}'")));
    }
    Ok(())
}

/// Starts a native function detached and waits for its file to appear.
fn native_detached(c: &mut TestCluster<'_>) -> TestResult {
    let machine = first_machine(c)?;
    c.start_native(&machine, "WriteMarker", &["detached.txt"])?;
    retry(DETACHED_POLLS, DETACHED_POLL_INTERVAL, || {
        c.must_exec(&machine, "test -f detached.txt").map(|_| ())
    })?;
    let content = c.must_exec(&machine, "cat detached.txt")?;
    if content != MARKER_CONTENT {
        return Err(c.fatal(format!("detached marker holds '{content}'")));
    }
    Ok(())
}

/// Expects the agent to report a failing native function with status 1.
fn native_failure(c: &mut TestCluster<'_>) -> TestResult {
    let machine = first_machine(c)?;
    match c.run_native(&machine, "Refuse", &[]) {
        Err(ExecError::NonZeroExit {
            exit_code: 1,
            ..
        }) => Ok(()),
        Err(err) => Err(c.fatal(format!("unexpected error: {err}"))),
        Ok(_) => Err(c.fatal("native function unexpectedly succeeded")),
    }
}

/// Adds two machines at runtime and checks they received their config.
fn expand(c: &mut TestCluster<'_>) -> TestResult {
    let workers = c.new_machines(2, &GuestConfig::new(WORKER_CONFIG))?;
    for worker in &workers {
        let name = format!("config-{}", worker.id());
        c.run(&name, |c| {
            c.must_exec(worker, "test -s guest-config")?;
            Ok(())
        });
    }
    if c.machines().len() != 2 {
        return Err(c.fatal("cluster does not own the new machines"));
    }
    Ok(())
}

/// Returns the first pre-provisioned machine.
fn first_machine(c: &TestCluster<'_>) -> TestResult<MachineHandle> {
    c.machines().into_iter().next().ok_or_else(|| c.fatal("no machine provisioned"))
}

// ============================================================================
// SECTION: Native Functions
// ============================================================================

/// Writes [`MARKER_CONTENT`] to the file named by the first argument.
fn write_marker(args: &[String]) -> Result<(), NativeFuncError> {
    let [path] = args else {
        return Err(NativeFuncError::InvalidArguments("expected one file name".to_string()));
    };
    fs::write(path, MARKER_CONTENT).map_err(|err| NativeFuncError::failed(err.to_string()))
}

/// Always fails.
fn refuse() -> Result<(), NativeFuncError> {
    Err(NativeFuncError::failed("refused"))
}
