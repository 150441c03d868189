// system-tests/src/bin/vmharness_sample_suite.rs
// ============================================================================
// Module: Sample Suite Launcher
// Description: Host-side launcher for the sample suite on the local platform.
// Purpose: Exercise the CLI end to end in system tests.
// Dependencies: system-tests, vmharness-cli, tokio
// ============================================================================

//! Launcher binary running the sample suite on host-process machines.

use std::process::ExitCode;
use std::sync::Arc;

use system_tests::config::SystemTestConfig;
use system_tests::local::LocalPlatform;
use system_tests::suite::sample_registry;
use vmharness_cli::main_with;
use vmharness_cli::output::emit_error;
use vmharness_core::ExecutionContext;
use vmharness_core::PlatformDriver;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let registry = match sample_registry() {
        Ok(registry) => registry,
        Err(err) => return emit_error(&format!("vmharness-sample-suite: {err}")),
    };
    let root = match SystemTestConfig::load() {
        Ok(config) => config.run_root.unwrap_or_else(std::env::temp_dir),
        Err(err) => return emit_error(&format!("vmharness-sample-suite: {err}")),
    };
    let factory = move |_ctx: &ExecutionContext| -> Result<Arc<dyn PlatformDriver>, String> {
        std::fs::create_dir_all(&root).map_err(|err| format!("{}: {err}", root.display()))?;
        Ok(Arc::new(LocalPlatform::new(root.clone())))
    };
    main_with(registry, &factory).await
}
