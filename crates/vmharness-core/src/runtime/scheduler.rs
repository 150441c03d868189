// crates/vmharness-core/src/runtime/scheduler.rs
// ============================================================================
// Module: VM Harness Scheduler
// Description: Filters, provisions, executes, and tears down registered tests.
// Purpose: Drive a full harness run with a bounded worker pool.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! A run proceeds in two phases. Planning applies the name selection and the
//! applicability filter to every registered test; skipped and excluded tests
//! are recorded immediately and never reach the platform driver. Execution
//! hands the remaining tests to `parallelism` scoped worker threads, each of
//! which owns one test at a time: provision, run the body, tear down.
//!
//! Cancellation stops dispatch of new tests. Tests already executing run to
//! completion and are always torn down; undispatched tests are recorded as
//! cancelled skips.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use crate::core::ExecutionContext;
use crate::core::Outcome;
use crate::core::RunReport;
use crate::core::TestDescriptor;
use crate::core::TestRecord;
use crate::interfaces::PlatformDriver;
use crate::runtime::cluster::Cluster;
use crate::runtime::cluster::execute_body;
use crate::runtime::events::NoopEventSink;
use crate::runtime::events::RunEvent;
use crate::runtime::events::RunEventKind;
use crate::runtime::events::RunEventSink;
use crate::runtime::filter::Decision;
use crate::runtime::filter::ExcludeReason;
use crate::runtime::filter::decide;
use crate::runtime::native::AgentSettings;
use crate::runtime::registry::TestRegistry;
use crate::runtime::report::ResultAggregator;
use crate::runtime::report::cancelled_record;
use crate::runtime::report::executed_record;
use crate::runtime::report::provision_failed_record;
use crate::runtime::selection::TestSelection;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default per-test timeout.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of tests executing concurrently.
    pub parallelism: NonZeroUsize,
    /// Timeout applied to tests that do not declare one; `None` disables it.
    pub default_timeout: Option<Duration>,
    /// Name selection patterns.
    pub selection: TestSelection,
    /// Guest agent settings for native invocations.
    pub agent: AgentSettings,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallelism: NonZeroUsize::MIN,
            default_timeout: Some(DEFAULT_TEST_TIMEOUT),
            selection: TestSelection::all(),
            agent: AgentSettings::default(),
        }
    }
}

/// Shared run-level cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Planning
// ============================================================================

/// Filter decision for one registered test.
#[derive(Debug, Clone)]
pub struct PlannedTest<'r> {
    /// Registered descriptor.
    pub descriptor: &'r TestDescriptor,
    /// Selection and filter decision.
    pub decision: Decision,
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Top-level harness driver.
pub struct Scheduler {
    /// Run context shared with every cluster.
    ctx: Arc<ExecutionContext>,
    /// Platform driver shared by every worker.
    driver: Arc<dyn PlatformDriver>,
    /// Scheduler settings.
    config: SchedulerConfig,
    /// Event sink.
    events: Arc<dyn RunEventSink>,
    /// Run-level cancellation.
    cancel: CancellationFlag,
}

impl Scheduler {
    /// Creates a scheduler with no event output.
    #[must_use]
    pub fn new(
        ctx: ExecutionContext,
        driver: Arc<dyn PlatformDriver>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(ctx),
            driver,
            config,
            events: Arc::new(NoopEventSink),
            cancel: CancellationFlag::new(),
        }
    }

    /// Routes run events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn RunEventSink>) -> Self {
        self.events = events;
        self
    }

    /// Uses an externally owned cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the cancellation flag observed by this scheduler.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Returns the run context.
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Applies selection and filtering to every registered test.
    #[must_use]
    pub fn plan<'r>(&self, registry: &'r TestRegistry) -> Vec<PlannedTest<'r>> {
        registry
            .iter()
            .map(|descriptor| {
                let decision = if self.config.selection.matches(descriptor.name().as_str()) {
                    decide(descriptor, &self.ctx)
                } else {
                    Decision::Exclude(ExcludeReason::NotSelected)
                };
                PlannedTest {
                    descriptor,
                    decision,
                }
            })
            .collect()
    }

    /// Runs every applicable test and returns the sorted report.
    #[must_use]
    pub fn run(&self, registry: &TestRegistry) -> RunReport {
        let aggregator = ResultAggregator::new();
        let mut runnable = Vec::new();
        for planned in self.plan(registry) {
            let name = planned.descriptor.name();
            let (outcome, reason) = match planned.decision {
                Decision::Run => {
                    runnable.push(planned.descriptor);
                    continue;
                }
                Decision::Skip(reason) => (Outcome::Skip, reason),
                Decision::Exclude(reason) => (Outcome::Exclude, reason.to_string()),
            };
            self.events.record(
                &RunEvent::for_test(RunEventKind::TestFiltered, name)
                    .with_outcome(outcome)
                    .with_detail(reason.clone()),
            );
            aggregator.push(TestRecord::not_executed(name.clone(), outcome, reason));
        }

        let next = AtomicUsize::new(0);
        let workers = self.config.parallelism.get().min(runnable.len());
        thread::scope(|scope| {
            for _ in 0 .. workers {
                scope.spawn(|| {
                    while !self.cancel.is_cancelled() {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(descriptor) = runnable.get(index) else {
                            break;
                        };
                        aggregator.push(self.execute_test(descriptor));
                    }
                });
            }
        });

        let dispatched = next.load(Ordering::SeqCst).min(runnable.len());
        let undispatched = &runnable[dispatched ..];
        if !undispatched.is_empty() {
            self.events.record(
                &RunEvent::new(RunEventKind::RunCancelled)
                    .with_detail(format!("{} tests not dispatched", undispatched.len())),
            );
            for descriptor in undispatched {
                aggregator.push(cancelled_record(descriptor.name().clone()));
            }
        }
        aggregator.finish(self.ctx.as_ref().clone())
    }

    /// Provisions, executes, and tears down one applicable test.
    #[must_use]
    pub fn execute_test(&self, descriptor: &TestDescriptor) -> TestRecord {
        let name = descriptor.name();
        self.events.record(
            &RunEvent::for_test(RunEventKind::TestStarted, name)
                .with_machines(descriptor.cluster_size()),
        );
        let mut cluster = Cluster::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.ctx),
            descriptor,
            Arc::clone(&self.events),
        );
        let record =
            match cluster.provision(descriptor.cluster_size(), descriptor.guest_config()) {
                Ok(_) => {
                    let timeout = descriptor.timeout().or(self.config.default_timeout);
                    let root = execute_body(&mut cluster, descriptor, &self.config.agent, timeout);
                    let warnings = cluster.teardown();
                    executed_record(name.clone(), root, warnings, cluster.provisioned())
                }
                Err(err) => {
                    let warnings = cluster.teardown();
                    provision_failed_record(
                        name.clone(),
                        err.to_string(),
                        warnings,
                        cluster.provisioned(),
                    )
                }
            };
        let mut event =
            RunEvent::for_test(RunEventKind::TestFinished, name).with_outcome(record.outcome);
        if let Some(reason) = &record.reason {
            event = event.with_detail(reason.clone());
        }
        self.events.record(&event);
        record
    }
}
