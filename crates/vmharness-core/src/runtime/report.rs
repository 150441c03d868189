// crates/vmharness-core/src/runtime/report.rs
// ============================================================================
// Module: VM Harness Result Aggregator
// Description: Thread-safe collection of per-test records.
// Purpose: Gather records from parallel workers into a deterministic report.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Workers push finished [`TestRecord`]s in completion order. Finishing the
//! aggregator sorts them by test name and tallies the summary, so the report
//! does not depend on scheduling.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::ExecutionContext;
use crate::core::Outcome;
use crate::core::ResultNode;
use crate::core::RunReport;
use crate::core::TestName;
use crate::core::TestRecord;

// ============================================================================
// SECTION: Aggregator
// ============================================================================

/// Collects records from concurrent workers.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    /// Records in completion order.
    records: Mutex<Vec<TestRecord>>,
}

impl ResultAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a finished record.
    pub fn push(&self, record: TestRecord) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }

    /// Consumes the aggregator and builds the sorted report.
    #[must_use]
    pub fn finish(self, context: ExecutionContext) -> RunReport {
        let records = self.records.into_inner().unwrap_or_else(PoisonError::into_inner);
        RunReport::new(context, records)
    }
}

// ============================================================================
// SECTION: Record Builders
// ============================================================================

/// Builds the record for a test whose body ran.
#[must_use]
pub fn executed_record(
    name: TestName,
    root: ResultNode,
    teardown_warnings: Vec<String>,
    machines_provisioned: usize,
) -> TestRecord {
    TestRecord {
        name,
        outcome: root.outcome,
        reason: root.skip_reason.clone(),
        root: Some(root),
        teardown_warnings,
        machines_provisioned,
        cancelled: false,
    }
}

/// Builds the record for a test whose up-front provisioning failed.
#[must_use]
pub fn provision_failed_record(
    name: TestName,
    error: String,
    teardown_warnings: Vec<String>,
    machines_provisioned: usize,
) -> TestRecord {
    TestRecord {
        name,
        outcome: Outcome::Fail,
        reason: Some(error),
        root: None,
        teardown_warnings,
        machines_provisioned,
        cancelled: false,
    }
}

/// Reason recorded for tests never dispatched because of cancellation.
pub const CANCELLED_REASON: &str = "run cancelled";

/// Builds the record for a test never dispatched because of cancellation.
#[must_use]
pub fn cancelled_record(name: TestName) -> TestRecord {
    let mut record = TestRecord::not_executed(name, Outcome::Skip, CANCELLED_REASON);
    record.cancelled = true;
    record
}
