// crates/vmharness-core/src/core/result.rs
// ============================================================================
// Module: VM Harness Results
// Description: Result trees, per-test records, and the final run report.
// Purpose: Provide deterministic, serializable outcomes for reporting.
// Dependencies: crate::core, serde, serde_jcs
// ============================================================================

//! ## Overview
//! Each executed test produces a [`ResultNode`] tree that mirrors its nested
//! sub-test calls. Records for every registered test (including skipped and
//! excluded ones) are gathered into a [`RunReport`], sorted by test name so the
//! output is independent of worker completion order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::context::ExecutionContext;
use crate::core::identifiers::TestName;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Terminal outcome of a test or sub-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Executed and passed.
    Pass,
    /// Executed and failed.
    Fail,
    /// Applicable but deliberately bypassed.
    Skip,
    /// Structurally inapplicable to the run context.
    Exclude,
}

impl Outcome {
    /// Returns the stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Exclude => "exclude",
        }
    }

    /// Returns the uppercase label used in text reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
            Self::Exclude => "EXCLUDE",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Result Trees
// ============================================================================

/// Completed node in a test's result tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultNode {
    /// Node name; the full test name at the root, the sub-test name below it.
    pub name: String,
    /// Node outcome.
    pub outcome: Outcome,
    /// Error messages recorded while the node ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Skip reason, when the node skipped itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Log lines recorded while the node ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Child nodes in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Self>,
}

impl ResultNode {
    /// Returns the first recorded error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }

    /// Looks up a direct child by name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Returns `/`-joined paths of every failed node, depth first.
    #[must_use]
    pub fn failed_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_failed(self, &mut String::new(), &mut paths);
        paths
    }
}

/// Depth-first walk collecting failed node paths.
fn collect_failed(node: &ResultNode, prefix: &mut String, out: &mut Vec<String>) {
    let restore = prefix.len();
    if !prefix.is_empty() {
        prefix.push('/');
    }
    prefix.push_str(&node.name);
    if node.outcome == Outcome::Fail {
        out.push(prefix.clone());
    }
    for child in &node.children {
        collect_failed(child, prefix, out);
    }
    prefix.truncate(restore);
}

// ============================================================================
// SECTION: Test Records
// ============================================================================

/// Final record for one registered test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Test name.
    pub name: TestName,
    /// Test outcome.
    pub outcome: Outcome,
    /// Reason for skip, exclude, or provisioning failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Result tree, present when the body ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<ResultNode>,
    /// Non-fatal teardown warnings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teardown_warnings: Vec<String>,
    /// Machines provisioned over the life of the test.
    pub machines_provisioned: usize,
    /// True when the test was never dispatched because the run was cancelled.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl TestRecord {
    /// Creates a record for a test that never executed.
    #[must_use]
    pub fn not_executed(name: TestName, outcome: Outcome, reason: impl Into<String>) -> Self {
        Self {
            name,
            outcome,
            reason: Some(reason.into()),
            root: None,
            teardown_warnings: Vec::new(),
            machines_provisioned: 0,
            cancelled: false,
        }
    }
}

// ============================================================================
// SECTION: Run Report
// ============================================================================

/// Per-outcome counts across the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Tests that passed.
    pub passed: usize,
    /// Tests that failed.
    pub failed: usize,
    /// Tests skipped, including cancelled ones.
    pub skipped: usize,
    /// Tests excluded.
    pub excluded: usize,
    /// Tests never dispatched because the run was cancelled.
    pub cancelled: usize,
    /// Tests with at least one teardown warning.
    pub teardown_warnings: usize,
}

impl RunSummary {
    /// Tallies a set of records.
    #[must_use]
    pub fn tally(records: &[TestRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.outcome {
                Outcome::Pass => summary.passed += 1,
                Outcome::Fail => summary.failed += 1,
                Outcome::Skip => summary.skipped += 1,
                Outcome::Exclude => summary.excluded += 1,
            }
            if record.cancelled {
                summary.cancelled += 1;
            }
            if !record.teardown_warnings.is_empty() {
                summary.teardown_warnings += 1;
            }
        }
        summary
    }
}

/// Report errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Canonical serialization failed.
    #[error("report serialization failed: {0}")]
    Serialize(String),
}

/// Final report for a harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Context the run executed under.
    pub context: ExecutionContext,
    /// Records sorted by test name.
    pub tests: Vec<TestRecord>,
    /// Outcome counts.
    pub summary: RunSummary,
}

impl RunReport {
    /// Builds a report, sorting records by test name.
    #[must_use]
    pub fn new(context: ExecutionContext, mut tests: Vec<TestRecord>) -> Self {
        tests.sort_by(|left, right| left.name.cmp(&right.name));
        let summary = RunSummary::tally(&tests);
        Self {
            context,
            tests,
            summary,
        }
    }

    /// Returns true when any test failed.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Looks up a record by test name.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&TestRecord> {
        self.tests.iter().find(|record| record.name.as_str() == name)
    }

    /// Serializes the report as canonical JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when serialization fails.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, ReportError> {
        serde_jcs::to_vec(self).map_err(|err| ReportError::Serialize(err.to_string()))
    }

    /// Renders a human-readable summary.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for record in &self.tests {
            let _ = write!(out, "--- {}: {}", record.outcome.label(), record.name);
            if let Some(root) = &record.root {
                let _ = write!(out, " ({}ms)", root.duration_ms);
            }
            if let Some(reason) = &record.reason {
                let _ = write!(out, " [{reason}]");
            }
            out.push('\n');
            if let Some(root) = &record.root
                && record.outcome == Outcome::Fail
            {
                render_failures(root, 1, &mut out);
            }
            for warning in &record.teardown_warnings {
                let _ = writeln!(out, "    teardown warning: {warning}");
            }
        }
        let summary = &self.summary;
        let _ = writeln!(
            out,
            "passed={} failed={} skipped={} excluded={} cancelled={} teardown_warnings={}",
            summary.passed,
            summary.failed,
            summary.skipped,
            summary.excluded,
            summary.cancelled,
            summary.teardown_warnings
        );
        out
    }
}

/// Renders failing nodes and their errors with indentation.
fn render_failures(node: &ResultNode, depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    for error in &node.errors {
        let _ = writeln!(out, "{indent}{error}");
    }
    for child in &node.children {
        if child.outcome == Outcome::Fail {
            let _ = writeln!(out, "{indent}--- FAIL: {}", child.name);
            render_failures(child, depth + 1, out);
        }
    }
}
