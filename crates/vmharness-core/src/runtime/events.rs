// crates/vmharness-core/src/runtime/events.rs
// ============================================================================
// Module: VM Harness Run Events
// Description: Structured lifecycle events emitted while a run executes.
// Purpose: Emit JSON-line run logs without hard logging dependencies.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! The scheduler and clusters report lifecycle transitions as [`RunEvent`]
//! payloads through a [`RunEventSink`]. Sinks write one JSON object per line
//! so operators can route events into any log pipeline. Write failures are
//! dropped; event emission never changes a test outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::Outcome;
use crate::core::TestName;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Kinds of run events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    /// Filter decided skip or exclude.
    TestFiltered,
    /// Test was dispatched to a worker.
    TestStarted,
    /// Machines were provisioned for a test.
    ClusterProvisioned,
    /// Provisioning failed.
    ProvisionFailed,
    /// A sub-test finished.
    SubtestFinished,
    /// A test body logged a line.
    TestLog,
    /// A native function was invoked on a guest.
    NativeInvoked,
    /// Destroying machines failed.
    TeardownFailed,
    /// A test reached a terminal outcome.
    TestFinished,
    /// The run stopped dispatching because of cancellation.
    RunCancelled,
}

impl RunEventKind {
    /// Returns the stable event identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TestFiltered => "test_filtered",
            Self::TestStarted => "test_started",
            Self::ClusterProvisioned => "cluster_provisioned",
            Self::ProvisionFailed => "provision_failed",
            Self::SubtestFinished => "subtest_finished",
            Self::TestLog => "test_log",
            Self::NativeInvoked => "native_invoked",
            Self::TeardownFailed => "teardown_failed",
            Self::TestFinished => "test_finished",
            Self::RunCancelled => "run_cancelled",
        }
    }
}

/// Run event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Test the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    /// Sub-test path below the test root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Outcome when the event is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Machine count for provisioning events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machines: Option<usize>,
    /// Free-form detail (reason, log line, error message).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RunEvent {
    /// Creates an event with a consistent timestamp.
    #[must_use]
    pub fn new(kind: RunEventKind) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: kind.as_str(),
            timestamp_ms,
            test: None,
            path: None,
            outcome: None,
            machines: None,
            detail: None,
        }
    }

    /// Creates an event scoped to a test.
    #[must_use]
    pub fn for_test(kind: RunEventKind, test: &TestName) -> Self {
        let mut event = Self::new(kind);
        event.test = Some(test.to_string());
        event
    }

    /// Sets the sub-test path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the outcome.
    #[must_use]
    pub const fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Sets the machine count.
    #[must_use]
    pub const fn with_machines(mut self, machines: usize) -> Self {
        self.machines = Some(machines);
        self
    }

    /// Sets the detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink for run events.
pub trait RunEventSink: Send + Sync {
    /// Records a run event.
    fn record(&self, event: &RunEvent);
}

/// Sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl RunEventSink for StderrEventSink {
    fn record(&self, event: &RunEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that logs JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the event log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RunEventSink for FileEventSink {
    fn record(&self, event: &RunEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op sink.
pub struct NoopEventSink;

impl RunEventSink for NoopEventSink {
    fn record(&self, _event: &RunEvent) {}
}

/// Sink that keeps events in memory for assertions.
#[derive(Default)]
pub struct MemoryEventSink {
    /// Recorded events in emission order.
    events: Mutex<Vec<RunEvent>>,
}

impl MemoryEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the identifiers of recorded events.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).iter().map(|e| e.event).collect()
    }

    /// Returns recorded events of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: RunEventKind) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.event == kind.as_str())
            .cloned()
            .collect()
    }
}

impl RunEventSink for MemoryEventSink {
    fn record(&self, event: &RunEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}
