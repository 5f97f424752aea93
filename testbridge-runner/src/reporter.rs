// Copyright (c) The testbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The host-side reporting protocol.
//!
//! One [`Reporter`] implementation exists per host protocol. The bridge calls
//! each test-level method exactly once per finished leaf, and the set-level
//! methods once per group that directly contains leaves.

use crate::engine::FailureDetail;
use std::time::Duration;

/// A single entry passed to the host reporter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportEntry {
    /// Fully-qualified source of the test unit. For set-level entries this is
    /// the parent group's name.
    pub source_name: String,

    /// Display name of the test unit or group.
    pub name: String,

    /// Wall-clock execution time. `None` reports as an unknown duration.
    pub elapsed: Option<Duration>,

    /// Failure detail attached as the diagnostic payload.
    pub failure: Option<FailureDetail>,
}

impl ReportEntry {
    /// Creates an entry with no timing or failure information.
    pub fn new(source_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            name: name.into(),
            elapsed: None,
            failure: None,
        }
    }

    pub(crate) fn with_elapsed(mut self, elapsed: Option<Duration>) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub(crate) fn with_failure(mut self, failure: Option<FailureDetail>) -> Self {
        self.failure = failure;
        self
    }
}

/// Host-side consumer of report entries.
pub trait Reporter: Send + Sync {
    /// A set of tests is starting.
    fn test_set_starting(&self, entry: ReportEntry);

    /// A set of tests has completed.
    fn test_set_completed(&self, entry: ReportEntry);

    /// An individual test is starting. Not called for ignored tests.
    fn test_starting(&self, entry: ReportEntry);

    /// The test passed.
    fn test_succeeded(&self, entry: ReportEntry);

    /// The test finished with an ordinary failure.
    fn test_failed(&self, entry: ReportEntry);

    /// The test finished with an error-class failure.
    fn test_error(&self, entry: ReportEntry);

    /// The test was skipped.
    fn test_skipped(&self, entry: ReportEntry);
}
