// Copyright (c) The testbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-leaf status aggregation and run counters.
//!
//! The aggregator owns all mutable state for a test process: one record per
//! in-flight leaf plus the process-wide counters. Each recorded step merges
//! its status into the leaf's accumulated status under a fixed precedence;
//! leaf finish resolves the final disposition and emits exactly one report
//! call.

use crate::{
    engine::{self, FailureDetail, LeafHandle, LeafId, StepHandle},
    errors::DispatchError,
    reporter::{ReportEntry, Reporter},
    status::EngineStatus,
    time::{StopwatchStart, stopwatch},
};
use debug_ignore::DebugIgnore;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::{debug, warn};

/// Accumulated state for one leaf.
///
/// Created on the leaf's start notification, mutated on every recorded step,
/// removed on finish. A record still present at process end belongs to a leaf
/// that never finished.
#[derive(Debug, Default)]
struct LeafState {
    status: Option<EngineStatus>,
    started: Option<StopwatchStart>,
    last_failure: Option<FailureDetail>,
}

#[derive(Debug, Default)]
struct RunCounters {
    run: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    errored: AtomicUsize,
}

/// Summary of a finished test process: a snapshot of the four run counters.
///
/// Every finished leaf increments `run`; a non-passing outcome additionally
/// increments exactly one of the other counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Number of leaves that finished, regardless of outcome.
    pub run: usize,

    /// Number of leaves that finished with an error-class failure.
    pub errors: usize,

    /// Number of leaves that finished with an ordinary failure.
    pub failures: usize,

    /// Number of leaves that were skipped.
    pub skipped: usize,
}

impl RunResult {
    /// Returns true if no finished leaf failed or errored.
    pub fn is_success(&self) -> bool {
        self.errors == 0 && self.failures == 0
    }
}

/// Owns per-leaf state and resolves final dispositions.
#[derive(Debug)]
pub struct StatusAggregator {
    reporter: DebugIgnore<Arc<dyn Reporter>>,
    leaves: Mutex<HashMap<LeafId, LeafState>>,
    counters: RunCounters,
}

impl StatusAggregator {
    pub(crate) fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter: DebugIgnore(reporter),
            leaves: Mutex::new(HashMap::new()),
            counters: RunCounters::default(),
        }
    }

    fn leaves(&self) -> MutexGuard<'_, HashMap<LeafId, LeafState>> {
        self.leaves.lock().expect("leaf state lock poisoned")
    }

    /// Records the start of a leaf and reports it, unless the leaf is
    /// ignored.
    pub(crate) fn leaf_starting(
        &self,
        leaf: &Arc<dyn LeafHandle>,
    ) -> Result<(), DispatchError> {
        let id = leaf.id();
        self.leaves().entry(id).or_default().started = Some(stopwatch());

        // Ignored leaves surface once, as skipped, when they finish.
        if engine::is_ignored(leaf.as_ref()) {
            debug!(leaf = %id, "leaf is ignored, suppressing start report");
            return Ok(());
        }

        let entry = ReportEntry::new(leaf.source_name()?, leaf.name()?);
        self.reporter.test_starting(entry);
        Ok(())
    }

    /// Merges a recorded step into the leaf's accumulated state.
    ///
    /// The status token and the failure detail are both read before any state
    /// is touched, so a faulting accessor leaves the leaf unchanged.
    pub(crate) fn step_recorded(
        &self,
        leaf: &Arc<dyn LeafHandle>,
        step: &Arc<dyn StepHandle>,
    ) -> Result<(), DispatchError> {
        let status: EngineStatus = step.status()?.parse()?;
        let failure = step.failure()?;

        let id = leaf.id();
        let mut leaves = self.leaves();
        let state = leaves.entry(id).or_default();
        if supersedes(status, state.status) {
            state.status = Some(status);
        }
        if let Some(failure) = failure {
            state.last_failure = Some(failure);
        }
        Ok(())
    }

    /// Resolves the final disposition for a finished leaf and emits exactly
    /// one report call.
    pub(crate) fn leaf_finished(
        &self,
        leaf: &Arc<dyn LeafHandle>,
    ) -> Result<(), DispatchError> {
        let id = leaf.id();
        let state = self.leaves().remove(&id).unwrap_or_default();

        self.counters.run.fetch_add(1, Ordering::Relaxed);

        let source_name = leaf.source_name()?;
        let name = leaf.name()?;

        // The leaf-level ignore flag wins over anything the steps reported.
        let status = if engine::is_ignored(leaf.as_ref()) {
            EngineStatus::Ignored
        } else {
            state.status.unwrap_or(EngineStatus::Passed)
        };

        if status.is_failure() {
            let entry = ReportEntry::new(source_name, name).with_failure(state.last_failure);
            if status.is_ordinary_failure() {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.reporter.test_failed(entry);
            } else {
                self.counters.errored.fetch_add(1, Ordering::Relaxed);
                self.reporter.test_error(entry);
            }
        } else {
            let snapshot = state.started.as_ref().map(StopwatchStart::snapshot);
            if let Some(snapshot) = &snapshot {
                debug!(
                    leaf = %id,
                    started_at = %snapshot.start_time,
                    elapsed = ?snapshot.duration,
                    "leaf finished"
                );
            }
            let entry = ReportEntry::new(source_name, name)
                .with_elapsed(snapshot.map(|snapshot| snapshot.duration));
            if status == EngineStatus::Ignored {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                self.reporter.test_skipped(entry);
            } else {
                self.reporter.test_succeeded(entry);
            }
        }
        Ok(())
    }

    /// Drops state for leaves that never saw a finish notification.
    ///
    /// No report call is emitted for them and no counter moves; each dropped
    /// leaf is logged.
    pub(crate) fn process_finished(&self) {
        let mut orphaned: Vec<LeafId> = self.leaves().drain().map(|(id, _)| id).collect();
        if orphaned.is_empty() {
            return;
        }
        orphaned.sort_unstable();
        for id in orphaned {
            warn!(leaf = %id, "leaf never finished, dropping without a report");
        }
    }

    /// Snapshot of the run counters.
    pub(crate) fn run_result(&self) -> RunResult {
        RunResult {
            run: self.counters.run.load(Ordering::Relaxed),
            errors: self.counters.errored.load(Ordering::Relaxed),
            failures: self.counters.failed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Returns true if `status` should replace `prev` as the leaf's accumulated
/// status.
///
/// Encodes the precedence IGNORED < PASSED < ordinary failure < error-class
/// failure. An equal status is re-adopted; a non-failure accumulated status
/// other than PASSED and IGNORED is never superseded.
fn supersedes(status: EngineStatus, prev: Option<EngineStatus>) -> bool {
    let Some(prev) = prev else {
        return true;
    };
    if prev == EngineStatus::Ignored || status == prev {
        return true;
    }
    if prev == EngineStatus::Passed {
        return status.is_failure();
    }
    if prev.is_ordinary_failure() {
        return status.is_error();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeLeaf, FakeStep, ReportCall, RecordingReporter};
    use proptest::prelude::*;
    use test_case::test_case;

    fn aggregator() -> (Arc<RecordingReporter>, StatusAggregator) {
        let reporter = Arc::new(RecordingReporter::default());
        let aggregator = StatusAggregator::new(reporter.clone());
        (reporter, aggregator)
    }

    fn leaf(id: u64) -> Arc<dyn LeafHandle> {
        Arc::new(FakeLeaf::new(id, "com.example.SmokeTest", "login"))
    }

    fn step(status: EngineStatus) -> Arc<dyn StepHandle> {
        Arc::new(FakeStep::with_status(status.to_static_str()))
    }

    #[test_case(EngineStatus::Failed, None => true; "anything beats no prior")]
    #[test_case(EngineStatus::Passed, Some(EngineStatus::Ignored) => true; "anything beats ignored")]
    #[test_case(EngineStatus::Failed, Some(EngineStatus::Failed) => true; "equal statuses re-adopt")]
    #[test_case(EngineStatus::Failed, Some(EngineStatus::Passed) => true; "failure beats passed")]
    #[test_case(EngineStatus::Ignored, Some(EngineStatus::Passed) => false; "ignored does not beat passed")]
    #[test_case(EngineStatus::Passed, Some(EngineStatus::Failed) => false; "passed does not beat failure")]
    #[test_case(EngineStatus::FailedAccess, Some(EngineStatus::Failed) => true; "error beats ordinary failure")]
    #[test_case(EngineStatus::FailedPerformance, Some(EngineStatus::Failed) => false; "ordinary does not beat ordinary")]
    #[test_case(EngineStatus::Inconclusive, Some(EngineStatus::FailedAccess) => false; "error does not beat another error")]
    #[test_case(EngineStatus::Failed, Some(EngineStatus::FailedAutomation) => false; "ordinary does not beat error")]
    #[test_case(EngineStatus::Failed, Some(EngineStatus::Running) => false; "running is sticky")]
    fn supersedes_cases(status: EngineStatus, prev: Option<EngineStatus>) -> bool {
        supersedes(status, prev)
    }

    proptest! {
        #[test]
        fn supersedes_always_adopts_over_no_prior_or_ignored(status: EngineStatus) {
            prop_assert!(supersedes(status, None));
            prop_assert!(supersedes(status, Some(EngineStatus::Ignored)));
            prop_assert!(supersedes(status, Some(status)));
        }

        #[test]
        fn error_failures_are_terminal(status: EngineStatus, prev: EngineStatus) {
            if prev.is_error() && status != prev {
                prop_assert!(!supersedes(status, Some(prev)));
            }
        }
    }

    /// Statuses drawn for the precedence property: the four severity classes.
    fn arb_step_status() -> impl Strategy<Value = EngineStatus> {
        prop::sample::select(vec![
            EngineStatus::Ignored,
            EngineStatus::Passed,
            EngineStatus::Failed,
            EngineStatus::FailedPerformance,
            EngineStatus::FailedAccess,
            EngineStatus::FailedAutomation,
            EngineStatus::Inconclusive,
        ])
    }

    fn severity_class(status: EngineStatus) -> u8 {
        if status.is_error() {
            3
        } else if status.is_ordinary_failure() {
            2
        } else if status == EngineStatus::Ignored {
            0
        } else {
            1
        }
    }

    proptest! {
        /// For any step sequence, the final outcome class is the maximum
        /// class observed, with an empty sequence resolving as passed.
        #[test]
        fn final_outcome_is_max_severity_class(
            statuses in prop::collection::vec(arb_step_status(), 0..16),
        ) {
            let (reporter, aggregator) = aggregator();
            let leaf = leaf(7);

            aggregator.leaf_starting(&leaf).unwrap();
            for status in &statuses {
                aggregator.step_recorded(&leaf, &step(*status)).unwrap();
            }
            aggregator.leaf_finished(&leaf).unwrap();

            let max_class = statuses.iter().copied().map(severity_class).max().unwrap_or(1);
            let calls = reporter.calls();
            prop_assert_eq!(calls.len(), 2, "starting plus exactly one outcome");
            let expected = match max_class {
                0 => matches!(calls[1], ReportCall::Skipped(_)),
                1 => matches!(calls[1], ReportCall::Succeeded(_)),
                2 => matches!(calls[1], ReportCall::Failed(_)),
                _ => matches!(calls[1], ReportCall::Error(_)),
            };
            prop_assert!(expected, "outcome {:?} for max class {}", calls[1], max_class);

            let result = aggregator.run_result();
            prop_assert_eq!(result.run, 1);
            prop_assert_eq!(
                result.errors + result.failures + result.skipped,
                usize::from(max_class != 1)
            );
        }
    }

    #[test]
    fn passed_then_failed_reports_failed() {
        let (reporter, aggregator) = aggregator();
        let leaf = leaf(1);

        aggregator.leaf_starting(&leaf).unwrap();
        aggregator.step_recorded(&leaf, &step(EngineStatus::Passed)).unwrap();
        aggregator.step_recorded(&leaf, &step(EngineStatus::Failed)).unwrap();
        aggregator.leaf_finished(&leaf).unwrap();

        assert!(matches!(reporter.calls()[1], ReportCall::Failed(_)));
        assert_eq!(
            aggregator.run_result(),
            RunResult {
                run: 1,
                errors: 0,
                failures: 1,
                skipped: 0
            }
        );
    }

    #[test]
    fn failed_then_error_reports_error() {
        let (reporter, aggregator) = aggregator();
        let leaf = leaf(1);

        aggregator.leaf_starting(&leaf).unwrap();
        aggregator.step_recorded(&leaf, &step(EngineStatus::Failed)).unwrap();
        aggregator
            .step_recorded(&leaf, &step(EngineStatus::FailedAccess))
            .unwrap();
        aggregator.leaf_finished(&leaf).unwrap();

        assert!(matches!(reporter.calls()[1], ReportCall::Error(_)));
        let result = aggregator.run_result();
        assert_eq!((result.errors, result.failures), (1, 0));
        assert!(!result.is_success());
    }

    #[test]
    fn ignored_flag_wins_over_step_history() {
        let (reporter, aggregator) = aggregator();
        let leaf: Arc<dyn LeafHandle> =
            Arc::new(FakeLeaf::new(1, "com.example.SmokeTest", "login").ignored());

        aggregator.leaf_starting(&leaf).unwrap();
        aggregator.step_recorded(&leaf, &step(EngineStatus::Failed)).unwrap();
        aggregator.leaf_finished(&leaf).unwrap();

        let calls = reporter.calls();
        assert_eq!(calls.len(), 1, "no starting report for an ignored leaf");
        let ReportCall::Skipped(entry) = &calls[0] else {
            panic!("expected skipped, got {:?}", calls[0]);
        };
        assert!(entry.elapsed.is_some(), "skipped entries carry elapsed time");
        assert_eq!(
            aggregator.run_result(),
            RunResult {
                run: 1,
                errors: 0,
                failures: 0,
                skipped: 1
            }
        );
    }

    #[test]
    fn leaf_without_steps_passes_with_elapsed() {
        let (reporter, aggregator) = aggregator();
        let leaf = leaf(1);

        aggregator.leaf_starting(&leaf).unwrap();
        aggregator.leaf_finished(&leaf).unwrap();

        let calls = reporter.calls();
        let ReportCall::Succeeded(entry) = &calls[1] else {
            panic!("expected succeeded, got {:?}", calls[1]);
        };
        assert!(entry.elapsed.is_some());
        assert!(aggregator.run_result().is_success());
    }

    #[test]
    fn finish_without_start_passes_with_unknown_elapsed() {
        let (reporter, aggregator) = aggregator();
        let leaf = leaf(1);

        aggregator.leaf_finished(&leaf).unwrap();

        let calls = reporter.calls();
        assert_eq!(calls.len(), 1);
        let ReportCall::Succeeded(entry) = &calls[0] else {
            panic!("expected succeeded, got {:?}", calls[0]);
        };
        assert_eq!(entry.elapsed, None);
        assert_eq!(aggregator.run_result().run, 1);
    }

    #[test]
    fn last_failure_detail_wins() {
        let (reporter, aggregator) = aggregator();
        let leaf = leaf(1);

        aggregator.leaf_starting(&leaf).unwrap();
        aggregator
            .step_recorded(
                &leaf,
                &(Arc::new(FakeStep::failed("FAILED", "first assertion")) as Arc<dyn StepHandle>),
            )
            .unwrap();
        aggregator
            .step_recorded(
                &leaf,
                &(Arc::new(FakeStep::failed("FAILED", "second assertion")) as Arc<dyn StepHandle>),
            )
            .unwrap();
        aggregator.leaf_finished(&leaf).unwrap();

        let ReportCall::Failed(entry) = &reporter.calls()[1] else {
            panic!("expected failed");
        };
        assert_eq!(
            entry.failure.as_ref().map(|failure| failure.message.as_str()),
            Some("second assertion")
        );
    }

    #[test]
    fn unknown_status_token_is_fatal_and_leaves_state_untouched() {
        let (reporter, aggregator) = aggregator();
        let leaf = leaf(1);

        aggregator.leaf_starting(&leaf).unwrap();
        let bogus: Arc<dyn StepHandle> = Arc::new(FakeStep::with_status("EXPLODED"));
        let err = aggregator.step_recorded(&leaf, &bogus).unwrap_err();
        assert!(matches!(err, DispatchError::StatusParse(_)));

        aggregator.leaf_finished(&leaf).unwrap();
        assert!(matches!(reporter.calls()[1], ReportCall::Succeeded(_)));
    }

    #[test]
    fn faulting_failure_accessor_leaves_state_untouched() {
        let (reporter, aggregator) = aggregator();
        let leaf = leaf(1);

        aggregator.leaf_starting(&leaf).unwrap();
        let faulty: Arc<dyn StepHandle> = Arc::new(FakeStep::with_faulty_failure("FAILED"));
        let err = aggregator.step_recorded(&leaf, &faulty).unwrap_err();
        assert!(matches!(err, DispatchError::Invocation(_)));

        // The FAILED token was readable, but the fault on the failure
        // accessor must prevent the partial status update.
        aggregator.leaf_finished(&leaf).unwrap();
        assert!(matches!(reporter.calls()[1], ReportCall::Succeeded(_)));
    }

    #[test]
    fn missing_status_accessor_is_fatal() {
        let (_reporter, aggregator) = aggregator();
        let leaf = leaf(1);

        let faulty: Arc<dyn StepHandle> = Arc::new(FakeStep::with_faulty_status());
        let err = aggregator.step_recorded(&leaf, &faulty).unwrap_err();
        assert!(matches!(err, DispatchError::Invocation(_)));
    }

    #[test]
    fn orphaned_leaves_are_dropped_without_report() {
        let (reporter, aggregator) = aggregator();
        let leaf = leaf(1);

        aggregator.leaf_starting(&leaf).unwrap();
        aggregator.step_recorded(&leaf, &step(EngineStatus::Failed)).unwrap();
        aggregator.process_finished();

        assert_eq!(reporter.calls().len(), 1, "only the starting report");
        assert_eq!(aggregator.run_result(), RunResult::default());

        // A finish arriving after the sweep finds no state and resolves as
        // passed rather than crashing.
        aggregator.leaf_finished(&leaf).unwrap();
        assert!(matches!(reporter.calls()[1], ReportCall::Succeeded(_)));
    }

    #[test]
    fn run_result_serializes() {
        let result = RunResult {
            run: 4,
            errors: 1,
            failures: 1,
            skipped: 1,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"run":4,"errors":1,"failures":1,"skipped":1}"#);
    }
}
