// Copyright (c) The testbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatches engine notifications to the aggregator and the host reporter.

use crate::{
    aggregator::{RunResult, StatusAggregator},
    engine::{self, GroupHandle},
    errors::DispatchError,
    events::{EngineEvent, EventPayload},
    reporter::{ReportEntry, Reporter},
};
use debug_ignore::DebugIgnore;
use std::sync::Arc;
use tracing::debug;

/// Routes engine lifecycle events.
///
/// The bridge holds no state beyond handles to the aggregator and the host
/// reporter: group events turn into conditional report calls, leaf and step
/// events delegate to the [`StatusAggregator`], and process events bracket
/// the run.
#[derive(Debug)]
pub struct EventBridge {
    reporter: DebugIgnore<Arc<dyn Reporter>>,
    aggregator: StatusAggregator,
}

impl EventBridge {
    /// Creates a bridge emitting to the given reporter.
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            aggregator: StatusAggregator::new(Arc::clone(&reporter)),
            reporter: DebugIgnore(reporter),
        }
    }

    /// Normalizes and dispatches a raw notification received at the engine
    /// boundary.
    pub fn notify(&self, name: &str, payload: EventPayload) -> Result<(), DispatchError> {
        let event = EngineEvent::from_notification(name, payload)?;
        self.dispatch(event)
    }

    /// Dispatches one engine event.
    pub fn dispatch(&self, event: EngineEvent) -> Result<(), DispatchError> {
        match event {
            EngineEvent::ProcessStarting(tree) => {
                // Root name is log-only; a fault here must not kill the run.
                if let Ok(root) = tree.root_name() {
                    debug!(root = %root, "test process starting");
                }
                Ok(())
            }
            EngineEvent::ProcessFinished(_) => {
                self.aggregator.process_finished();
                Ok(())
            }
            EngineEvent::GroupStarting(group) => self.group_starting(&group),
            EngineEvent::GroupFinished(group) => self.group_finished(&group),
            EngineEvent::LeafStarting(leaf) => self.aggregator.leaf_starting(&leaf),
            EngineEvent::LeafFinished(leaf) => self.aggregator.leaf_finished(&leaf),
            EngineEvent::StepRecorded { leaf, step } => {
                self.aggregator.step_recorded(&leaf, &step)
            }
            EngineEvent::Unknown { name } => {
                debug!(notification = %name, "ignoring unknown engine notification");
                Ok(())
            }
        }
    }

    /// Snapshot of the run counters. Final once the process-finished event
    /// has been dispatched.
    pub fn run_result(&self) -> RunResult {
        self.aggregator.run_result()
    }

    // Groups containing only nested groups are transparent: no report call.
    fn group_starting(&self, group: &Arc<dyn GroupHandle>) -> Result<(), DispatchError> {
        if engine::contains_leaves(group.as_ref())? {
            self.reporter.test_set_starting(group_entry(group)?);
        }
        Ok(())
    }

    fn group_finished(&self, group: &Arc<dyn GroupHandle>) -> Result<(), DispatchError> {
        if engine::contains_leaves(group.as_ref())? {
            self.reporter.test_set_completed(group_entry(group)?);
        }
        Ok(())
    }
}

fn group_entry(group: &Arc<dyn GroupHandle>) -> Result<ReportEntry, DispatchError> {
    Ok(ReportEntry::new(
        engine::parent_name_or_self(group.as_ref())?,
        group.name()?,
    ))
}

/// Registration of a bridge with the engine's listener registry.
///
/// The registry compares listeners when adding and removing them. Equality is
/// identity: a registration is equal only to a clone of itself.
#[derive(Clone, Debug)]
pub struct ListenerRegistration {
    bridge: Arc<EventBridge>,
}

impl ListenerRegistration {
    /// Wraps a bridge for registration.
    pub fn new(bridge: Arc<EventBridge>) -> Self {
        Self { bridge }
    }

    /// The registered bridge.
    pub fn bridge(&self) -> &Arc<EventBridge> {
        &self.bridge
    }
}

impl PartialEq for ListenerRegistration {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bridge, &other.bridge)
    }
}

impl Eq for ListenerRegistration {}
