// Copyright (c) The testbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine lifecycle notifications, normalized into a closed event type.
//!
//! The engine dispatches notifications by name with loosely-typed arguments.
//! [`EngineEvent::from_notification`] turns one `(name, payload)` pair into a
//! tagged value exactly once, at the boundary; everything past that point is
//! matched exhaustively.

use crate::{
    engine::{GroupHandle, LeafHandle, StepHandle, TreeHandle},
    errors::InvocationError,
};
use std::{fmt, sync::Arc};

/// Payload of a raw engine notification.
///
/// The start/stop collaborator builds one of these per callback; pairing it
/// with the notification name yields an [`EngineEvent`].
#[derive(Clone)]
pub enum EventPayload {
    /// The execution tree, for process-level notifications.
    Tree(Arc<dyn TreeHandle>),

    /// A group handle.
    Group(Arc<dyn GroupHandle>),

    /// A leaf handle.
    Leaf(Arc<dyn LeafHandle>),

    /// A leaf plus one of its recorded steps.
    Step(Arc<dyn LeafHandle>, Arc<dyn StepHandle>),

    /// No payload.
    Empty,
}

/// A lifecycle notification received from the engine.
///
/// The set of notifications an engine emits is open-ended; names outside the
/// closed set below normalize to [`EngineEvent::Unknown`], which dispatch
/// ignores.
#[derive(Clone)]
pub enum EngineEvent {
    /// The test process is starting.
    ProcessStarting(Arc<dyn TreeHandle>),

    /// The test process has finished.
    ProcessFinished(Arc<dyn TreeHandle>),

    /// A group is starting.
    GroupStarting(Arc<dyn GroupHandle>),

    /// A group has finished.
    GroupFinished(Arc<dyn GroupHandle>),

    /// A leaf is starting.
    LeafStarting(Arc<dyn LeafHandle>),

    /// A leaf has finished.
    LeafFinished(Arc<dyn LeafHandle>),

    /// A step was recorded for a leaf.
    StepRecorded {
        /// The leaf the step belongs to.
        leaf: Arc<dyn LeafHandle>,

        /// The recorded step.
        step: Arc<dyn StepHandle>,
    },

    /// A notification outside the known set.
    Unknown {
        /// The notification name as received.
        name: String,
    },
}

/// Notification names in the engine's listener contract.
const STARTING_TEST_PROCESS: &str = "startingTestProcess";
const FINISHED_TEST_PROCESS: &str = "finishedTestProcess";
const STARTING_TEST_GROUP: &str = "startingTestGroup";
const FINISHED_TEST_GROUP: &str = "finishedTestGroup";
const STARTING_TEST_LEAF: &str = "startingTestLeaf";
const FINISHED_TEST_LEAF: &str = "finishedTestLeaf";
const NEW_TEST_STEP: &str = "newTestStep";

impl EngineEvent {
    /// Normalizes a raw notification into an event.
    ///
    /// Unknown names produce [`EngineEvent::Unknown`]. A known name paired
    /// with the wrong payload shape means the engine and the bridge disagree
    /// about the listener contract, which is fatal.
    pub fn from_notification(name: &str, payload: EventPayload) -> Result<Self, InvocationError> {
        let event = match (name, payload) {
            (STARTING_TEST_PROCESS, EventPayload::Tree(tree)) => Self::ProcessStarting(tree),
            (FINISHED_TEST_PROCESS, EventPayload::Tree(tree)) => Self::ProcessFinished(tree),
            (STARTING_TEST_GROUP, EventPayload::Group(group)) => Self::GroupStarting(group),
            (FINISHED_TEST_GROUP, EventPayload::Group(group)) => Self::GroupFinished(group),
            (STARTING_TEST_LEAF, EventPayload::Leaf(leaf)) => Self::LeafStarting(leaf),
            (FINISHED_TEST_LEAF, EventPayload::Leaf(leaf)) => Self::LeafFinished(leaf),
            (NEW_TEST_STEP, EventPayload::Step(leaf, step)) => Self::StepRecorded { leaf, step },
            (
                name @ (STARTING_TEST_PROCESS
                | FINISHED_TEST_PROCESS
                | STARTING_TEST_GROUP
                | FINISHED_TEST_GROUP
                | STARTING_TEST_LEAF
                | FINISHED_TEST_LEAF
                | NEW_TEST_STEP),
                _,
            ) => {
                return Err(InvocationError::message(format!(
                    "notification `{name}` carried an unexpected payload"
                )));
            }
            (name, _) => Self::Unknown {
                name: name.to_owned(),
            },
        };
        Ok(event)
    }

    /// The notification name this event was normalized from.
    pub fn name(&self) -> &str {
        match self {
            Self::ProcessStarting(_) => STARTING_TEST_PROCESS,
            Self::ProcessFinished(_) => FINISHED_TEST_PROCESS,
            Self::GroupStarting(_) => STARTING_TEST_GROUP,
            Self::GroupFinished(_) => FINISHED_TEST_GROUP,
            Self::LeafStarting(_) => STARTING_TEST_LEAF,
            Self::LeafFinished(_) => FINISHED_TEST_LEAF,
            Self::StepRecorded { .. } => NEW_TEST_STEP,
            Self::Unknown { name } => name,
        }
    }
}

impl fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEvent")
            .field("name", &self.name())
            .finish()
    }
}
