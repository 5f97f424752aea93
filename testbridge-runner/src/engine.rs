// Copyright (c) The testbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handles exposed by the isolated test engine.
//!
//! The engine is loaded in its own execution context, so the bridge never
//! sees its concrete types. Each handle is an opaque capability: an accessor
//! performs one dynamic call across the boundary and surfaces any fault as an
//! [`InvocationError`].

use crate::errors::InvocationError;
use std::{fmt, sync::Arc};

/// Attribute key marking a leaf as ignored.
pub const IGNORE_ATTRIBUTE: &str = "ignore";

/// Stable identity of a test leaf.
///
/// Repeated notifications for the same leaf carry the same id. All per-leaf
/// state is keyed by it, never by the handle object.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LeafId(pub u64);

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure detail captured from a step.
///
/// Rendered to strings on the engine side of the boundary; the bridge never
/// holds a live reference to an engine-side cause object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureDetail {
    /// One-line failure message.
    pub message: String,

    /// Rendered cause chain, if the engine supplied one.
    pub cause: Option<String>,
}

impl FailureDetail {
    /// Creates a failure detail with no cause chain.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a failure detail with a rendered cause chain.
    pub fn with_cause(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, "\ncaused by: {cause}")?;
        }
        Ok(())
    }
}

/// The root of the engine's execution tree.
pub trait TreeHandle: Send + Sync {
    /// Name of the tree's root node.
    fn root_name(&self) -> Result<String, InvocationError>;
}

/// A composite node in the test hierarchy, containing leaves and/or nested
/// groups.
pub trait GroupHandle: Send + Sync {
    /// Display name of the group.
    fn name(&self) -> Result<String, InvocationError>;

    /// Name of the parent group, if there is one.
    fn parent_name(&self) -> Result<Option<String>, InvocationError>;

    /// The group's direct children.
    fn children(&self) -> Result<Vec<GroupChild>, InvocationError>;
}

/// A direct child of a group.
#[derive(Clone)]
pub enum GroupChild {
    /// A single executable test unit.
    Leaf(Arc<dyn LeafHandle>),

    /// A nested group.
    Group(Arc<dyn GroupHandle>),
}

/// A single executable test unit.
pub trait LeafHandle: Send + Sync {
    /// Stable identity of this leaf.
    ///
    /// Identity is a property of the local proxy, not of the remote object,
    /// so this accessor does not cross the boundary and cannot fault.
    fn id(&self) -> LeafId;

    /// Display name of the leaf.
    fn name(&self) -> Result<String, InvocationError>;

    /// Fully-qualified name of the test case this leaf belongs to.
    fn source_name(&self) -> Result<String, InvocationError>;

    /// Looks up a boolean attribute by key.
    fn attribute(&self, key: &str) -> Result<Option<bool>, InvocationError>;
}

/// One recorded unit of work within a leaf's execution.
pub trait StepHandle: Send + Sync {
    /// The engine's status token for this step.
    ///
    /// Engine versions that predate step statuses do not expose this
    /// accessor; the resulting fault is fatal to dispatch.
    fn status(&self) -> Result<String, InvocationError>;

    /// Failure detail attached to this step, if any.
    fn failure(&self) -> Result<Option<FailureDetail>, InvocationError>;
}

/// Returns true if the leaf carries the ignore attribute.
///
/// Engine versions without attribute support fault on the lookup; such leaves
/// are treated as not ignored.
pub(crate) fn is_ignored(leaf: &dyn LeafHandle) -> bool {
    matches!(leaf.attribute(IGNORE_ATTRIBUTE), Ok(Some(true)))
}

/// Returns true if the group directly contains at least one leaf child.
pub(crate) fn contains_leaves(group: &dyn GroupHandle) -> Result<bool, InvocationError> {
    Ok(group
        .children()?
        .iter()
        .any(|child| matches!(child, GroupChild::Leaf(_))))
}

/// The group's parent name, or its own name if it has no parent.
pub(crate) fn parent_name_or_self(group: &dyn GroupHandle) -> Result<String, InvocationError> {
    match group.parent_name()? {
        Some(parent) => Ok(parent),
        None => group.name(),
    }
}
