// Copyright (c) The testbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testbridge.

use crate::status::EngineStatus;
use std::error;
use thiserror::Error;

/// An error raised by an accessor call into the isolated engine context.
///
/// Every boundary-crossing fault is wrapped in this single kind. The
/// underlying cause, if the engine supplied one, is preserved as the error
/// source.
#[derive(Debug, Error)]
#[error("engine invocation failed: {context}")]
pub struct InvocationError {
    context: String,
    #[source]
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl InvocationError {
    /// Wraps a fault raised on the engine side of the boundary.
    pub fn new(
        context: impl Into<String>,
        source: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    /// An invocation failure with no underlying cause, such as an accessor
    /// that is missing on an incompatible engine version.
    pub fn message(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            source: None,
        }
    }
}

/// Error returned while parsing an [`EngineStatus`] from an engine status
/// token.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized engine test status: {token}\n(known values: {})",
    EngineStatus::variants().join(", "),
)]
pub struct StatusParseError {
    token: String,
}

impl StatusParseError {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// An error returned while dispatching an engine notification.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A boundary-crossing accessor faulted.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// A step reported a status token that does not map to a known value.
    #[error(transparent)]
    StatusParse(#[from] StatusParseError),
}
