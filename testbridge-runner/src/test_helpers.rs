// Copyright (c) The testbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fake engine handles and a recording reporter for tests.

use crate::{
    engine::{
        FailureDetail, GroupChild, GroupHandle, IGNORE_ATTRIBUTE, LeafHandle, LeafId, StepHandle,
        TreeHandle,
    },
    errors::InvocationError,
    reporter::{ReportEntry, Reporter},
};
use std::sync::Mutex;

pub(crate) struct FakeTree {
    root: String,
}

impl FakeTree {
    pub(crate) fn new(root: &str) -> Self {
        Self {
            root: root.to_owned(),
        }
    }
}

impl TreeHandle for FakeTree {
    fn root_name(&self) -> Result<String, InvocationError> {
        Ok(self.root.clone())
    }
}

#[derive(Clone)]
pub(crate) struct FakeGroup {
    name: String,
    parent: Option<String>,
    children: Vec<GroupChild>,
}

impl FakeGroup {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_owned());
        self
    }

    pub(crate) fn with_child(mut self, child: GroupChild) -> Self {
        self.children.push(child);
        self
    }
}

impl GroupHandle for FakeGroup {
    fn name(&self) -> Result<String, InvocationError> {
        Ok(self.name.clone())
    }

    fn parent_name(&self) -> Result<Option<String>, InvocationError> {
        Ok(self.parent.clone())
    }

    fn children(&self) -> Result<Vec<GroupChild>, InvocationError> {
        Ok(self.children.clone())
    }
}

#[derive(Clone)]
pub(crate) struct FakeLeaf {
    id: u64,
    source: String,
    name: String,
    ignored: bool,
    faulty_attributes: bool,
}

impl FakeLeaf {
    pub(crate) fn new(id: u64, source: &str, name: &str) -> Self {
        Self {
            id,
            source: source.to_owned(),
            name: name.to_owned(),
            ignored: false,
            faulty_attributes: false,
        }
    }

    pub(crate) fn ignored(&self) -> Self {
        Self {
            ignored: true,
            ..self.clone()
        }
    }

    pub(crate) fn with_faulty_attributes(&self) -> Self {
        Self {
            faulty_attributes: true,
            ..self.clone()
        }
    }
}

impl LeafHandle for FakeLeaf {
    fn id(&self) -> LeafId {
        LeafId(self.id)
    }

    fn name(&self) -> Result<String, InvocationError> {
        Ok(self.name.clone())
    }

    fn source_name(&self) -> Result<String, InvocationError> {
        Ok(self.source.clone())
    }

    fn attribute(&self, key: &str) -> Result<Option<bool>, InvocationError> {
        if self.faulty_attributes {
            return Err(InvocationError::message(
                "engine has no attribute accessor",
            ));
        }
        Ok((key == IGNORE_ATTRIBUTE && self.ignored).then_some(true))
    }
}

pub(crate) struct FakeStep {
    status: Option<String>,
    failure: Option<FailureDetail>,
    faulty_failure: bool,
}

impl FakeStep {
    pub(crate) fn with_status(token: &str) -> Self {
        Self {
            status: Some(token.to_owned()),
            failure: None,
            faulty_failure: false,
        }
    }

    pub(crate) fn passed() -> Self {
        Self::with_status("PASSED")
    }

    pub(crate) fn failed(token: &str, message: &str) -> Self {
        Self {
            status: Some(token.to_owned()),
            failure: Some(FailureDetail::new(message)),
            faulty_failure: false,
        }
    }

    /// A step whose engine predates the status accessor.
    pub(crate) fn with_faulty_status() -> Self {
        Self {
            status: None,
            failure: None,
            faulty_failure: false,
        }
    }

    /// A step whose failure accessor faults after the status reads fine.
    pub(crate) fn with_faulty_failure(token: &str) -> Self {
        Self {
            status: Some(token.to_owned()),
            failure: None,
            faulty_failure: true,
        }
    }
}

impl StepHandle for FakeStep {
    fn status(&self) -> Result<String, InvocationError> {
        self.status
            .clone()
            .ok_or_else(|| InvocationError::message("step has no status accessor"))
    }

    fn failure(&self) -> Result<Option<FailureDetail>, InvocationError> {
        if self.faulty_failure {
            return Err(InvocationError::message("failure accessor faulted"));
        }
        Ok(self.failure.clone())
    }
}

/// One observed report call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ReportCall {
    SetStarting(ReportEntry),
    SetCompleted(ReportEntry),
    Starting(ReportEntry),
    Succeeded(ReportEntry),
    Failed(ReportEntry),
    Error(ReportEntry),
    Skipped(ReportEntry),
}

impl ReportCall {
    fn kind(&self) -> &'static str {
        match self {
            ReportCall::SetStarting(_) => "test_set_starting",
            ReportCall::SetCompleted(_) => "test_set_completed",
            ReportCall::Starting(_) => "test_starting",
            ReportCall::Succeeded(_) => "test_succeeded",
            ReportCall::Failed(_) => "test_failed",
            ReportCall::Error(_) => "test_error",
            ReportCall::Skipped(_) => "test_skipped",
        }
    }
}

/// Records every report call in order.
#[derive(Default)]
pub(crate) struct RecordingReporter {
    calls: Mutex<Vec<ReportCall>>,
}

impl RecordingReporter {
    pub(crate) fn calls(&self) -> Vec<ReportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_kinds(&self) -> Vec<&'static str> {
        self.calls().iter().map(ReportCall::kind).collect()
    }

    fn record(&self, call: ReportCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Reporter for RecordingReporter {
    fn test_set_starting(&self, entry: ReportEntry) {
        self.record(ReportCall::SetStarting(entry));
    }

    fn test_set_completed(&self, entry: ReportEntry) {
        self.record(ReportCall::SetCompleted(entry));
    }

    fn test_starting(&self, entry: ReportEntry) {
        self.record(ReportCall::Starting(entry));
    }

    fn test_succeeded(&self, entry: ReportEntry) {
        self.record(ReportCall::Succeeded(entry));
    }

    fn test_failed(&self, entry: ReportEntry) {
        self.record(ReportCall::Failed(entry));
    }

    fn test_error(&self, entry: ReportEntry) {
        self.record(ReportCall::Error(entry));
    }

    fn test_skipped(&self, entry: ReportEntry) {
        self.record(ReportCall::Skipped(entry));
    }
}
