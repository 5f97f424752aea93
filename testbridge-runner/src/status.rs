// Copyright (c) The testbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test statuses reported by the isolated engine.

use crate::errors::StatusParseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A status reported for a test step, or accumulated for a test leaf.
///
/// The serialized form of each variant is the engine's wire token, which is
/// also what [`FromStr`] accepts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineStatus {
    /// The unit has not started executing.
    Pending,

    /// The unit is currently executing.
    Running,

    /// The unit passed.
    Passed,

    /// An assertion-style failure.
    Failed,

    /// The unit behaved correctly but violated a performance expectation.
    FailedPerformance,

    /// The system under test could not be reached.
    FailedAccess,

    /// The test automation itself failed.
    FailedAutomation,

    /// The outcome could not be determined.
    Inconclusive,

    /// The unit was ignored.
    Ignored,
}

impl EngineStatus {
    /// Returns the wire tokens for all known statuses.
    pub fn variants() -> &'static [&'static str] {
        &[
            "PENDING",
            "RUNNING",
            "PASSED",
            "FAILED",
            "FAILEDPERFORMANCE",
            "FAILEDACCESS",
            "FAILEDAUTOMATION",
            "INCONCLUSIVE",
            "IGNORED",
        ]
    }

    /// Returns true if this is a failure-class status.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            EngineStatus::Failed
                | EngineStatus::FailedPerformance
                | EngineStatus::FailedAccess
                | EngineStatus::FailedAutomation
                | EngineStatus::Inconclusive
        )
    }

    /// Returns true for an ordinary failure: an expected assertion-style or
    /// performance failure, reported to the host as "failed".
    pub fn is_ordinary_failure(self) -> bool {
        matches!(self, EngineStatus::Failed | EngineStatus::FailedPerformance)
    }

    /// Returns true for an error-class failure: any failure that is not
    /// ordinary, reported to the host as "error".
    pub fn is_error(self) -> bool {
        self.is_failure() && !self.is_ordinary_failure()
    }

    pub(crate) fn to_static_str(self) -> &'static str {
        match self {
            EngineStatus::Pending => "PENDING",
            EngineStatus::Running => "RUNNING",
            EngineStatus::Passed => "PASSED",
            EngineStatus::Failed => "FAILED",
            EngineStatus::FailedPerformance => "FAILEDPERFORMANCE",
            EngineStatus::FailedAccess => "FAILEDACCESS",
            EngineStatus::FailedAutomation => "FAILEDAUTOMATION",
            EngineStatus::Inconclusive => "INCONCLUSIVE",
            EngineStatus::Ignored => "IGNORED",
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_static_str())
    }
}

impl FromStr for EngineStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "PENDING" => EngineStatus::Pending,
            "RUNNING" => EngineStatus::Running,
            "PASSED" => EngineStatus::Passed,
            "FAILED" => EngineStatus::Failed,
            "FAILEDPERFORMANCE" => EngineStatus::FailedPerformance,
            "FAILEDACCESS" => EngineStatus::FailedAccess,
            "FAILEDAUTOMATION" => EngineStatus::FailedAutomation,
            "INCONCLUSIVE" => EngineStatus::Inconclusive,
            "IGNORED" => EngineStatus::Ignored,
            other => return Err(StatusParseError::new(other)),
        };
        Ok(status)
    }
}
