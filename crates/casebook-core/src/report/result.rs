use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::case::{Case, CaseStatus};
use crate::invoke::Failure;

/// Outcome tag understood by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportedOutcome {
    Passed,
    Failed,
    /// Used for skipped cases.
    Warning,
}

/// Wire-shaped projection of a completed case.
///
/// Field names are fixed by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedResult {
    pub automated_test_name: String,
    pub test_case_title: String,
    pub duration_in_ms: f64,
    pub outcome: ReportedOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl ReportedResult {
    fn new(name: String, duration: Duration, outcome: ReportedOutcome) -> Self {
        Self {
            automated_test_name: name.clone(),
            test_case_title: name,
            duration_in_ms: duration.as_nanos() as f64 / 1_000_000.0,
            outcome,
            error_message: None,
            stack_trace: None,
        }
    }

    pub fn skipped(name: impl Into<String>, duration: Duration, reason: Option<&str>) -> Self {
        Self {
            error_message: reason.map(str::to_string),
            ..Self::new(name.into(), duration, ReportedOutcome::Warning)
        }
    }

    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self::new(name.into(), duration, ReportedOutcome::Passed)
    }

    /// The stack trace is the failure's type name on its own line, followed
    /// by its formatted stack trace.
    pub fn failed(name: impl Into<String>, duration: Duration, failure: &Failure) -> Self {
        Self {
            error_message: Some(failure.message().to_string()),
            stack_trace: Some(format!("{}\n{}", failure.type_name(), failure.stack_trace())),
            ..Self::new(name.into(), duration, ReportedOutcome::Failed)
        }
    }

    /// Projects a terminal case. Pending cases have no projection.
    pub fn from_case(case: &Case) -> Option<Self> {
        let duration = case.duration().unwrap_or_default();
        match case.status() {
            CaseStatus::Pending => None,
            CaseStatus::Skipped => Some(Self::skipped(case.name(), duration, case.skip_reason())),
            CaseStatus::Passed => Some(Self::passed(case.name(), duration)),
            CaseStatus::Failed => case
                .failure()
                .map(|failure| Self::failed(case.name(), duration, failure)),
        }
    }
}
