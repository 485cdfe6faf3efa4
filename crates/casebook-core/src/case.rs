use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::invoke::{Arg, Failure, InvocationOutcome, Value};

/// Where a case is in its lifecycle.
///
/// Cases move exactly once from `Pending` to one of the terminal states:
/// Pending → Skipped | Passed | Failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    /// Created, not yet resolved
    #[default]
    Pending,
    /// Skipped by the driver before invocation
    Skipped,
    /// Invocation completed
    Passed,
    /// Invocation failed
    Failed,
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CaseStatus::Pending)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::Skipped => "skipped",
            CaseStatus::Passed => "passed",
            CaseStatus::Failed => "failed",
        }
    }
}

/// One invocation of one test method with a fixed argument list.
///
/// Mutated only by the driver that owns it. Once a terminal status is
/// assigned every setter returns [`CaseError::AlreadyTerminal`].
#[derive(Debug)]
pub struct Case {
    type_name: String,
    method_name: String,
    arguments: Vec<Arg>,
    started_at: Option<DateTime<Utc>>,
    duration: Option<Duration>,
    output: Option<String>,
    status: CaseStatus,
    failure: Option<Failure>,
    skip_reason: Option<String>,
}

impl Case {
    pub fn new(
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        arguments: Vec<Arg>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
            arguments,
            started_at: None,
            duration: None,
            output: None,
            status: CaseStatus::Pending,
            failure: None,
            skip_reason: None,
        }
    }

    /// Full display name, e.g. `Calculator.adds(1, 2)`.
    ///
    /// Arguments are rendered as JSON; the parentheses are omitted when there
    /// are none.
    pub fn name(&self) -> String {
        let base = format!("{}.{}", self.type_name, self.method_name);
        if self.arguments.is_empty() {
            return base;
        }

        let args = self
            .arguments
            .iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", base, args)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn arguments(&self) -> &[Arg] {
        &self.arguments
    }

    pub fn status(&self) -> CaseStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Elapsed time, set together with the terminal status.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// Records the invocation start time.
    pub fn start(&mut self) -> Result<(), CaseError> {
        self.ensure_pending()?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Stores captured standard output/error text.
    pub fn record_output(&mut self, output: impl Into<String>) -> Result<(), CaseError> {
        self.ensure_pending()?;
        self.output = Some(output.into());
        Ok(())
    }

    /// Skips the case. Skipped cases take no time.
    pub fn skip(&mut self, reason: Option<String>) -> Result<(), CaseError> {
        self.ensure_pending()?;
        self.status = CaseStatus::Skipped;
        self.skip_reason = reason;
        self.duration = Some(Duration::ZERO);
        Ok(())
    }

    pub fn pass(&mut self, elapsed: Duration) -> Result<(), CaseError> {
        self.ensure_pending()?;
        self.status = CaseStatus::Passed;
        self.duration = Some(elapsed);
        Ok(())
    }

    pub fn fail(&mut self, failure: Failure, elapsed: Duration) -> Result<(), CaseError> {
        self.ensure_pending()?;
        self.status = CaseStatus::Failed;
        self.failure = Some(failure);
        self.duration = Some(elapsed);
        Ok(())
    }

    /// Applies the bridge's outcome, handing back any completed payload.
    pub fn resolve(
        &mut self,
        outcome: InvocationOutcome,
        elapsed: Duration,
    ) -> Result<Option<Value>, CaseError> {
        match outcome {
            InvocationOutcome::Completed(value) => {
                self.pass(elapsed)?;
                Ok(value)
            }
            InvocationOutcome::Failed(failure) => {
                self.fail(failure, elapsed)?;
                Ok(None)
            }
        }
    }

    fn ensure_pending(&self) -> Result<(), CaseError> {
        if self.status.is_terminal() {
            return Err(CaseError::AlreadyTerminal {
                name: self.name(),
                status: self.status,
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("Case {name} is already {}", status.display_name())]
    AlreadyTerminal { name: String, status: CaseStatus },
}
