use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::case::{Case, CaseStatus};
use crate::config::ExecutionConfig;
use crate::console::Console;
use crate::invoke::{Arg, InvocationBridge, TestMethod};
use crate::report::ReportingPipeline;

/// A case the runner has been asked to execute.
#[derive(Debug, Clone)]
pub struct PlannedCase {
    pub method: Arc<TestMethod>,
    pub arguments: Vec<Arg>,
    /// `Some` skips the case without invoking it, with an optional reason.
    pub skip: Option<Option<String>>,
}

impl PlannedCase {
    pub fn new(method: Arc<TestMethod>) -> Self {
        Self {
            method,
            arguments: Vec::new(),
            skip: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Arg>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn skipped(mut self, reason: Option<&str>) -> Self {
        self.skip = Some(reason.map(str::to_string));
        self
    }
}

/// Counts for a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// Process exit code: non-zero when any case failed.
    ///
    /// Remote reporting has no influence on it.
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 {
            0
        } else {
            1
        }
    }

    fn record(&mut self, case: &Case) {
        match case.status() {
            CaseStatus::Passed => self.passed += 1,
            CaseStatus::Failed => self.failed += 1,
            CaseStatus::Skipped => self.skipped += 1,
            CaseStatus::Pending => {}
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped, took {:.2} seconds",
            self.passed,
            self.failed,
            self.skipped,
            self.duration.as_secs_f64()
        )
    }
}

/// Drives a run: invokes each case through the bridge, records the outcome
/// on its lifecycle, and hands completed cases to the reporting pipeline.
///
/// Cases are reported in plan order even when invocations overlap.
pub struct Runner {
    bridge: InvocationBridge,
    reporter: Option<Arc<ReportingPipeline>>,
    console: Console,
    parallelism: usize,
}

impl Runner {
    pub fn new(console: Console) -> Self {
        Self {
            bridge: InvocationBridge::new(),
            reporter: None,
            console,
            parallelism: 1,
        }
    }

    pub fn with_bridge(mut self, bridge: InvocationBridge) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<ReportingPipeline>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_config(mut self, config: &ExecutionConfig) -> Self {
        self.parallelism = config.parallelism.max(1);
        self
    }

    /// Runs every planned case and returns the summary.
    pub async fn run(&self, run_name: &str, plan: Vec<PlannedCase>) -> RunSummary {
        info!(run_name, cases = plan.len(), "starting run");

        if let Some(reporter) = &self.reporter {
            reporter.on_run_start(run_name).await;
        }

        let started = Instant::now();
        let mut summary = RunSummary::default();

        let mut executions = stream::iter(plan)
            .map(|planned| self.execute(planned))
            .buffered(self.parallelism);

        while let Some(case) = executions.next().await {
            self.write_case(&case);
            summary.record(&case);

            if let Some(reporter) = &self.reporter {
                reporter.on_case_completed(&case).await;
            }
        }

        summary.duration = started.elapsed();

        if let Some(reporter) = &self.reporter {
            reporter.on_run_end().await;
        }

        self.console.line(summary.to_string());
        info!(run_name, %summary, "finished run");

        summary
    }

    /// Executes one planned case to a terminal status.
    pub async fn execute(&self, planned: PlannedCase) -> Case {
        let PlannedCase {
            method,
            arguments,
            skip,
        } = planned;

        let mut case = Case::new(method.type_name(), method.name(), arguments);

        if let Some(reason) = skip {
            if let Err(err) = case.skip(reason) {
                warn!(error = %err, "could not skip case");
            }
            return case;
        }

        if let Err(err) = case.start() {
            warn!(error = %err, "could not start case");
            return case;
        }

        let started = Instant::now();
        let outcome = self.bridge.invoke(&method, case.arguments()).await;

        if let Err(err) = case.resolve(outcome, started.elapsed()) {
            warn!(error = %err, "could not resolve case");
        }

        case
    }

    fn write_case(&self, case: &Case) {
        match case.status() {
            CaseStatus::Failed => {
                let message = case.failure().map(|f| f.message()).unwrap_or_default();
                self.console.line(format!("Test '{}' failed: {}", case.name(), message));
            }
            CaseStatus::Skipped => match case.skip_reason() {
                Some(reason) => self
                    .console
                    .line(format!("Test '{}' skipped: {}", case.name(), reason)),
                None => self.console.line(format!("Test '{}' skipped", case.name())),
            },
            CaseStatus::Passed | CaseStatus::Pending => {}
        }
    }
}
