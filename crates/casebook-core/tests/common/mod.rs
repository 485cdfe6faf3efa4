#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use casebook_core::{Case, Failure, ReportError, ReportedResult, RunClient};

pub const RUN_URL: &str = "http://localhost:4567/run/1";

/// One call made against the remote API.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateRun { run_name: String, build_id: String },
    Submit { run_id: String, results: Vec<ReportedResult>, accepted: bool },
    CompleteRun { run_id: String },
}

/// Records every call and fails on demand.
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    failing_submits: AtomicUsize,
    fail_create: bool,
    fail_complete: bool,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` submission attempts.
    pub fn failing_submits(self, count: usize) -> Self {
        self.failing_submits.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submit_attempts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Submit { .. }))
            .count()
    }

    /// Results of every accepted batch, in submission order.
    pub fn accepted_batches(&self) -> Vec<Vec<ReportedResult>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Submit { results, accepted: true, .. } => Some(results),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::CompleteRun { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RunClient for RecordingClient {
    fn service_name(&self) -> &str {
        "Recording"
    }

    async fn create_run(&self, run_name: &str, build_id: &str) -> Result<String, ReportError> {
        self.record(Call::CreateRun {
            run_name: run_name.to_string(),
            build_id: build_id.to_string(),
        });
        if self.fail_create {
            return Err(ReportError::ApiError {
                status: 401,
                message: "unauthorized".to_string(),
            });
        }
        Ok(RUN_URL.to_string())
    }

    async fn submit_results(
        &self,
        run_id: &str,
        results: &[ReportedResult],
    ) -> Result<(), ReportError> {
        let fail = self
            .failing_submits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        self.record(Call::Submit {
            run_id: run_id.to_string(),
            results: results.to_vec(),
            accepted: !fail,
        });

        if fail {
            return Err(ReportError::Network("connection reset".to_string()));
        }
        Ok(())
    }

    async fn complete_run(&self, run_id: &str) -> Result<(), ReportError> {
        self.record(Call::CompleteRun {
            run_id: run_id.to_string(),
        });
        if self.fail_complete {
            return Err(ReportError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

pub fn passed_case(name: &str) -> Case {
    let mut case = Case::new("Sample", name, vec![]);
    case.start().unwrap();
    case.pass(Duration::from_millis(2)).unwrap();
    case
}

pub fn failed_case(name: &str, message: &str) -> Case {
    let mut case = Case::new("Sample", name, vec![]);
    case.start().unwrap();
    case.fail(
        Failure::new("FailureException", message).with_stack_trace("at Sample"),
        Duration::from_millis(2),
    )
    .unwrap();
    case
}

pub fn skipped_case(name: &str, reason: Option<&str>) -> Case {
    let mut case = Case::new("Sample", name, vec![]);
    case.skip(reason.map(str::to_string)).unwrap();
    case
}
