//! Batched, retrying delivery of case results to a [`RunClient`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ReportedResult, RunClient};
use crate::case::{Case, CaseStatus};
use crate::config::ReportingConfig;
use crate::console::Console;

/// Streams completed cases to the remote API for the duration of one run.
///
/// Results are appended to a bounded batch which is submitted as soon as it
/// is full, and once more at run end. A submission is attempted up to
/// `max_attempts` times; if every attempt fails the circuit breaker trips and
/// no further results are sent for the rest of the run. Completing the run
/// is still attempted.
///
/// Failing to create the run disables the pipeline entirely.
///
/// Reporting failures are only ever visible on the console: no method here
/// returns an error to the driver.
pub struct ReportingPipeline {
    client: Box<dyn RunClient>,
    console: Console,
    build_id: String,
    batch_size: usize,
    max_attempts: u32,
    cooldown: Duration,
    /// Written once, by `on_run_start`.
    run_id: OnceLock<String>,
    /// Set when run creation failed or the run has ended.
    disabled: AtomicBool,
    /// The circuit breaker. Written only by the flush.
    api_unavailable: AtomicBool,
    /// Held across a whole append-and-maybe-flush, retries included.
    batch: Mutex<Vec<ReportedResult>>,
}

impl ReportingPipeline {
    /// Creates a pipeline with the default batch size and retry policy.
    pub fn new(client: impl RunClient + 'static, build_id: impl Into<String>, console: Console) -> Self {
        Self::from_boxed(Box::new(client), build_id.into(), console)
    }

    fn from_boxed(client: Box<dyn RunClient>, build_id: String, console: Console) -> Self {
        let defaults = ReportingConfig::default();
        Self {
            client,
            console,
            build_id,
            batch_size: defaults.batch_size,
            max_attempts: defaults.max_attempts,
            cooldown: defaults.retry_cooldown(),
            run_id: OnceLock::new(),
            disabled: AtomicBool::new(false),
            api_unavailable: AtomicBool::new(false),
            batch: Mutex::new(Vec::with_capacity(defaults.batch_size)),
        }
    }

    /// Applies batch size and retry policy from configuration.
    pub fn with_config(mut self, config: &ReportingConfig) -> Self {
        self.batch_size = config.batch_size.max(1);
        self.max_attempts = config.max_attempts.max(1);
        self.cooldown = config.retry_cooldown();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The remote run identifier, once the run has been created.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.get().map(String::as_str)
    }

    /// True once repeated submission failures have tripped the circuit breaker.
    pub fn is_api_unavailable(&self) -> bool {
        self.api_unavailable.load(Ordering::Acquire)
    }

    /// True while results are being collected.
    pub fn is_active(&self) -> bool {
        !self.disabled.load(Ordering::Acquire) && self.run_id.get().is_some()
    }

    /// Creates the remote run. On failure the pipeline stays disabled for
    /// the whole run.
    pub async fn on_run_start(&self, run_name: &str) {
        if self.disabled.load(Ordering::Acquire) {
            return;
        }
        if let Some(run_id) = self.run_id.get() {
            warn!(run_name, run_id = %run_id, "remote test run already created");
            return;
        }

        match self.client.create_run(run_name, &self.build_id).await {
            Ok(run_id) => {
                info!(run_name, run_id = %run_id, "created remote test run");
                if self.run_id.set(run_id).is_err() {
                    warn!(run_name, "remote test run created concurrently, keeping the first");
                }
            }
            Err(err) => {
                self.disabled.store(true, Ordering::Release);
                warn!(run_name, error = %err, "failed to create remote test run");
                self.console.lines([
                    format!(
                        "Failed to create a remote test run via the {} API, so test results will",
                        self.client.service_name()
                    ),
                    format!("not be reported remotely for this run: {}", err),
                    String::new(),
                ]);
            }
        }
    }

    pub async fn on_case_skipped(&self, case: &Case) {
        self.include_case(case, CaseStatus::Skipped).await;
    }

    pub async fn on_case_passed(&self, case: &Case) {
        self.include_case(case, CaseStatus::Passed).await;
    }

    pub async fn on_case_failed(&self, case: &Case) {
        self.include_case(case, CaseStatus::Failed).await;
    }

    /// Dispatches a terminal case to the matching `on_case_*` operation.
    pub async fn on_case_completed(&self, case: &Case) {
        match case.status() {
            CaseStatus::Skipped => self.on_case_skipped(case).await,
            CaseStatus::Passed => self.on_case_passed(case).await,
            CaseStatus::Failed => self.on_case_failed(case).await,
            CaseStatus::Pending => debug!(case = %case.name(), "ignoring pending case"),
        }
    }

    /// Flushes the remaining partial batch and completes the run.
    ///
    /// The run is completed even when the circuit breaker has tripped.
    /// Afterwards the pipeline accepts nothing further.
    pub async fn on_run_end(&self) {
        if !self.is_active() {
            return;
        }
        let Some(run_id) = self.run_id.get() else {
            return;
        };

        {
            let mut batch = self.batch.lock().await;
            if !self.is_api_unavailable() && !batch.is_empty() {
                self.flush(run_id, &mut batch).await;
            }
            self.disabled.store(true, Ordering::Release);
        }

        match self.client.complete_run(run_id).await {
            Ok(()) => info!(run_id = %run_id, "completed remote test run"),
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "failed to complete remote test run");
                self.console.lines([
                    format!(
                        "Failed to complete the remote test run via the {} API: {}",
                        self.client.service_name(),
                        err
                    ),
                    String::new(),
                ]);
            }
        }
    }

    async fn include_case(&self, case: &Case, expected: CaseStatus) {
        if case.status() != expected {
            debug!(case = %case.name(), status = ?case.status(), ?expected, "ignoring case");
            return;
        }
        if let Some(result) = ReportedResult::from_case(case) {
            self.include(result).await;
        }
    }

    async fn include(&self, result: ReportedResult) {
        if !self.is_active() || self.is_api_unavailable() {
            return;
        }
        let Some(run_id) = self.run_id.get() else {
            return;
        };

        let mut batch = self.batch.lock().await;

        // Another caller may have tripped the breaker or ended the run while
        // we waited for the lock.
        if !self.is_active() || self.is_api_unavailable() {
            return;
        }

        batch.push(result);

        if batch.len() >= self.batch_size {
            self.flush(run_id, &mut batch).await;
        }
    }

    /// Submits the batch with bounded retry, tripping the circuit breaker
    /// when every attempt fails. The batch is empty afterwards either way.
    #[tracing::instrument(skip_all, fields(batch_len = batch.len()))]
    async fn flush(&self, run_id: &str, batch: &mut Vec<ReportedResult>) {
        let service = self.client.service_name();

        for attempt in 1..=self.max_attempts {
            match self.client.submit_results(run_id, batch.as_slice()).await {
                Ok(()) => {
                    batch.clear();
                    if attempt > 1 {
                        info!(attempt, "submitted result batch after retrying");
                        self.console.lines([
                            format!(
                                "Successfully submitted test result batch to the {} API on attempt #{}.",
                                service, attempt
                            ),
                            String::new(),
                        ]);
                    } else {
                        debug!("submitted result batch");
                    }
                    return;
                }
                Err(err) => {
                    warn!(attempt, max_attempts = self.max_attempts, error = %err, "failed to submit result batch");
                    self.console.lines([
                        format!(
                            "Failed to submit test result batch to the {} API (attempt #{} of {}): {}",
                            service, attempt, self.max_attempts, err
                        ),
                        String::new(),
                    ]);
                    tokio::time::sleep(self.cooldown).await;
                }
            }
        }

        warn!(
            max_attempts = self.max_attempts,
            discarded = batch.len(),
            "suspending remote result reporting for the rest of the run"
        );
        self.console.lines([
            format!(
                "Due to repeated failures while submitting test results to the {} API,",
                service
            ),
            "further attempts will be suppressed for the remainder of this test run, and".to_string(),
            "subsequent result batches will not be retried. Full test results will continue".to_string(),
            "to be reported to this console and to the test process exit code, but the".to_string(),
            "remote test run summary will be incomplete.".to_string(),
            String::new(),
        ]);

        self.api_unavailable.store(true, Ordering::Release);
        batch.clear();
    }
}

impl std::fmt::Debug for ReportingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportingPipeline")
            .field("service", &self.client.service_name())
            .field("build_id", &self.build_id)
            .field("batch_size", &self.batch_size)
            .field("max_attempts", &self.max_attempts)
            .field("run_id", &self.run_id.get())
            .field("api_unavailable", &self.is_api_unavailable())
            .finish_non_exhaustive()
    }
}
