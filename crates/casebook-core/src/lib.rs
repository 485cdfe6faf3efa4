pub mod case;
pub mod config;
pub mod console;
pub mod invoke;
pub mod report;
pub mod runner;
pub mod sample;

pub use case::{Case, CaseError, CaseStatus};
pub use config::{Config, ConfigError, ExecutionConfig, ReportingConfig};
pub use console::{CapturedOutput, Console};
pub use invoke::{
    Arg, Deferred, Failure, InvocationBridge, InvocationError, InvocationOutcome, ReturnShape,
    Signature, Task, TestMethod, Value,
};
pub use report::{
    AzureDevOpsClient, ReportError, ReportedOutcome, ReportedResult, ReportingPipeline, RunClient,
};
pub use runner::{PlannedCase, RunSummary, Runner};
