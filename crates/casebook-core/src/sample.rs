//! A small built-in suite exercising every outcome the runner can produce.
//!
//! Used by `casebook demo` and by the end-to-end tests.

use std::sync::Arc;
use std::time::Duration;

use crate::invoke::{Deferred, Failure, ReturnShape, Signature, Task, TestMethod, Value};
use crate::runner::PlannedCase;

pub const SAMPLE_TYPE: &str = "Casebook.Tests.Sample";

/// Reason attached to `SkipWithReason`.
pub const SKIP_REASON: &str = "⚠ Skipped with reason.";

fn failure_for(member: &str) -> Failure {
    Failure::new("Casebook.Tests.FailureException", format!("'{}' failed!", member))
        .with_stack_trace(format!("   at {}.{}()", SAMPLE_TYPE, member))
}

fn should_be<T: PartialEq + std::fmt::Display>(actual: T, expected: T) -> Result<(), Failure> {
    if actual == expected {
        return Ok(());
    }
    Err(Failure::new(
        "Casebook.Tests.Assertions.AssertException",
        format!("Expected: {}\nActual:   {}", expected, actual),
    ))
}

async fn divide(numerator: i32, denominator: i32) -> Result<i32, Failure> {
    tokio::time::sleep(Duration::from_millis(1)).await;
    numerator
        .checked_div(denominator)
        .ok_or_else(|| Failure::new("DivideByZeroException", "Attempted to divide by zero."))
}

fn planned(method: TestMethod) -> PlannedCase {
    PlannedCase::new(Arc::new(method))
}

/// The five synchronous cases: two failures, a pass and two skips.
pub fn basic_plan() -> Vec<PlannedCase> {
    vec![
        planned(TestMethod::sync(SAMPLE_TYPE, "Fail", |_| {
            Err(failure_for("Fail"))
        })),
        planned(TestMethod::sync(SAMPLE_TYPE, "FailByAssertion", |_| {
            should_be(1, 2)
        })),
        planned(TestMethod::sync(SAMPLE_TYPE, "Pass", |_| Ok(()))),
        planned(TestMethod::sync(SAMPLE_TYPE, "SkipWithReason", |_| {
            Err(failure_for("SkipWithReason"))
        }))
        .skipped(Some(SKIP_REASON)),
        planned(TestMethod::sync(SAMPLE_TYPE, "SkipWithoutReason", |_| {
            Err(failure_for("SkipWithoutReason"))
        }))
        .skipped(None),
    ]
}

/// Cases returning asynchronous work in each supported shape.
pub fn async_plan() -> Vec<PlannedCase> {
    vec![
        planned(TestMethod::task(SAMPLE_TYPE, "AwaitThenPass", |_| {
            Ok(Task::run(async { should_be(divide(15, 5).await?, 3) }))
        })),
        planned(TestMethod::task_of(SAMPLE_TYPE, "AwaitResultThenPass", |_| {
            Ok(Task::run(async {
                should_be(divide(15, 5).await?, 3)?;
                Ok::<_, Failure>(true)
            }))
        })),
        planned(TestMethod::task(SAMPLE_TYPE, "AwaitThenFail", |_| {
            Ok(Task::run(async { should_be(divide(15, 5).await?, 0) }))
        })),
        planned(TestMethod::task(SAMPLE_TYPE, "DivideByZero", |_| {
            Ok(Task::run(async { should_be(divide(15, 0).await?, 0) }))
        })),
        planned(TestMethod::task(SAMPLE_TYPE, "NonStartedTask", |_| {
            Ok(Task::new(async { should_be(divide(15, 5).await?, 3) }))
        })),
        planned(TestMethod::new(
            SAMPLE_TYPE,
            "DeferredThenPass",
            Signature::returning(ReturnShape::TaskOf),
            |_| {
                let deferred = Deferred::new(async { divide(12, 4).await });
                Ok(Some(Box::new(deferred) as Value))
            },
        )),
        planned(TestMethod::new(
            SAMPLE_TYPE,
            "ThreadThenPass",
            Signature::returning(ReturnShape::Task),
            |_| {
                let handle = std::thread::spawn(|| std::thread::sleep(Duration::from_millis(1)));
                Ok(Some(Box::new(handle) as Value))
            },
        )),
    ]
}

/// The full demo suite.
pub fn demo_plan() -> Vec<PlannedCase> {
    let mut plan = basic_plan();
    plan.extend(async_plan());
    plan
}
