use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::thread::{self, ThreadId};

use thiserror::Error;

use super::panic;

/// The cause of a failed case.
///
/// Carries the original error's type name, message and stack trace as they
/// were when the failure was raised. Nothing is prepended or wrapped, so the
/// reported failure reads exactly like the error the test body produced.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Failure {
    type_name: String,
    message: String,
    stack_trace: Option<String>,
}

impl Failure {
    /// Creates a failure with an explicit type name, capturing a backtrace
    /// when `RUST_BACKTRACE` enables one.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: capture_backtrace(),
        }
    }

    /// Creates a failure from any error, keeping its concrete type name.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::new(std::any::type_name::<E>(), error.to_string())
    }

    /// Creates a failure from a panic caught on the current thread, keeping
    /// the panic's location and backtrace.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::from_thread_panic(thread::current().id(), payload)
    }

    /// Creates a failure from a panic raised on `thread`.
    pub(crate) fn from_thread_panic(thread: ThreadId, payload: Box<dyn Any + Send>) -> Self {
        Self {
            stack_trace: panic::take_site(thread),
            ..Self::from_panic_payload(payload)
        }
    }

    /// Creates a failure from a panic payload whose site is unknown.
    pub(crate) fn from_panic_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        Self {
            type_name: PANIC_TYPE_NAME.to_string(),
            message,
            stack_trace: None,
        }
    }

    /// Attaches an explicit stack trace, replacing any captured one.
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The formatted stack trace, empty when none was captured.
    pub fn stack_trace(&self) -> &str {
        self.stack_trace.as_deref().unwrap_or_default()
    }
}

/// Type name given to failures raised by a panic.
pub const PANIC_TYPE_NAME: &str = "panic";

fn capture_backtrace() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

/// Configuration-level errors detected by the invocation bridge.
///
/// These never escape the bridge; they become the case's [`Failure`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error(
        "Async void methods are not supported. Declare async methods with a return type of \
         Task to ensure the task actually runs to completion."
    )]
    AsyncVoid,

    #[error("Could not resolve type parameters for generic method.")]
    UnresolvedTypeParameters,

    #[error(
        "The test returned a non-started task, which cannot be awaited. \
         Consider using Task::run or Task::start."
    )]
    UnstartedTask,

    #[error("Unable to adapt {shape} into a task: {reason}")]
    Adapter { shape: &'static str, reason: String },
}

impl From<InvocationError> for Failure {
    fn from(err: InvocationError) -> Self {
        Failure::from_error(&err)
    }
}
