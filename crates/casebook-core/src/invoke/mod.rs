//! Invocation bridge.
//!
//! Invokes a test method whatever its calling convention and resolves it to
//! exactly one [`InvocationOutcome`]:
//!
//! - plain bodies returning nothing or an immediate value,
//! - bodies returning a native [`Task`] (with or without a payload),
//! - bodies returning a foreign async shape claimed by an [`AsyncAdapter`].
//!
//! Every error path, configuration errors included, ends up as
//! [`InvocationOutcome::Failed`] carrying the original cause.

mod adapter;
mod error;
mod panic;
mod task;

pub use adapter::{AdapterRegistry, AsyncAdapter, Deferred, DeferredAdapter, Resolved, ThreadAdapter};
pub use error::{Failure, InvocationError, PANIC_TYPE_NAME};
pub use task::{Task, TaskResult};

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

/// A single argument applied to a test method.
pub type Arg = serde_json::Value;

/// A dynamically typed result payload.
pub type Value = Box<dyn Any + Send>;

type Body = Arc<dyn Fn(&[Arg]) -> Result<Option<Value>, Failure> + Send + Sync>;

/// The declared return shape of a test method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnShape {
    /// Returns nothing.
    #[default]
    Unit,
    /// Returns an arbitrary value. A task returned through this shape is
    /// still awaited, but its payload is not extracted.
    Value,
    /// Returns a task without a payload.
    Task,
    /// Returns a task whose payload is the case's result.
    TaskOf,
}

/// What is known about a test method before it is invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signature {
    pub returns: ReturnShape,
    /// The body itself is asynchronous.
    pub async_body: bool,
    /// The method is generic and its type parameters could not be resolved.
    pub unresolved_type_params: bool,
}

impl Signature {
    pub fn returning(returns: ReturnShape) -> Self {
        Self {
            returns,
            ..Self::default()
        }
    }

    pub fn with_async_body(mut self) -> Self {
        self.async_body = true;
        self
    }

    pub fn with_unresolved_type_params(mut self) -> Self {
        self.unresolved_type_params = true;
        self
    }
}

/// A callable test method.
#[derive(Clone)]
pub struct TestMethod {
    type_name: String,
    name: String,
    signature: Signature,
    body: Body,
}

impl TestMethod {
    /// Creates a method from a raw body.
    pub fn new<F>(
        type_name: impl Into<String>,
        name: impl Into<String>,
        signature: Signature,
        body: F,
    ) -> Self
    where
        F: Fn(&[Arg]) -> Result<Option<Value>, Failure> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            signature,
            body: Arc::new(body),
        }
    }

    /// A method that returns nothing.
    pub fn sync<F>(type_name: impl Into<String>, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Arg]) -> Result<(), Failure> + Send + Sync + 'static,
    {
        Self::new(type_name, name, Signature::default(), move |args| {
            body(args).map(|()| None)
        })
    }

    /// A method that returns an immediate value.
    pub fn returning<F, T>(type_name: impl Into<String>, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Arg]) -> Result<T, Failure> + Send + Sync + 'static,
        T: Any + Send,
    {
        Self::new(
            type_name,
            name,
            Signature::returning(ReturnShape::Value),
            move |args| body(args).map(|value| Some(Box::new(value) as Value)),
        )
    }

    /// A method that returns a task (or `None`) without a payload.
    pub fn task<F, R>(type_name: impl Into<String>, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Arg]) -> Result<R, Failure> + Send + Sync + 'static,
        R: Into<Option<Task>>,
    {
        Self::with_task_body(type_name, name, ReturnShape::Task, body)
    }

    /// A method that returns a task whose payload is the result.
    pub fn task_of<F, R>(type_name: impl Into<String>, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Arg]) -> Result<R, Failure> + Send + Sync + 'static,
        R: Into<Option<Task>>,
    {
        Self::with_task_body(type_name, name, ReturnShape::TaskOf, body)
    }

    fn with_task_body<F, R>(
        type_name: impl Into<String>,
        name: impl Into<String>,
        returns: ReturnShape,
        body: F,
    ) -> Self
    where
        F: Fn(&[Arg]) -> Result<R, Failure> + Send + Sync + 'static,
        R: Into<Option<Task>>,
    {
        Self::new(
            type_name,
            name,
            Signature::returning(returns).with_async_body(),
            move |args| {
                body(args).map(|task| task.into().map(|task| Box::new(task) as Value))
            },
        )
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Calls the body, turning a panic into the failure it carried.
    fn call(&self, args: &[Arg]) -> Result<Option<Value>, Failure> {
        panic::install();
        match catch_unwind(AssertUnwindSafe(|| (self.body)(args))) {
            Ok(result) => result,
            Err(payload) => Err(Failure::from_panic(payload)),
        }
    }
}

impl fmt::Debug for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMethod")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// The result of invoking one test method.
#[derive(Debug)]
pub enum InvocationOutcome {
    Completed(Option<Value>),
    Failed(Failure),
}

impl InvocationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, InvocationOutcome::Completed(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            InvocationOutcome::Failed(failure) => Some(failure),
            InvocationOutcome::Completed(_) => None,
        }
    }

    /// The completed payload, if it is a `T`.
    pub fn value<T: Any>(&self) -> Option<&T> {
        match self {
            InvocationOutcome::Completed(Some(value)) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl From<Result<Option<Value>, Failure>> for InvocationOutcome {
    fn from(result: Result<Option<Value>, Failure>) -> Self {
        match result {
            Ok(value) => InvocationOutcome::Completed(value),
            Err(failure) => InvocationOutcome::Failed(failure),
        }
    }
}

/// Invokes test methods and awaits whatever they return.
///
/// Holds no mutable state, so one bridge can serve concurrent cases.
#[derive(Clone, Default)]
pub struct InvocationBridge {
    adapters: AdapterRegistry,
}

impl InvocationBridge {
    /// Creates a bridge with the built-in adapters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapters(adapters: AdapterRegistry) -> Self {
        Self { adapters }
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub async fn invoke(&self, method: &TestMethod, args: &[Arg]) -> InvocationOutcome {
        let outcome = InvocationOutcome::from(self.execute(method, args).await);
        debug!(
            type_name = method.type_name(),
            method = method.name(),
            completed = outcome.is_completed(),
            "invocation resolved"
        );
        outcome
    }

    async fn execute(&self, method: &TestMethod, args: &[Arg]) -> TaskResult {
        let signature = method.signature();

        if signature.returns == ReturnShape::Unit && signature.async_body {
            return Err(InvocationError::AsyncVoid.into());
        }

        if signature.unresolved_type_params {
            return Err(InvocationError::UnresolvedTypeParameters.into());
        }

        let Some(returned) = method.call(args)? else {
            return Ok(None);
        };

        if returned.is::<()>() {
            return Ok(None);
        }

        let task = match self.adapters.resolve(returned)? {
            Resolved::Task(task) => task,
            Resolved::Immediate(value) => return Ok(Some(value)),
        };

        if !task.is_started() {
            return Err(InvocationError::UnstartedTask.into());
        }

        let payload = task.wait().await?;

        if signature.returns == ReturnShape::TaskOf {
            Ok(payload.filter(|value| !value.is::<()>()))
        } else {
            Ok(None)
        }
    }
}
