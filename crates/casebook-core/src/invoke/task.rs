use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::{JoinError, JoinHandle};

use super::error::{Failure, InvocationError};
use super::panic;
use super::Value;

/// What a task-like value resolves to once it reaches a terminal state.
pub type TaskResult = Result<Option<Value>, Failure>;

/// A native handle to a unit of asynchronous work.
///
/// A task is either unstarted (created but never scheduled) or scheduled on
/// the ambient tokio runtime. Only scheduled tasks can be awaited by the
/// invocation bridge.
pub struct Task {
    state: TaskState,
}

enum TaskState {
    Created(BoxFuture<'static, TaskResult>),
    Scheduled(JoinHandle<TaskResult>),
}

impl Task {
    /// Creates a task without scheduling it.
    pub fn new<F, T>(work: F) -> Self
    where
        F: Future<Output = Result<T, Failure>> + Send + 'static,
        T: Any + Send,
    {
        Self {
            state: TaskState::Created(boxed(work)),
        }
    }

    /// Creates a task and schedules it immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run<F, T>(work: F) -> Self
    where
        F: Future<Output = Result<T, Failure>> + Send + 'static,
        T: Any + Send,
    {
        Self::new(work).start()
    }

    /// Schedules an already boxed future.
    pub(crate) fn spawn_boxed(work: BoxFuture<'static, TaskResult>) -> Self {
        panic::install();
        Self {
            state: TaskState::Scheduled(tokio::spawn(work)),
        }
    }

    /// Wraps a join handle for work that is already running.
    pub(crate) fn from_handle(handle: JoinHandle<TaskResult>) -> Self {
        Self {
            state: TaskState::Scheduled(handle),
        }
    }

    /// Schedules the task if it has not been started yet.
    pub fn start(self) -> Self {
        match self.state {
            TaskState::Created(work) => Self::spawn_boxed(work),
            scheduled => Self { state: scheduled },
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state, TaskState::Scheduled(_))
    }

    /// Suspends until the task reaches a terminal state.
    pub(crate) async fn wait(self) -> TaskResult {
        match self.state {
            TaskState::Created(_) => Err(InvocationError::UnstartedTask.into()),
            TaskState::Scheduled(handle) => match handle.await {
                Ok(result) => result,
                Err(err) => Err(join_failure(err)),
            },
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("started", &self.is_started())
            .finish()
    }
}

/// Boxes `work`, turning a panic while it is polled into the failure it
/// carried. The panic is caught on the thread that raised it, so its site is
/// kept.
pub(crate) fn boxed<F, T>(work: F) -> BoxFuture<'static, TaskResult>
where
    F: Future<Output = Result<T, Failure>> + Send + 'static,
    T: Any + Send,
{
    AssertUnwindSafe(work)
        .catch_unwind()
        .map(|caught| match caught {
            Ok(result) => result.map(|value| Some(Box::new(value) as Value)),
            Err(payload) => Err(Failure::from_panic(payload)),
        })
        .boxed()
}

/// A panicking task fails with its panic payload; a cancelled one with the
/// join error itself.
pub(crate) fn join_failure(err: JoinError) -> Failure {
    if err.is_panic() {
        Failure::from_panic_payload(err.into_panic())
    } else {
        Failure::from_error(&err)
    }
}
