//! Registry of foreign async shapes the bridge knows how to await.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle as ThreadHandle;

use futures::future::BoxFuture;
use tokio::runtime::Handle;

use super::error::{Failure, InvocationError};
use super::task::{boxed, join_failure, Task, TaskResult};
use super::Value;

/// How a returned value was classified.
#[derive(Debug)]
pub enum Resolved {
    /// The value represents pending asynchronous work.
    Task(Task),
    /// The value is the immediate result.
    Immediate(Value),
}

/// Converts one foreign async abstraction into a native [`Task`].
///
/// Adapters receive ownership of the returned value and must hand it back
/// untouched as [`Resolved::Immediate`] when they do not recognize it.
pub trait AsyncAdapter: Send + Sync {
    /// Human-readable name of the recognized shape.
    fn shape_name(&self) -> &'static str;

    fn adapt(&self, value: Value) -> Result<Resolved, Failure>;
}

/// A cold asynchronous computation that does nothing until started.
///
/// Unlike [`Task::new`], returning a `Deferred` is never an error: the
/// bridge starts it as a task, the same way a start-as-task wrapper is
/// converted before being awaited.
pub struct Deferred {
    work: BoxFuture<'static, TaskResult>,
}

impl Deferred {
    pub fn new<F, T>(work: F) -> Self
    where
        F: Future<Output = Result<T, Failure>> + Send + 'static,
        T: Any + Send,
    {
        Self { work: boxed(work) }
    }

    /// Starts the computation on the ambient runtime.
    ///
    /// Fails instead of panicking when there is no runtime to start it on.
    pub fn start_as_task(self) -> Result<Task, Failure> {
        ambient_runtime("Deferred")?;
        Ok(Task::spawn_boxed(self.work))
    }
}

/// Recognizes [`Deferred`].
#[derive(Debug, Default)]
pub struct DeferredAdapter;

impl AsyncAdapter for DeferredAdapter {
    fn shape_name(&self) -> &'static str {
        "Deferred"
    }

    fn adapt(&self, value: Value) -> Result<Resolved, Failure> {
        match value.downcast::<Deferred>() {
            Ok(deferred) => deferred.start_as_task().map(Resolved::Task),
            Err(value) => Ok(Resolved::Immediate(value)),
        }
    }
}

/// Recognizes `std::thread::JoinHandle<()>`.
///
/// The thread is already running; joining happens on the blocking pool so
/// the awaiting case does not hold a runtime worker.
#[derive(Debug, Default)]
pub struct ThreadAdapter;

impl AsyncAdapter for ThreadAdapter {
    fn shape_name(&self) -> &'static str {
        "std::thread::JoinHandle<()>"
    }

    fn adapt(&self, value: Value) -> Result<Resolved, Failure> {
        let thread = match value.downcast::<ThreadHandle<()>>() {
            Ok(thread) => thread,
            Err(value) => return Ok(Resolved::Immediate(value)),
        };

        let runtime = ambient_runtime(self.shape_name())?;
        let thread_id = thread.thread().id();

        let joined = runtime.spawn_blocking(move || -> TaskResult {
            match thread.join() {
                Ok(()) => Ok(None),
                Err(payload) => Err(Failure::from_thread_panic(thread_id, payload)),
            }
        });

        let handle = runtime.spawn(async move {
            match joined.await {
                Ok(result) => result,
                Err(err) => Err(join_failure(err)),
            }
        });

        Ok(Resolved::Task(Task::from_handle(handle)))
    }
}

fn ambient_runtime(shape: &'static str) -> Result<Handle, Failure> {
    Handle::try_current().map_err(|err| {
        Failure::from(InvocationError::Adapter {
            shape,
            reason: err.to_string(),
        })
    })
}

/// The closed set of async shapes the bridge will await.
///
/// Native [`Task`]s are always recognized; anything else must be claimed
/// by a registered adapter, tried in registration order.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn AsyncAdapter>>,
}

impl AdapterRegistry {
    /// Create a registry with all built-in adapters.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(DeferredAdapter));
        registry.register(Arc::new(ThreadAdapter));
        registry
    }

    /// Create a registry that only recognizes native tasks.
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn AsyncAdapter>) {
        self.adapters.push(adapter);
    }

    /// Names of the registered foreign shapes.
    pub fn shape_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.shape_name()).collect()
    }

    /// Classify a returned value as pending work or an immediate result.
    pub fn resolve(&self, value: Value) -> Result<Resolved, Failure> {
        let mut value = match value.downcast::<Task>() {
            Ok(task) => return Ok(Resolved::Task(*task)),
            Err(value) => value,
        };

        for adapter in &self.adapters {
            match adapter.adapt(value)? {
                Resolved::Task(task) => return Ok(Resolved::Task(task)),
                Resolved::Immediate(declined) => value = declined,
            }
        }

        Ok(Resolved::Immediate(value))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
