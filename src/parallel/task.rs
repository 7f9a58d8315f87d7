use anyhow::{Result, anyhow};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Body of a task; receives the id of the worker executing it.
pub type TaskFn = Box<dyn FnOnce(usize) -> Result<()> + Send + 'static>;

/// Callback invoked on the worker thread when the task body fails.
pub type OnErrorFn = Box<dyn FnOnce(&anyhow::Error) + Send + 'static>;

/// A unit of work waiting in (or taken from) the runner queue
pub(crate) struct Task {
    pub(crate) sequence: u32,
    body: TaskFn,
    on_error: Option<OnErrorFn>,
}

impl Task {
    pub(crate) fn new(sequence: u32, body: TaskFn, on_error: Option<OnErrorFn>) -> Self {
        Self {
            sequence,
            body,
            on_error,
        }
    }

    /// Run the body on the current thread, turning a panic into an error.
    ///
    /// Returns the error callback alongside the outcome so the worker can
    /// record the error before handing it to the callback.
    pub(crate) fn execute(self, worker_id: usize) -> (Result<()>, Option<OnErrorFn>) {
        let Task { body, on_error, .. } = self;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| body(worker_id))) {
            Ok(result) => result,
            Err(payload) => Err(anyhow!("task panicked: {}", panic_message(&payload))),
        };
        (outcome, on_error)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("sequence", &self.sequence)
            .field("has_on_error", &self.on_error.is_some())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
