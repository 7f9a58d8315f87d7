use thiserror::Error;

/// Reasons a submission is rejected by the runner.
///
/// A rejected task is never queued and its body never runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RunnerError {
    /// The runner was cancelled, either explicitly or by a fail-fast task error.
    #[error("runner stopped")]
    Stopped,

    /// `done()` was already called, the queue no longer accepts tasks.
    #[error("runner closed: no more tasks accepted")]
    Closed,
}
