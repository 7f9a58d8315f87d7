use super::error::RunnerError;
use super::notify::FinishNotifier;
use super::task::{OnErrorFn, Task, TaskFn, panic_message};
use crate::config::RunnerConfig;
use anyhow::Result;
use crossbeam::channel::{Receiver, Sender, bounded, select};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const DEFAULT_FINISH_GRACE: Duration = Duration::from_secs(1);

/// Bounded, cancellable pool of worker threads fed from a FIFO queue.
///
/// `Runner` is a handle: clones share the same queue, workers and
/// bookkeeping, so producers and observers on other threads can hold their
/// own copy.
///
/// ```rust
/// use parallel_runner::parallel::Runner;
///
/// let runner = Runner::new(4, 16, false);
/// for i in 0..10 {
///     runner.add_task(move |_worker_id| {
///         anyhow::ensure!(i != 7, "seven is unlucky");
///         Ok(())
///     })?;
/// }
/// runner.done();
/// runner.run();
///
/// assert_eq!(runner.errors().len(), 1);
/// assert!(runner.errors().contains_key(&7));
/// # Ok::<(), parallel_runner::parallel::RunnerError>(())
/// ```
#[derive(Clone)]
pub struct Runner {
    inner: Arc<Inner>,
}

struct Inner {
    // `None` once `done()` closed the queue
    tasks_tx: Mutex<Option<Sender<Task>>>,
    tasks_rx: Receiver<Task>,
    capacity: usize,
    sequence: AtomicU32,

    cancelled: AtomicBool,
    cancel_once: Once,
    // Dropped on cancel to wake producers blocked on a full queue
    cancel_tx: Mutex<Option<Sender<()>>>,
    cancel_rx: Receiver<()>,
    fail_fast: bool,

    pool: Mutex<WorkerPool>,
    next_worker_id: AtomicUsize,
    handles: Mutex<Vec<JoinHandle<()>>>,

    active: AtomicUsize,
    // Submitted but not yet completed (queued + in flight)
    queued: AtomicUsize,
    started: AtomicU32,

    errors: Mutex<HashMap<u32, Arc<anyhow::Error>>>,
    finish: Mutex<FinishNotifier>,
    finish_grace: Duration,
}

/// Worker counts that must be read and written together
struct WorkerPool {
    max_parallel: usize,
    open: usize,
    running: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Task code never runs under these locks, so a poisoned guard still holds
    // consistent data.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Runner {
    /// Create a runner with `max_parallel` workers and a queue of `capacity`
    /// tasks. Both are clamped to at least 1. With `fail_fast` the first task
    /// error cancels the runner.
    pub fn new(max_parallel: usize, capacity: usize, fail_fast: bool) -> Self {
        Self::build(max_parallel, capacity, fail_fast, DEFAULT_FINISH_GRACE)
    }

    /// Runner with a single-slot queue: a submission only completes once a
    /// worker has room to take the task.
    pub fn new_bounded(max_parallel: usize, fail_fast: bool) -> Self {
        Self::new(max_parallel, 1, fail_fast)
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::build(
            config.resolved_max_parallel(),
            config.capacity,
            config.fail_fast,
            config.finish_grace_period(),
        )
    }

    fn build(max_parallel: usize, capacity: usize, fail_fast: bool, finish_grace: Duration) -> Self {
        let max_parallel = max_parallel.max(1);
        let capacity = capacity.max(1);
        let (tasks_tx, tasks_rx) = bounded(capacity);
        let (cancel_tx, cancel_rx) = bounded(0);

        tracing::debug!(max_parallel, capacity, fail_fast, "Creating runner");

        Self {
            inner: Arc::new(Inner {
                tasks_tx: Mutex::new(Some(tasks_tx)),
                tasks_rx,
                capacity,
                sequence: AtomicU32::new(0),
                cancelled: AtomicBool::new(false),
                cancel_once: Once::new(),
                cancel_tx: Mutex::new(Some(cancel_tx)),
                cancel_rx,
                fail_fast,
                pool: Mutex::new(WorkerPool {
                    max_parallel,
                    open: 0,
                    running: false,
                }),
                next_worker_id: AtomicUsize::new(0),
                handles: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
                started: AtomicU32::new(0),
                errors: Mutex::new(HashMap::new()),
                finish: Mutex::new(FinishNotifier::new()),
                finish_grace,
            }),
        }
    }

    /// Queue a task, blocking while the queue is full.
    ///
    /// Returns the task's sequence number, which keys its entry in
    /// [`errors`](Self::errors) if it fails.
    pub fn add_task<F>(&self, body: F) -> Result<u32, RunnerError>
    where
        F: FnOnce(usize) -> Result<()> + Send + 'static,
    {
        self.submit(Box::new(body), None)
    }

    /// Like [`add_task`](Self::add_task), calling `on_error` on the worker
    /// thread if the task fails.
    pub fn add_task_with_error<F, E>(&self, body: F, on_error: E) -> Result<u32, RunnerError>
    where
        F: FnOnce(usize) -> Result<()> + Send + 'static,
        E: FnOnce(&anyhow::Error) + Send + 'static,
    {
        self.submit(Box::new(body), Some(Box::new(on_error)))
    }

    fn submit(&self, body: TaskFn, on_error: Option<OnErrorFn>) -> Result<u32, RunnerError> {
        let inner = &self.inner;
        let sequence = inner.sequence.fetch_add(1, Ordering::SeqCst);

        if self.is_cancelled() {
            return Err(RunnerError::Stopped);
        }
        let sender = lock(&inner.tasks_tx).clone().ok_or(RunnerError::Closed)?;
        let task = Task::new(sequence, body, on_error);

        // Counted before the send so a fast worker never sees it go negative.
        inner.queued.fetch_add(1, Ordering::SeqCst);
        let sent = select! {
            send(sender, task) -> res => res.map_err(|_| RunnerError::Closed),
            recv(inner.cancel_rx) -> _ => Err(RunnerError::Stopped),
        };

        if let Err(err) = sent {
            inner.queued.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(sequence, %err, "Task rejected");
            self.notify_finished_if_idle();
            return Err(err);
        }

        // Lost the race with a concurrent cancel: nothing queued now may run.
        if self.is_cancelled() && self.discard_queued().contains(&sequence) {
            self.notify_finished_if_idle();
            return Err(RunnerError::Stopped);
        }
        tracing::trace!(sequence, "Task queued");
        Ok(sequence)
    }

    /// Spawn the workers and block until every one of them has exited.
    ///
    /// Workers exit once the queue is closed and drained (see
    /// [`done`](Self::done)), after a fail-fast cancellation, or when the pool
    /// shrinks. Task failures never surface here, inspect
    /// [`errors`](Self::errors) afterwards.
    pub fn run(&self) {
        {
            let mut pool = lock(&self.inner.pool);
            if pool.running {
                tracing::warn!("Runner already running, joining existing workers");
            } else {
                pool.running = true;
                let missing = pool.max_parallel.saturating_sub(pool.open);
                for _ in 0..missing {
                    self.spawn_worker(&mut pool);
                }
            }
        }
        self.join_workers();
        tracing::debug!(
            started = self.started_count(),
            errors = lock(&self.inner.errors).len(),
            "Runner finished"
        );
    }

    /// Producer is finished: close the queue. Safe to call more than once.
    ///
    /// Tasks already queued still run. Later submissions fail with
    /// [`RunnerError::Closed`].
    pub fn done(&self) {
        if lock(&self.inner.tasks_tx).take().is_some() {
            tracing::debug!("Task queue closed");
        }
    }

    /// Stop accepting tasks and drop everything still waiting in the queue.
    ///
    /// Running tasks are never interrupted. With `force` the queue is also
    /// closed, so idle workers exit without waiting for [`done`](Self::done).
    pub fn cancel(&self, force: bool) {
        let inner = &self.inner;
        inner.cancel_once.call_once(|| {
            inner.cancelled.store(true, Ordering::SeqCst);
            lock(&inner.cancel_tx).take();
            let discarded = self.discard_queued().len();
            tracing::info!(discarded, force, "Runner cancelled");
        });
        if force {
            self.done();
        }
        self.notify_finished_if_idle();
    }

    /// Change the target worker count (at least 1).
    ///
    /// Growing spawns the extra workers right away when the runner is
    /// running. Shrinking is lazy: surplus workers retire after finishing
    /// their current task.
    pub fn set_max_parallel(&self, max_parallel: usize) {
        let max_parallel = max_parallel.max(1);
        let mut pool = lock(&self.inner.pool);
        if max_parallel == pool.max_parallel {
            return;
        }

        let previous = pool.max_parallel;
        pool.max_parallel = max_parallel;
        if pool.running && !self.is_cancelled() {
            let missing = max_parallel.saturating_sub(pool.open);
            for _ in 0..missing {
                self.spawn_worker(&mut pool);
            }
        }
        tracing::info!(from = previous, to = max_parallel, open = pool.open, "Max parallel changed");
    }

    /// Enable or disable the finish notification.
    ///
    /// Enabling arms a fresh channel and starts a grace timer: if no task has
    /// started when it expires, the notification fires anyway.
    pub fn set_finished_notification(&self, enabled: bool) {
        lock(&self.inner.finish).set_enabled(enabled);
        if !enabled {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let grace = self.inner.finish_grace;
        let spawned = thread::Builder::new()
            .name("runner-finish-grace".to_string())
            .spawn(move || {
                thread::sleep(grace);
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let runner = Runner { inner };
                if !runner.is_started() {
                    tracing::debug!(?grace, "No task started within the grace period");
                    lock(&runner.inner.finish).fire();
                }
            });
        if let Err(err) = spawned {
            tracing::warn!(error = %err, "Failed to start finish grace timer");
        }
    }

    /// Receiver for the finish notification.
    ///
    /// Yields a single `true` once no task is queued or running, then reports
    /// disconnection. Fetch it again after
    /// [`reset_finish_notification_if_active`](Self::reset_finish_notification_if_active).
    pub fn finished_notification(&self) -> Receiver<bool> {
        lock(&self.inner.finish).receiver()
    }

    /// Re-arm an already fired notification while work is still outstanding.
    ///
    /// Used when this runner is fed by another one: a lull between the
    /// feeder's batches may have fired the signal too early.
    pub fn reset_finish_notification_if_active(&self) {
        let mut finish = lock(&self.inner.finish);
        if !finish.is_enabled() || !finish.is_fired() || self.is_cancelled() {
            return;
        }
        if self.active_threads() > 0 || self.queued_count() > 0 {
            finish.rearm();
            tracing::debug!("Finish notification re-armed");
        }
    }

    /// Snapshot of task errors keyed by sequence number
    pub fn errors(&self) -> HashMap<u32, Arc<anyhow::Error>> {
        lock(&self.inner.errors).clone()
    }

    /// Workers currently alive, busy or idle
    pub fn open_threads(&self) -> usize {
        lock(&self.inner.pool).open
    }

    /// Workers currently executing a task
    pub fn active_threads(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started_count() > 0
    }

    /// Number of tasks that began executing
    pub fn started_count(&self) -> u32 {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Tasks submitted and not yet completed
    pub fn queued_count(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn max_parallel(&self) -> usize {
        lock(&self.inner.pool).max_parallel
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn is_fail_fast(&self) -> bool {
        self.inner.fail_fast
    }

    fn spawn_worker(&self, pool: &mut WorkerPool) {
        let worker_id = self.inner.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let runner = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("runner-worker-{}", worker_id))
            .spawn(move || runner.worker_loop(worker_id));

        match spawned {
            Ok(handle) => {
                pool.open += 1;
                lock(&self.inner.handles).push(handle);
            }
            Err(err) => {
                tracing::error!(worker_id, error = %err, "Failed to spawn worker thread");
            }
        }
    }

    fn join_workers(&self) {
        loop {
            // Workers spawned by set_max_parallel while we wait land here too.
            let handle = lock(&self.inner.handles).pop();
            let Some(handle) = handle else {
                break;
            };
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }
    }

    fn worker_loop(&self, worker_id: usize) {
        let inner = &self.inner;
        let tasks = inner.tasks_rx.clone();
        tracing::debug!(worker_id, "Worker started");

        while let Ok(task) = tasks.recv() {
            if self.is_cancelled() {
                self.discard(task);
                self.notify_finished_if_idle();
                continue;
            }

            let sequence = task.sequence;
            inner.active.fetch_add(1, Ordering::SeqCst);
            inner.started.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(worker_id, sequence, "Running task");

            let (outcome, on_error) = task.execute(worker_id);

            inner.active.fetch_sub(1, Ordering::SeqCst);
            inner.queued.fetch_sub(1, Ordering::SeqCst);

            if let Err(err) = outcome {
                self.record_error(worker_id, sequence, err, on_error);
                if inner.fail_fast {
                    self.cancel(false);
                }
            }
            self.notify_finished_if_idle();

            if inner.fail_fast && self.is_cancelled() {
                tracing::debug!(worker_id, "Worker stopping after fail-fast cancellation");
                break;
            }
            if self.retire_if_surplus(worker_id) {
                return;
            }
        }

        let mut pool = lock(&inner.pool);
        pool.open = pool.open.saturating_sub(1);
        tracing::debug!(worker_id, open = pool.open, "Worker stopped");
    }

    fn record_error(
        &self,
        worker_id: usize,
        sequence: u32,
        err: anyhow::Error,
        on_error: Option<OnErrorFn>,
    ) {
        tracing::debug!(worker_id, sequence, error = %err, "Task failed");
        let err = Arc::new(err);
        lock(&self.inner.errors).insert(sequence, Arc::clone(&err));
        if let Some(on_error) = on_error
            && let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_error(&*err)))
        {
            tracing::warn!(
                worker_id,
                sequence,
                panic = %panic_message(&payload),
                "Error callback panicked"
            );
        }
    }

    /// Leave the pool if it holds more workers than the current target.
    fn retire_if_surplus(&self, worker_id: usize) -> bool {
        let mut pool = lock(&self.inner.pool);
        if pool.open > pool.max_parallel {
            pool.open -= 1;
            tracing::debug!(worker_id, open = pool.open, "Worker retiring after pool shrink");
            return true;
        }
        false
    }

    /// Drop everything left in the queue, returning the discarded sequences.
    fn discard_queued(&self) -> Vec<u32> {
        let mut discarded = Vec::new();
        while let Ok(task) = self.inner.tasks_rx.try_recv() {
            discarded.push(task.sequence);
            self.discard(task);
        }
        discarded
    }

    fn discard(&self, task: Task) {
        self.inner.queued.fetch_sub(1, Ordering::SeqCst);
        tracing::warn!(sequence = task.sequence, "Discarding task after cancellation");
    }

    fn notify_finished_if_idle(&self) {
        let mut finish = lock(&self.inner.finish);
        if !finish.is_enabled() || finish.is_fired() {
            return;
        }
        if self.active_threads() == 0 && self.queued_count() == 0 {
            finish.fire();
            tracing::debug!("Runner idle, finish notification sent");
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("max_parallel", &self.max_parallel())
            .field("capacity", &self.capacity())
            .field("fail_fast", &self.is_fail_fast())
            .field("open_threads", &self.open_threads())
            .field("active_threads", &self.active_threads())
            .field("queued", &self.queued_count())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_clamps_to_one() {
        let runner = Runner::new(0, 0, false);
        assert_eq!(runner.max_parallel(), 1);
        assert_eq!(runner.capacity(), 1);

        runner.set_max_parallel(0);
        assert_eq!(runner.max_parallel(), 1);
    }

    #[test]
    fn test_rejected_submission_rolls_back_queued_count() {
        let runner = Runner::new(2, 4, false);
        runner.add_task(|_| Ok(())).unwrap();
        assert_eq!(runner.queued_count(), 1);

        runner.done();
        assert_eq!(runner.add_task(|_| Ok(())), Err(RunnerError::Closed));
        assert_eq!(runner.queued_count(), 1);

        runner.run();
        assert_eq!(runner.queued_count(), 0);
        assert_eq!(runner.started_count(), 1);
    }

    #[test]
    fn test_cancel_discards_queued_tasks() {
        let runner = Runner::new(1, 8, false);
        let ran = Arc::new(AtomicBool::new(false));
        for _ in 0..5 {
            let ran = Arc::clone(&ran);
            runner
                .add_task(move |_| {
                    ran.store(true, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(runner.queued_count(), 5);

        runner.cancel(true);
        assert_eq!(runner.queued_count(), 0);

        runner.run();
        assert!(!ran.load(Ordering::SeqCst));
        assert!(!runner.is_started());
        assert_eq!(runner.open_threads(), 0);
    }

    #[test]
    fn test_open_threads_zero_after_run() {
        let runner = Runner::new(3, 3, false);
        for _ in 0..6 {
            runner.add_task(|_| Ok(())).unwrap();
        }
        runner.done();
        runner.run();
        assert_eq!(runner.open_threads(), 0);
        assert_eq!(runner.active_threads(), 0);
    }

    #[test]
    fn test_error_recorded_before_callback() {
        let runner = Runner::new_bounded(1, false);
        let observer = runner.clone();
        let seen_in_table = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&seen_in_table);

        let sequence = runner
            .add_task_with_error(
                |_| Err(anyhow!("bad input")),
                move |_err| {
                    seen.store(observer.errors().contains_key(&0), Ordering::SeqCst);
                },
            )
            .unwrap();
        runner.done();
        runner.run();

        assert_eq!(sequence, 0);
        assert!(seen_in_table.load(Ordering::SeqCst));
    }

    #[test]
    fn test_debug_output() {
        let runner = Runner::new(2, 5, true);
        let rendered = format!("{:?}", runner);
        assert!(rendered.contains("max_parallel: 2"));
        assert!(rendered.contains("fail_fast: true"));
    }
}
