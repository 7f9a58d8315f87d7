//! Bounded, cancellable parallel task runner
//!
//! The runner is a producer/consumer pool: producers submit closures into a
//! bounded FIFO queue and a resizable set of worker threads executes them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  add_task   ┌──────────────┐  recv   ┌─────────────────┐
//! │ Producer(s) │────────────▶│ Bounded FIFO │────────▶│ Worker threads  │
//! │             │  (blocks    │ (crossbeam)  │         │ runner-worker-N │
//! └─────────────┘   if full)  └──────────────┘         └────────┬────────┘
//!                                                               │
//!                                   ┌───────────────────────────┼──────────────┐
//!                                   ▼                           ▼              ▼
//!                           error table by seq         error callback   finish signal
//! ```
//!
//! ## Lifecycle
//! - [`Runner::add_task`] returns a monotonic sequence number per task.
//! - [`Runner::done`] closes the queue; [`Runner::run`] blocks until all
//!   workers drained it and exited.
//! - [`Runner::cancel`] rejects further submissions and drops queued tasks.
//!   Running tasks always complete.
//! - With `fail_fast`, the first task error cancels the runner.
//!
//! ## Scaling
//! [`Runner::set_max_parallel`] grows the pool immediately. Shrinking is
//! lazy: a surplus worker retires after its current task, so no task is ever
//! interrupted.
//!
//! ## Quiescence
//! [`Runner::set_finished_notification`] enables a one-shot signal that fires
//! when nothing is queued or running. A runner fed by another runner can
//! re-arm it with [`Runner::reset_finish_notification_if_active`].
//!
//! # Example
//!
//! ```rust
//! use parallel_runner::parallel::Runner;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let runner = Runner::new(4, 8, false);
//! let total = Arc::new(AtomicUsize::new(0));
//!
//! let producer = {
//!     let runner = runner.clone();
//!     let total = Arc::clone(&total);
//!     std::thread::spawn(move || {
//!         for value in 0..100 {
//!             let total = Arc::clone(&total);
//!             runner
//!                 .add_task(move |_| {
//!                     total.fetch_add(value, Ordering::SeqCst);
//!                     Ok(())
//!                 })
//!                 .expect("runner accepts tasks until done");
//!         }
//!         runner.done();
//!     })
//! };
//!
//! runner.run();
//! producer.join().unwrap();
//! assert_eq!(total.load(Ordering::SeqCst), 4950);
//! ```

pub mod error;
mod notify;
pub mod runner;
pub mod task;

// Re-export main types for easier access
pub use error::RunnerError;
pub use runner::Runner;
pub use task::{OnErrorFn, TaskFn};
