//! Run command implementation
//!
//! Submits a synthetic workload from a producer thread while the current
//! thread runs the pool, then prints a summary of what happened.

use anyhow::{Result, anyhow, bail};
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::cli::Output;
use crate::config::RunnerConfig;
use crate::parallel::Runner;

/// Failed tasks listed individually in the summary
const MAX_LISTED_FAILURES: usize = 10;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of synthetic tasks to submit
    #[arg(short = 'n', long, default_value_t = 100)]
    pub tasks: u32,

    /// Worker threads (overrides config)
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Queue capacity (overrides config)
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Cancel the runner on the first failed task
    #[arg(long)]
    pub fail_fast: bool,

    /// Tasks whose index is above this value fail
    #[arg(long, value_name = "INDEX")]
    pub fail_above: Option<u32>,

    /// Milliseconds each task sleeps
    #[arg(long, default_value_t = 10)]
    pub task_ms: u64,

    /// Resize the pool to this many workers halfway through submission
    #[arg(long, value_name = "WORKERS")]
    pub scale_to: Option<usize>,
}

/// Counters shared between the producer and the summary
#[derive(Default)]
struct Tally {
    submitted: AtomicU32,
    rejected: AtomicU32,
    total: AtomicU64,
}

pub fn execute(args: RunArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let mut config = RunnerConfig::load(config_path)?;
    if let Some(parallel) = args.parallel {
        config.max_parallel = parallel;
    }
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
    }
    config.fail_fast |= args.fail_fast;

    let runner = Runner::from_config(&config);
    output.verbose(&format!(
        "Running {} tasks on {} workers (capacity {}, fail-fast {})",
        args.tasks,
        runner.max_parallel(),
        runner.capacity(),
        runner.is_fail_fast()
    ));

    let tally = Arc::new(Tally::default());
    let start = Instant::now();

    let producer = {
        let runner = runner.clone();
        let tally = Arc::clone(&tally);
        thread::Builder::new()
            .name("runner-producer".to_string())
            .spawn(move || produce(&runner, &args, tally))?
    };

    runner.run();
    producer
        .join()
        .map_err(|_| anyhow!("Producer thread panicked"))?;

    let elapsed = start.elapsed();
    let errors = runner.errors();

    output.header("Runner summary");
    output.key_value("Submitted:", &tally.submitted.load(Ordering::SeqCst).to_string(), false);
    output.key_value("Started:", &runner.started_count().to_string(), false);
    output.key_value("Rejected:", &tally.rejected.load(Ordering::SeqCst).to_string(), false);
    output.key_value("Failed:", &errors.len().to_string(), !errors.is_empty());
    output.key_value("Total:", &tally.total.load(Ordering::SeqCst).to_string(), true);
    output.key_value("Elapsed:", &format!("{:.2}s", elapsed.as_secs_f64()), false);

    let rejected = tally.rejected.load(Ordering::SeqCst);
    if rejected > 0 {
        output.blank_line();
        output.warning(&format!("{} task(s) rejected after cancellation", rejected));
    }

    if errors.is_empty() {
        output.blank_line();
        output.success("All tasks completed");
        return Ok(());
    }

    let mut failures: Vec<_> = errors.iter().collect();
    failures.sort_by_key(|(sequence, _)| **sequence);
    output.blank_line();
    output.error(&format!("{} task(s) failed", failures.len()));
    for (sequence, err) in failures.iter().take(MAX_LISTED_FAILURES) {
        output.failure_item(**sequence, &err.to_string());
    }
    if failures.len() > MAX_LISTED_FAILURES {
        output.info(&format!("... and {} more", failures.len() - MAX_LISTED_FAILURES));
    }

    bail!("{} task(s) failed", errors.len())
}

fn produce(runner: &Runner, args: &RunArgs, tally: Arc<Tally>) {
    let task_duration = Duration::from_millis(args.task_ms);

    for index in 0..args.tasks {
        if let Some(workers) = args.scale_to
            && index == args.tasks / 2
        {
            runner.set_max_parallel(workers);
        }

        let fail_above = args.fail_above;
        let task_tally = Arc::clone(&tally);
        let submitted = runner.add_task(move |_worker_id| {
            thread::sleep(task_duration);
            if let Some(limit) = fail_above
                && index > limit
            {
                bail!("value {} is above {}", index, limit);
            }
            task_tally.total.fetch_add(u64::from(index), Ordering::SeqCst);
            Ok(())
        });

        match submitted {
            Ok(_) => {
                tally.submitted.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                tracing::info!(index, error = %err, "Stopping producer");
                tally.rejected.fetch_add(args.tasks - index, Ordering::SeqCst);
                break;
            }
        }
    }
    runner.done();
}
