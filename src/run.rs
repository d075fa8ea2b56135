//! Drives one counting run: plan, count in parallel, reduce, report.
//!
//! The coordinator is an async task; it owns the progress monitor and
//! awaits worker results, while the counting itself happens on a rayon
//! pool. Workers report back over oneshot channels, so the coordinator is
//! never blocked on a worker thread.

use std::future::Future;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::chunk::{plan_chunks, ChunkPlan};
use crate::config::CountConfig;
use crate::error::{CountError, Result};
use crate::progress::{CompletionCounter, MonitorExit, MonitorHandle};
use crate::tally::{reduce, Tally};
use crate::timing::Stopwatch;
use crate::worker::count_chunk;

/// What a finished run found.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub parallelism: NonZeroUsize,
    pub chunks: usize,
    pub target_key: String,
    pub tally: Tally,
}

impl RunSummary {
    pub fn distinct_keys(&self) -> usize {
        self.tally.len()
    }

    pub fn target_count(&self) -> u64 {
        self.tally.get(&self.target_key)
    }
}

/// A fixed-size pool of worker threads for chunk counting.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: NonZeroUsize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.get())
            .thread_name(|i| format!("chunk-worker-{i}"))
            .panic_handler(|_| error!("chunk worker panicked"))
            .build()?;
        Ok(Self { pool })
    }

    /// Start `job` on the pool now; the returned future resolves to its
    /// result, or `None` if the job panicked.
    pub fn execute<T, F>(&self, job: F) -> impl Future<Output = Option<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            // The receiver is gone only if the run was already abandoned.
            let _ = tx.send(job());
        });
        async move { rx.await.ok() }
    }
}

/// Plan `config.path` and count it.
pub async fn run(config: &CountConfig) -> Result<RunSummary> {
    let reading = Stopwatch::start("Reading file");
    let plan = plan_chunks(&config.path, config.max_parallelism)?;
    reading.finish();

    count_plan(config, plan).await
}

/// Count an existing plan and print the summary.
///
/// Any failing chunk aborts the run: its error is returned, the other
/// partial results are dropped, and no summary is printed.
pub async fn count_plan(config: &CountConfig, plan: ChunkPlan) -> Result<RunSummary> {
    info!(
        parallelism = plan.parallelism.get(),
        chunks = plan.len(),
        bytes = plan.file_size,
        "counting {}",
        config.path.display()
    );

    let pool = WorkerPool::new(plan.parallelism)?;
    let counter = Arc::new(CompletionCounter::new(plan.len()));
    let monitor = MonitorHandle::spawn(
        Arc::clone(&counter),
        config.progress_interval,
        |snapshot| println!("Progress: {snapshot}"),
    );
    // Let the monitor print its first line before any chunk is dispatched.
    tokio::task::yield_now().await;

    let processing = Stopwatch::start("Processing data");
    let results = dispatch(&pool, &config.path, &plan, &counter).await;

    // Every result is in (or the run failed); the monitor may not have
    // seen the final count yet and that is fine.
    if monitor.cancel().await == MonitorExit::Cancelled {
        info!("progress monitor cancelled after all chunks returned");
    }
    let tallies = results.inspect_err(|err| warn!(%err, "aborting run"))?;
    processing.finish();

    let reducing = Stopwatch::start("Reducing results");
    let tally = reduce(tallies)?;
    reducing.finish();

    let summary = RunSummary {
        parallelism: plan.parallelism,
        chunks: plan.len(),
        target_key: config.target_key.clone(),
        tally,
    };

    let printing = Stopwatch::start("Printing results");
    println!("Total words: {}", summary.distinct_keys());
    println!(
        "Total count for word {}: {}",
        summary.target_key,
        summary.target_count()
    );
    printing.finish();

    Ok(summary)
}

/// Send every chunk to the pool, in plan order, and collect the tallies.
async fn dispatch(
    pool: &WorkerPool,
    path: &Path,
    plan: &ChunkPlan,
    counter: &Arc<CompletionCounter>,
) -> Result<Vec<Tally>> {
    let path: Arc<Path> = Arc::from(path);

    let jobs = plan.chunks.iter().map(|&chunk| {
        let path = Arc::clone(&path);
        let counter = Arc::clone(counter);
        let result = pool.execute(move || count_chunk(&path, chunk, &counter));
        async move {
            result
                .await
                .unwrap_or_else(|| Err(CountError::WorkerLost { chunk }))
        }
    });

    // Completion order is arbitrary; the first error wins.
    try_join_all(jobs).await
}
