//! Completion counting and the periodic progress monitor.
//!
//! Workers bump a shared [`CompletionCounter`] once per finished chunk; a
//! monitor task on the coordinator polls it on a fixed interval and reports
//! `completed/total` until every chunk is done or it is cancelled.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Number of finished chunks out of a fixed total.
///
/// The only mutation is [`complete_one`](Self::complete_one); the count
/// never moves backwards and never passes the total.
#[derive(Debug)]
pub struct CompletionCounter {
    completed: AtomicUsize,
    total: usize,
}

impl CompletionCounter {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one finished chunk and return the new count.
    pub fn complete_one(&self) -> usize {
        let previous = self.completed.fetch_add(1, Ordering::AcqRel);
        debug_assert!(
            previous < self.total,
            "completion counter passed its total of {}",
            self.total
        );
        previous + 1
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::Acquire),
            total: self.total,
        }
    }
}

/// A point-in-time read of a [`CompletionCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// How a monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Saw every chunk complete and returned on its own.
    Terminated,
    /// Stopped by the coordinator before it saw the last completion.
    Cancelled,
}

/// Report progress every `every` until all chunks are complete.
///
/// The first report is immediate. Cancelling the future is safe at any
/// point since it only ever reads the counter.
pub async fn monitor<F>(counter: Arc<CompletionCounter>, every: Duration, mut report: F)
where
    F: FnMut(ProgressSnapshot),
{
    let mut ticks = tokio::time::interval(every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        let snapshot = counter.snapshot();
        report(snapshot);
        if snapshot.is_done() {
            break;
        }
    }
}

/// A [`monitor`] running as its own task.
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn spawn<F>(counter: Arc<CompletionCounter>, every: Duration, report: F) -> Self
    where
        F: FnMut(ProgressSnapshot) + Send + 'static,
    {
        Self {
            task: tokio::spawn(monitor(counter, every, report)),
        }
    }

    /// Stop the monitor if it is still running.
    pub async fn cancel(self) -> MonitorExit {
        self.task.abort();
        Self::exit_of(self.task.await)
    }

    /// Wait for the monitor to see every chunk complete.
    pub async fn finished(self) -> MonitorExit {
        Self::exit_of(self.task.await)
    }

    fn exit_of(joined: Result<(), tokio::task::JoinError>) -> MonitorExit {
        let exit = match joined {
            Ok(()) => MonitorExit::Terminated,
            Err(err) if err.is_cancelled() => MonitorExit::Cancelled,
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        };
        debug!(?exit, "progress monitor stopped");
        exit
    }
}
