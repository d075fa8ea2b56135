use std::time::{Duration, Instant};

use tracing::info;

/// Measures one phase of a run and prints `<label> took <secs> seconds`.
///
/// Nothing is printed unless [`finish`](Self::finish) is called, so a
/// phase that fails with `?` leaves no timing line behind.
#[derive(Debug)]
pub struct Stopwatch {
    label: &'static str,
    started: Instant,
}

impl Stopwatch {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("{}", format_phase(self.label, elapsed));
        info!(phase = self.label, seconds = elapsed.as_secs_f64(), "phase finished");
        elapsed
    }
}

fn format_phase(label: &str, elapsed: Duration) -> String {
    format!("{label} took {:.2} seconds", elapsed.as_secs_f64())
}
