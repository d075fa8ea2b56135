//! Command line parsing and the validated run configuration.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

pub const DEFAULT_MAX_PARALLELISM: NonZeroUsize = match NonZeroUsize::new(8) {
    Some(n) => n,
    None => unreachable!(),
};
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Count per-key totals in a large tab-separated file, in parallel.
#[derive(Parser, Debug)]
#[command(name = "chunk-tally", version)]
pub struct Cli {
    /// Input file with `key \t secondary \t count \t tertiary` lines
    pub path: PathBuf,

    /// Key whose total is reported at the end of the run
    #[arg(short, long)]
    pub key: String,

    /// Upper bound on parallel workers (capped at available CPUs)
    #[arg(short = 'j', long, default_value_t = DEFAULT_MAX_PARALLELISM)]
    pub threads: NonZeroUsize,

    /// Seconds between progress lines
    #[arg(short, long, default_value = "1", value_parser = parse_interval)]
    pub interval: Duration,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn into_config(self) -> CountConfig {
        CountConfig::new(self.path, self.key)
            .with_max_parallelism(self.threads)
            .with_progress_interval(self.interval)
    }
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number of seconds"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("interval must be positive, got `{value}`"));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Everything one counting run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountConfig {
    pub path: PathBuf,
    pub target_key: String,
    /// Requested parallelism, before capping at available CPUs.
    pub max_parallelism: NonZeroUsize,
    pub progress_interval: Duration,
}

impl CountConfig {
    pub fn new(path: impl Into<PathBuf>, target_key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target_key: target_key.into(),
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_max_parallelism(mut self, max_parallelism: NonZeroUsize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    pub fn with_progress_interval(mut self, progress_interval: Duration) -> Self {
        self.progress_interval = progress_interval;
        self
    }
}
