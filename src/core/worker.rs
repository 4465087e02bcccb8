//! Single-writer polling loop around `FoldLogic::run_cycle`.
//!
//! A cycle failure is logged and followed by the longer retry sleep; it
//! never ends the loop. Only the stop flag or the cycle limit do.

use crate::config::Config;
use crate::core::fold::{CycleReport, FoldLogic};
use crate::db::pool::DbPool;
use crate::models::episode::EpisodeMode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Granularity at which a sleeping worker notices the stop flag.
const STOP_CHECK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub mode: EpisodeMode,
    pub poll_interval: Duration,
    pub retry_interval: Duration,
    /// Stop after this many cycles (successful or not).
    pub max_cycles: Option<usize>,
    pub stop: Option<Arc<AtomicBool>>,
}

impl WorkerOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            mode: cfg.episode_mode,
            poll_interval: cfg.poll_interval(),
            retry_interval: cfg.retry_interval(),
            max_cycles: None,
            stop: None,
        }
    }

    fn should_stop(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// What the loop did before it returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub cycles: usize,
    pub failures: usize,
    pub readings: usize,
    pub last: Option<CycleReport>,
}

pub struct Worker;

impl Worker {
    pub fn run(pool: &mut DbPool, opts: &WorkerOptions) -> WorkerSummary {
        info!(
            mode = %opts.mode,
            poll_secs = opts.poll_interval.as_secs(),
            retry_secs = opts.retry_interval.as_secs(),
            "alarm processor started"
        );

        let mut summary = WorkerSummary::default();

        loop {
            if opts.should_stop() {
                break;
            }

            let pause = match FoldLogic::run_cycle(&mut pool.conn, opts.mode) {
                Ok(report) => {
                    summary.readings += report.readings;
                    summary.last = Some(report);
                    opts.poll_interval
                }
                Err(e) => {
                    error!(error = %e, "fold cycle failed; rolled back, retrying later");
                    summary.failures += 1;
                    opts.retry_interval
                }
            };
            summary.cycles += 1;

            if opts.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            nap(pause, opts);
        }

        info!(
            cycles = summary.cycles,
            failures = summary.failures,
            "alarm processor stopped"
        );
        summary
    }
}

fn nap(total: Duration, opts: &WorkerOptions) {
    let until = Instant::now() + total;
    loop {
        if opts.should_stop() {
            return;
        }
        let now = Instant::now();
        if now >= until {
            return;
        }
        thread::sleep((until - now).min(STOP_CHECK));
    }
}
