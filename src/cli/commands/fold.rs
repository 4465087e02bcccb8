use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::fold::FoldLogic;
use crate::core::worker::{Worker, WorkerOptions};
use crate::db::pool::DbPool;
use crate::errors::{AppError, AppResult};
use crate::ui::messages;
use crate::utils::colors::{CYAN, GREEN, GREY, RESET, YELLOW};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Fold { once, cycles } = cmd {
        let mut pool = DbPool::new(&cfg.database)?;

        if *once {
            let report = FoldLogic::run_cycle(&mut pool.conn, cfg.episode_mode)?;
            if report.is_idle() {
                messages::info(format!(
                    "Nothing to fold (watermark {}).",
                    report.watermark_after
                ));
            } else {
                println!(
                    "{}▶ Folded {} reading(s){} → {}{} closed{}, {} opened, {}{} unresolved{}, {}{} discarded{}",
                    CYAN,
                    report.readings,
                    RESET,
                    GREEN,
                    report.closed,
                    RESET,
                    report.opened,
                    YELLOW,
                    report.unresolved,
                    RESET,
                    GREY,
                    report.discarded,
                    RESET
                );
                messages::success(format!(
                    "Watermark {} → {}",
                    report.watermark_before, report.watermark_after
                ));
            }
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .map_err(|e| AppError::Other(format!("cannot install Ctrl+C handler: {e}")))?;

        let opts = WorkerOptions {
            max_cycles: *cycles,
            stop: Some(stop),
            ..WorkerOptions::from_config(cfg)
        };
        messages::info(format!(
            "Alarm processor running ({} mode, every {}s). Press Ctrl+C to stop.",
            opts.mode, cfg.poll_interval_secs
        ));
        let summary = Worker::run(&mut pool, &opts);
        messages::success(format!(
            "{} cycle(s), {} reading(s) folded, {} failure(s)",
            summary.cycles, summary.readings, summary.failures
        ));
    }

    Ok(())
}
