use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::verify::VerifyLogic;
use crate::db::migrate::run_pending_migrations;
use crate::db::pool::DbPool;
use crate::db::stats;
use crate::errors::{AppError, AppResult};
use crate::utils::colors::{CYAN, GREEN, RED, RESET};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Db {
        migrate,
        check,
        verify,
        vacuum,
        info,
    } = cmd
    {
        let mut pool = DbPool::new(&cfg.database)?;

        //
        // 1) MIGRATE
        //
        if *migrate {
            println!("{}▶ Running migrations…{}", CYAN, RESET);
            let applied = run_pending_migrations(&pool.conn)?;
            if applied.is_empty() {
                println!("{}✔ Schema already up to date.{}\n", GREEN, RESET);
            } else {
                for v in &applied {
                    println!("  applied {v}");
                }
                println!("{}✔ Migration completed.{}\n", GREEN, RESET);
            }
        }

        //
        // 2) INFO
        //
        if *info {
            stats::print_db_info(&mut pool, &cfg.database)?;
        }

        //
        // 3) CHECK
        //
        if *check {
            println!("{}▶ Running integrity check…{}", CYAN, RESET);

            let integrity: String = pool
                .conn
                .query_row("PRAGMA integrity_check;", [], |row| row.get(0))?;

            if integrity == "ok" {
                println!("{}✔ Integrity check passed.{}\n", GREEN, RESET);
            } else {
                println!("{}✘ Integrity check failed:{} {}\n", RED, RESET, integrity);
            }
        }

        //
        // 4) VERIFY
        //
        if *verify {
            println!("{}▶ Verifying alarm episodes…{}", CYAN, RESET);

            let violations = VerifyLogic::run(&pool.conn)?;
            if violations.is_empty() {
                println!("{}✔ Episodes are consistent.{}\n", GREEN, RESET);
            } else {
                for v in &violations {
                    println!("{}✘{} {}", RED, RESET, v);
                }
                println!();
                return Err(AppError::Other(format!(
                    "{} episode inconsistenc{} found",
                    violations.len(),
                    if violations.len() == 1 { "y" } else { "ies" }
                )));
            }
        }

        //
        // 5) VACUUM
        //
        if *vacuum {
            println!("{}▶ Running VACUUM…{}", CYAN, RESET);

            pool.conn.execute_batch("VACUUM;")?;

            println!("{}✔ Vacuum completed.{}\n", GREEN, RESET);
        }
    }

    Ok(())
}
