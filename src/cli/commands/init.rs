use crate::cli::parser::Cli;
use crate::config::Config;
use crate::db::initialize::init_db;
use crate::db::log;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::ui::messages;

/// Handle the `init` command
///
/// This initializes:
///  - the config directory and file (skipped in test mode)
///  - the SQLite database, with every pending migration applied
///  - the fold watermark row
pub fn handle(cli: &Cli) -> AppResult<()> {
    let db_path = Config::init_all(cli.db.clone(), cli.test)?;
    let db_path = db_path.to_string_lossy().to_string();

    messages::info("Initializing pinwatch…");
    if !cli.test {
        println!("📄 Config file : {}", Config::config_file().display());
    }
    println!("🗄️  Database   : {}", &db_path);

    let pool = DbPool::new(&db_path)?;
    init_db(&pool.conn)?;

    // non-blocking
    if let Err(e) = log::ttlog(
        &pool.conn,
        "init",
        "database",
        &format!("Database initialized at {}", &db_path),
    ) {
        messages::warning(format!("Failed to write internal log: {}", e));
    }

    messages::success(format!("Database initialized at {}", &db_path));
    Ok(())
}
