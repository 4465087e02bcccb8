use clap::{Args, Parser, Subcommand};

/// Command-line interface definition for pinwatch
/// Derives alarm episodes from multi-sensor readings stored in SQLite
#[derive(Parser)]
#[command(
    name = "pinwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Track GPIO alarm episodes from sensor readings using SQLite",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Append device readings (JSON, one object per line)
    Ingest {
        /// Read payloads from this file instead of stdin
        #[arg(long, value_name = "FILE")]
        file: Option<String>,
    },

    /// Fold new readings into alarm episodes
    Fold {
        /// Run a single cycle and exit instead of polling
        #[arg(long)]
        once: bool,

        /// Stop after this many cycles
        #[arg(long, value_name = "N", conflicts_with = "once")]
        cycles: Option<usize>,
    },

    /// Show the live dashboard snapshot
    Status {
        #[arg(long, help = "Only show this client")]
        client: Option<String>,

        #[arg(long, help = "Print the snapshot as JSON")]
        json: bool,
    },

    /// List recorded alarm episodes (newest first)
    Events {
        #[arg(long)]
        client: Option<String>,

        #[arg(long, help = "GPIO pin index (0-7)")]
        pin: Option<i64>,

        /// Earliest start time (RFC3339, "YYYY-MM-DD HH:MM[:SS]" or "YYYY-MM-DD")
        #[arg(long)]
        from: Option<String>,

        /// Latest start time, same formats as --from
        #[arg(long)]
        to: Option<String>,

        #[arg(long, help = "Only episodes that have not ended")]
        open: bool,

        #[arg(long, default_value_t = 100, help = "Page size (max 1000)")]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long, help = "Print the page as JSON")]
        json: bool,
    },

    /// List stored readings (newest first)
    Readings {
        #[arg(long)]
        client: Option<String>,

        #[arg(long, default_value_t = 100, help = "Number of readings (max 1000)")]
        limit: usize,

        #[arg(long, help = "Print the readings as JSON")]
        json: bool,
    },

    /// Show recent sensor and GPIO values per client
    Series {
        #[arg(long)]
        client: Option<String>,

        #[arg(
            long,
            default_value_t = 15,
            value_parser = clap::value_parser!(u32).range(1..=10080),
            help = "Window length in minutes"
        )]
        minutes: u32,

        /// End of the window (default: now), same formats as events --from
        #[arg(long)]
        until: Option<String>,

        #[arg(long, help = "Print the series as JSON")]
        json: bool,
    },

    /// Manage the database (migrations, integrity checks, etc.)
    Db {
        #[arg(long = "migrate", help = "Run pending database migrations")]
        migrate: bool,

        #[arg(long = "check", help = "Check database integrity")]
        check: bool,

        #[arg(long = "verify", help = "Check alarm episodes for consistency")]
        verify: bool,

        #[arg(long = "vacuum", help = "Optimize the database using VACUUM")]
        vacuum: bool,

        #[arg(long = "info", help = "Show database information")]
        info: bool,
    },

    /// Print or manage the internal log table
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,
    },

    /// Show or change the configuration
    Config {
        #[arg(long = "print", help = "Print the current configuration")]
        print_config: bool,

        #[arg(
            long = "edit",
            help = "Edit the configuration file (default editor: $EDITOR, or nano/notepad)"
        )]
        edit_config: bool,

        #[arg(
            long = "editor",
            requires = "edit_config",
            help = "Specify the editor to use (vim, nano, or custom path)"
        )]
        editor: Option<String>,

        #[command(flatten)]
        edits: ConfigEdits,
    },
}

/// Display settings changed in place by `config`. Each flag can repeat.
#[derive(Args, Debug, Default)]
pub struct ConfigEdits {
    /// Client display name; an empty NAME removes it
    #[arg(long = "client-alias", value_name = "CLIENT=NAME")]
    pub client_alias: Vec<String>,

    /// GPIO pin name; an empty NAME removes it
    #[arg(long = "gpio-alias", value_name = "CLIENT:PIN=NAME")]
    pub gpio_alias: Vec<String>,

    /// Temperature channel name; an empty NAME removes it
    #[arg(long = "temp-alias", value_name = "CLIENT:CHANNEL=NAME")]
    pub temp_alias: Vec<String>,

    /// Humidity channel name; an empty NAME removes it
    #[arg(long = "hum-alias", value_name = "CLIENT:CHANNEL=NAME")]
    pub hum_alias: Vec<String>,

    /// GPIO pins shown for a client ("all" shows every pin)
    #[arg(long = "visible-pins", value_name = "CLIENT=0,1,...")]
    pub visible_pins: Vec<String>,

    /// Temperature channels shown for a client
    #[arg(long = "visible-temp", value_name = "CLIENT=0,1,...")]
    pub visible_temp: Vec<String>,

    /// Humidity channels shown for a client
    #[arg(long = "visible-hum", value_name = "CLIENT=0,1,...")]
    pub visible_hum: Vec<String>,
}

impl ConfigEdits {
    pub fn is_empty(&self) -> bool {
        self.client_alias.is_empty()
            && self.gpio_alias.is_empty()
            && self.temp_alias.is_empty()
            && self.hum_alias.is_empty()
            && self.visible_pins.is_empty()
            && self.visible_temp.is_empty()
            && self.visible_hum.is_empty()
    }
}
