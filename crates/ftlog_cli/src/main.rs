//! ftlog CLI
//!
//! Command-line tools for ftlog write-ahead logs.
//!
//! # Commands
//!
//! - `dump-log` - Print log records
//! - `verify` - Scan the log in both directions and compare
//! - `needs-recovery` - Report whether the log ends with a clean shutdown
//! - `recover` - Run crash recovery

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ftlog write-ahead log tools.
#[derive(Parser)]
#[command(name = "ftlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print log records
    DumpLog {
        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Start from the newest record
        #[arg(short, long)]
        reverse: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Scan the log forward and backward and compare the two
    Verify,

    /// Report whether the log needs recovery
    NeedsRecovery,

    /// Run crash recovery
    Recover {
        /// Directory holding the dictionaries
        #[arg(long)]
        data_dir: PathBuf,

        /// Recover even if the log ends with a clean shutdown
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::DumpLog {
            limit,
            reverse,
            format,
        } => {
            let dir = cli.dir.ok_or("Log directory required for dump-log")?;
            commands::dump_log::run(&dir, limit, reverse, &format)?;
        }
        Commands::Verify => {
            let dir = cli.dir.ok_or("Log directory required for verify")?;
            commands::verify::run(&dir)?;
        }
        Commands::NeedsRecovery => {
            let dir = cli.dir.ok_or("Log directory required for needs-recovery")?;
            commands::recover::needs_recovery(&dir)?;
        }
        Commands::Recover { data_dir, force } => {
            let dir = cli.dir.ok_or("Log directory required for recover")?;
            commands::recover::run(&dir, &data_dir, force)?;
        }
        Commands::Version => {
            println!("ftlog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ftlog core v{}", ftlog_core::VERSION);
            println!(
                "log format v{} (reads v{}..=v{})",
                ftlog_core::wal::LOG_VERSION,
                ftlog_core::wal::LOG_MIN_SUPPORTED_VERSION,
                ftlog_core::wal::LOG_VERSION
            );
        }
    }

    Ok(())
}
