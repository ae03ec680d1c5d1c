//! Operator CLI for the committee core.
//!
//! # Responsibility
//! - Verify `committee_core` linkage with a deterministic ping.
//! - Run maintenance jobs (orphan sweep, dashboard counts) against a
//!   configured database and upload root.
//!
//! Usage: `committee_cli [--config FILE] [ping | sweep [--dry-run] | counts]`

use clap::{Parser, Subcommand};
use committee_core::{
    init_from_config, open_db, sweep_orphans, AggregateReader, CoreConfig, SweepMode,
};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "committee_cli")]
#[command(about = "Maintenance tool for the committee store")]
#[command(version)]
struct Args {
    /// TOML configuration file; `COMMITTEE__*` variables override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Check that the core library links and report its version
    Ping,

    /// Remove attachment files that no row references
    Sweep {
        /// Report orphans without deleting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print committee totals per submitting user
    Counts,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let command = args.command.unwrap_or(Command::Ping);
    if command == Command::Ping {
        println!("committee_core ping={}", committee_core::ping());
        println!("committee_core version={}", committee_core::core_version());
        return Ok(());
    }

    let config = CoreConfig::load(args.config.as_deref())?;
    init_from_config(&config)?;
    let conn = open_db(&config.database_path)?;

    match command {
        Command::Sweep { dry_run } => {
            let mode = if dry_run { SweepMode::DryRun } else { SweepMode::Apply };
            let report = sweep_orphans(&conn, &config.upload_root, config.orphan_grace(), mode)?;
            println!(
                "scanned={} orphaned={} removed={} skipped_recent={} failed={} dangling_rows={}",
                report.scanned,
                report.orphaned.len(),
                report.removed.len(),
                report.skipped_recent,
                report.failed.len(),
                report.dangling_rows.len()
            );
            for path in &report.orphaned {
                println!("orphan {}", path.display());
            }
        }
        Command::Counts => {
            let counts = AggregateReader::new(&conn).dashboard_counts()?;
            println!(
                "committees={} users={}",
                counts.total_committees, counts.total_users
            );
            for entry in counts.per_user {
                println!("{} {}", entry.username, entry.committees);
            }
        }
        Command::Ping => {}
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
