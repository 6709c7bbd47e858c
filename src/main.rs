//! `fac-report` command line.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use fac_report::config::ReportConfig;
use fac_report::{notify, pipeline, recap};

#[derive(Parser, Debug)]
#[command(version, about = "FAC training-funding report pipeline")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline: partitions, summaries, checklists and recap
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input workbook or `;` CSV export
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Sheet name inside the workbook
        #[arg(long)]
        sheet: Option<String>,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        checklist_dir: Option<PathBuf>,

        /// Reference date for overdue checklists (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Write the composed notification message to this file
        #[arg(long)]
        notification_out: Option<PathBuf>,
    },
    /// Rebuild checklist_recap.csv from the files in a checklist directory
    Recap {
        #[arg(long)]
        checklist_dir: PathBuf,
    },
    /// Print the effective configuration as TOML
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> Result<()> {
    match command {
        Command::Run {
            config,
            input,
            sheet,
            output_dir,
            checklist_dir,
            today,
            notification_out,
        } => {
            let mut cfg = ReportConfig::load(config.as_deref()).context("loading configuration")?;
            if let Some(input) = input {
                cfg.input = input;
            }
            if let Some(sheet) = sheet {
                cfg.sheet = sheet;
            }
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            if let Some(dir) = checklist_dir {
                cfg.checklist_dir = dir;
            }
            let today = today.unwrap_or_else(|| Local::now().date_naive());

            let report = pipeline::run(&cfg, today)
                .with_context(|| format!("processing {}", cfg.input.display()))?;
            info!(
                partitions = report.partitions.len(),
                checklists = report.checklists.iter().filter(|c| c.path.is_some()).count(),
                recap_total = report.recap.total(),
                "done"
            );

            if let Some(path) = notification_out {
                let message =
                    notify::compose(&report.recap, &cfg.notification, Local::now().naive_local());
                fs::write(&path, message.to_string())
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(path = %path.display(), "notification message written");
            }
            Ok(())
        }
        Command::Recap { checklist_dir } => {
            let recap = recap::write_recap(&checklist_dir)
                .with_context(|| format!("building recap in {}", checklist_dir.display()))?;
            for entry in &recap.entries {
                println!("{}: {} ligne(s)", entry.file, entry.rows);
            }
            println!("TOTAL: {}", recap.total());
            Ok(())
        }
        Command::Config { config } => {
            let cfg = ReportConfig::load(config.as_deref()).context("loading configuration")?;
            print!("{}", cfg.to_toml()?);
            Ok(())
        }
    }
}
