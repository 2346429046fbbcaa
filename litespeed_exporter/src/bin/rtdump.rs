//! Collect a report directory once and print the merged snapshot as JSON.
#![allow(clippy::print_stdout)]

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use litespeed_report::{Aggregator, Config, DEFAULT_REPORT_PATH};
use tracing::error;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// directory holding the LiteSpeed real-time reports
    #[clap(long = "lsws.report-path", default_value = DEFAULT_REPORT_PATH)]
    report_path: PathBuf,
    /// upper bound on report files loaded at the same time
    #[clap(long)]
    concurrency_limit: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .finish()
        .init();

    let args = Args::parse();
    let mut config = Config::default();
    if let Some(limit) = args.concurrency_limit {
        config.concurrency_limit = limit;
    }

    // Nothing signals this: a one-shot dump runs to completion.
    let (watcher, _broadcaster) = litespeed_signal::signal();
    let snapshot = match Aggregator::new(config, watcher)
        .collect(&args.report_path)
        .await
    {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Error reading real-time report: {e}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Unable to serialize snapshot: {e}");
            ExitCode::FAILURE
        }
    }
}
