use std::{io, net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use litespeed_exporter::{
    config::{self, Config},
    exporter::Exporter,
    httpd,
};
use tokio::{pin, runtime::Builder, signal};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::Error),
    #[error("HTTP server failed: {0}")]
    Httpd(#[from] httpd::Error),
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// path on disk to the YAML configuration file
    #[clap(long)]
    config_path: Option<PathBuf>,
    /// address to listen on for the landing page and telemetry
    #[clap(long = "web.listen-address")]
    listen_address: Option<SocketAddr>,
    /// path under which to expose metrics
    #[clap(long = "web.telemetry-path")]
    telemetry_path: Option<String>,
    /// directory holding the LiteSpeed real-time reports
    #[clap(long = "lsws.report-path")]
    report_path: Option<PathBuf>,
    /// upper bound on report files loaded at the same time
    #[clap(long)]
    concurrency_limit: Option<usize>,
    /// validate the configuration and exit
    #[clap(long)]
    config_check: bool,
}

fn get_config(cli: &Cli) -> Result<Config, Error> {
    let mut config = match cli.config_path {
        Some(ref path) => Config::from_path(path)?,
        None => Config::default(),
    };

    if let Some(addr) = cli.listen_address {
        config.listen_address = addr;
    }
    if let Some(ref path) = cli.telemetry_path {
        config.telemetry_path.clone_from(path);
    }
    if let Some(ref path) = cli.report_path {
        config.report_path.clone_from(path);
    }
    if let Some(limit) = cli.concurrency_limit {
        config.concurrency_limit = limit;
    }

    config.validate()?;
    Ok(config)
}

async fn inner_main(config: Config) -> Result<(), Error> {
    let (shutdown_watcher, shutdown_broadcast) = litespeed_signal::signal();
    let exporter = Arc::new(Exporter::new(&config, shutdown_watcher.clone()));
    info!(
        "Reading reports from {path:?}, serving metrics on {addr}{telemetry}",
        path = config.report_path,
        addr = config.listen_address,
        telemetry = config.telemetry_path,
    );

    let server = httpd::run(
        config.listen_address,
        &config.telemetry_path,
        exporter,
        shutdown_watcher,
    );
    pin!(server);

    tokio::select! {
        res = &mut server => {
            // The server only returns early if it could not start.
            return res.map_err(Error::from);
        }
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Unable to listen for ctrl-c: {e}");
            }
            info!("Received ctrl-c, shutting down.");
        }
    }

    shutdown_broadcast.signal();
    server.await?;
    Ok(())
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting litespeed_exporter {version}.");

    let cli = Cli::parse();
    let config = match get_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return Err(e);
        }
    };
    if cli.config_check {
        info!("Configuration is valid.");
        return Ok(());
    }

    let runtime = Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;
    let res = runtime.block_on(inner_main(config));
    info!("Bye. :)");
    res
}
