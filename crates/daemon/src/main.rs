// SPDX-License-Identifier: MIT

//! `receptord`: the daemon binary, grounded in the Go original's
//! `cli/main.go` — parse flags, load config, init and start a `Receptor`,
//! then block until a shutdown signal or an unexpected service failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use receptor_daemon::{env, Receptor};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "receptord", about = "Event-routing daemon for service discovery")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, default_value = "./receptor.conf.json")]
    config: PathBuf,

    /// Directory plugin executables are looked up in.
    #[arg(long, default_value = "./plugins")]
    plugins: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match receptor_daemon::config::load_from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "could not load config");
            return ExitCode::from(1);
        }
    };

    let mut receptor = match Receptor::init(&config, cli.plugins).await {
        Ok(receptor) => receptor,
        Err(err) => {
            tracing::error!(%err, "could not set up services");
            return ExitCode::from(1);
        }
    };

    tracing::info!("starting services");
    receptor.start();
    tracing::info!("services running");

    let mut failure = false;
    tokio::select! {
        result = wait_for_shutdown_signal() => {
            match result {
                Ok(()) => tracing::info!("shutdown initiated"),
                Err(err) => tracing::error!(%err, "failed to install signal handlers, shutting down anyway"),
            }
        }
        () = receptor.failed() => {
            tracing::error!("a service failed unexpectedly, shutting down");
            failure = true;
        }
    }

    let missed = receptor.stop(env::service_stop_timeout(), env::plugin_stop_timeout()).await;
    if !missed.is_empty() {
        tracing::warn!(services = ?missed, "some services did not stop within the timeout");
    }
    tracing::info!("shutdown complete");

    if failure {
        ExitCode::from(2)
    } else {
        ExitCode::from(0)
    }
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
