use anyhow::{Context, Result};
use clap::Parser;
use commands::{handle_command, Application, LogFormat};
use std::io;
use tracing::metadata::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

mod commands;
mod interactive;

#[tokio::main]
async fn main() {
    let app = Application::parse();

    if let Err(err) = init_logging(app.log_format) {
        eprintln!("Unable to initialize logging: {:#}", err);
        std::process::exit(1);
    }

    let result = handle_command(app).await;

    match result {
        Ok(_) => debug!("Command completed successfully"),
        Err(err) => {
            error!("Command failed: {:?}", err);
            std::process::exit(1);
        }
    }
}

/// Initialize logging for the application.
///
/// Everything that is level info and higher is logged to stderr, either as
/// human readable text or as one JSON object per line. Users are able to
/// influence this by exporting the `RUST_LOG` environment variable.
///
/// For example: while debugging a misbehaving source it is convenient to set
/// the environment variable to `RUST_LOG=prometheus_pusher=debug,info`.
fn init_logging(format: LogFormat) -> Result<()> {
    // The filter layer controls which log levels to display.
    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let registry = Registry::default().with(filter_layer);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
    }
    .context("unable to initialize logger")?;

    Ok(())
}
