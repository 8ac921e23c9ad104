use anyhow::{Context, Result};
use clap::Parser;
use prometheus_pusher::config::PusherConfig;
use std::path::Path;
use tracing::info;

#[derive(Parser, Clone, Debug)]
pub struct Arguments {
    /// Pretty print the resulting JSON (defaults to false)
    #[arg(short, long, default_value = "false")]
    pretty: bool,
}

pub fn handle_command(args: Arguments, config_path: &Path) -> Result<()> {
    let config = PusherConfig::load(config_path).with_context(|| {
        format!(
            "Unable to load configuration from {}",
            config_path.display()
        )
    })?;

    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", serde_json::to_string(&config)?);
    }

    info!(
        sources = config.sources.len(),
        "Configuration in {} is valid",
        config_path.display()
    );
    Ok(())
}
