use crate::interactive::{confirm, confirm_optional, user_input, user_input_optional};
use anyhow::{bail, Context, Result};
use clap::Parser;
use prometheus_pusher::config::{
    GlobalSection, PushInterval, PusherConfig, SourceSection, GLOBAL_SECTION,
};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Clone)]
pub struct Arguments {
    /// Where the file should be outputted to. Defaults to current directory
    #[clap(long, env, default_value = "./prometheus-pusher.toml")]
    output: PathBuf,

    /// Whenever to forcefully override an existing file, if it already exists
    #[clap(long, env)]
    force: bool,
}

pub fn handle_command(args: Arguments) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!("Output file already exists. Supply --force to override");
    }

    let mut document = toml::Table::new();

    let global = GlobalSection::new(
        user_input_optional("Pushgateway URL (leave empty for http://localhost:9091)")?,
        prompt_push_interval()?,
    );
    document.insert(GLOBAL_SECTION.to_string(), toml::Value::try_from(global)?);

    while confirm("Do you want to add (more) metric sources?")? {
        let (name, section) = prompt_source()?;
        if document.contains_key(&name) {
            warn!("A section named [{name}] already exists, skipping");
            continue;
        }
        document.insert(name, toml::Value::try_from(section)?);
    }

    let config = toml::to_string(&document)?;

    // Refuse to write something the pusher would not be able to load.
    PusherConfig::from_toml_str(&config).context("generated configuration is invalid")?;

    fs::write(&args.output, config).context("failed to write file to disk")?;

    info!("Successfully written config to {}", args.output.display());
    Ok(())
}

fn prompt_source() -> Result<(String, SourceSection)> {
    let name = loop {
        let name = user_input("Name of the metric source (used as job label)")?;
        if name == GLOBAL_SECTION {
            warn!("[{GLOBAL_SECTION}] is reserved for global settings");
            continue;
        }
        break name;
    };

    let host = user_input_optional("Host (leave empty for localhost)")?;
    let port = loop {
        match user_input("Port")?.parse::<u16>() {
            Ok(port) if port != 0 => break port,
            _ => warn!("Port must be a number between 1 and 65535"),
        }
    };
    let path = user_input_optional("Path (leave empty for /metrics)")?;
    let ssl = confirm_optional("Use https (optional)?")?;

    Ok((name, SourceSection::new(host, port, path, ssl)))
}

fn prompt_push_interval() -> Result<Option<PushInterval>> {
    let push_interval: Option<i64> =
        user_input_optional("Push interval in seconds (leave empty for default)")?
            .and_then(|i| i.parse().ok())
            .filter(|secs| *secs > 0);

    Ok(push_interval.map(PushInterval::Seconds))
}
