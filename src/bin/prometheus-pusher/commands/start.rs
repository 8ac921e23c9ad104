use anyhow::{Context, Result};
use clap::Parser;
use prometheus_pusher::config::PusherConfig;
use prometheus_pusher::http_client;
use prometheus_pusher::instance::resolve_instance;
use prometheus_pusher::parser::gateway_parser;
use prometheus_pusher::relay::HttpRelay;
use prometheus_pusher::scheduler::Scheduler;
use std::future;
use std::path::Path;
use tracing::{error, info};
use url::Url;

#[derive(Parser, Clone, Debug, Default)]
pub struct Arguments {
    /// Value of the `instance` label attached to every push.
    ///
    /// Defaults to the hostname of this machine.
    #[clap(long, env = "PROMETHEUS_PUSHER_INSTANCE")]
    instance: Option<String>,

    /// The Pushgateway to push to. Overrides `pushgateway_url` from the
    /// configuration.
    ///
    /// The endpoint can be provided in the following formats:
    /// - `:9091`. Defaults to `http` and `localhost`.
    /// - `gateway:9091`. Defaults to `http`.
    /// - `https://gateway/prefix`. No defaults.
    #[clap(long, env = "PROMETHEUS_PUSHER_GATEWAY_URL", value_parser = gateway_parser, verbatim_doc_comment)]
    pushgateway_url: Option<Url>,
}

pub async fn handle_command(args: Arguments, config_path: &Path) -> Result<()> {
    let mut config = PusherConfig::load(config_path).with_context(|| {
        format!(
            "Unable to load configuration from {}",
            config_path.display()
        )
    })?;

    if let Some(gateway_url) = args.pushgateway_url {
        config.gateway_url = gateway_url;
    }

    let instance =
        resolve_instance(args.instance.as_deref()).context("Unable to determine instance name")?;

    info!(
        instance_name = %instance,
        pushgateway_url = %config.gateway_url,
        push_interval = %humantime::format_duration(config.push_interval),
        "Starting prometheus-pusher"
    );

    for source in &config.sources {
        info!(job = %source.name, url = %source.url, "Relaying metric source");
    }

    let client = http_client().context("Unable to create http client")?;
    let relay = HttpRelay::new(client, config.gateway_url, instance);

    Scheduler::new(config.push_interval, config.sources, relay)
        .run_until(shutdown_signal())
        .await;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("SIGINT signal received, exiting..."),
        Err(err) => {
            error!(?err, "Unable to listen for SIGINT, running until killed");
            future::pending::<()>().await
        }
    }
}
