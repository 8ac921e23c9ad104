use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod check;
pub mod init;
pub mod start;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Application {
    #[command(subcommand)]
    pub command: Option<SubCommands>,

    /// Config file or directory. If a directory is specified then all files in
    /// the directory will be loaded.
    #[clap(
        short,
        long,
        env = "PROMETHEUS_PUSHER_CONFIG",
        default_value = "/etc/prometheus-pusher/conf.d",
        global = true
    )]
    pub config: PathBuf,

    /// Output format of the log lines written to stderr.
    #[clap(long, env, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Arguments for `start`, which runs when no subcommand is given.
    #[command(flatten)]
    pub start: start::Arguments,
}

#[derive(Subcommand)]
pub enum SubCommands {
    /// Relay the metrics of every configured source to the Pushgateway on
    /// every push interval, until interrupted.
    Start(start::Arguments),

    /// Load and validate the configuration, then print the resolved metric
    /// sources.
    Check(check::Arguments),

    /// Interactively create a configuration file.
    Init(init::Arguments),
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

pub async fn handle_command(app: Application) -> Result<()> {
    match app.command {
        Some(SubCommands::Start(args)) => start::handle_command(args, &app.config).await,
        Some(SubCommands::Check(args)) => check::handle_command(args, &app.config),
        Some(SubCommands::Init(args)) => init::handle_command(args),
        None => start::handle_command(app.start, &app.config).await,
    }
}
