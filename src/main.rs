#![forbid(unsafe_code)]

mod bindings;
mod cli;
mod commands;
mod config;
mod constants;
mod coordinator;
mod display_mode;
mod host;
mod ipc;
mod migration;
mod storage;

use anyhow::Result;
use clap::Parser;
use tracing::Level as TraceLevel;
use tracing_subscriber::FmtSubscriber;

use cli::Cli;
use config::Config;

fn parse_level(level: &str) -> TraceLevel {
    match level.trim().to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, notices) = Config::load(cli.config.as_deref())?;

    // LOG_LEVEL wins over the config file
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| config.log_level.clone());

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&log_level))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    for notice in &notices {
        notice.log();
    }

    cli::run(cli, config).await
}
