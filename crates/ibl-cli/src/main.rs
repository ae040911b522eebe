use clap::Parser;
use tracing::Level;

mod cli;
mod commands;
mod config;
mod crash;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();
    commands::run_command(cli)
}
