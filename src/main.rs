use anyhow::Result;
use clap::Parser;
use hostvm::cli::{self, Commands};
use hostvm::commands;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Logs go to stderr so that `run` output on stdout stays clean.
    // Only use colors when stderr is a TTY.
    let use_color = atty::is(atty::Stream::Stderr);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_target(true)
        .with_ansi(use_color)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch to appropriate command handler
    let result = match cli.cmd {
        Commands::Run(args) => commands::cmd_run(args).await,
        Commands::QemuArgs(args) => commands::cmd_qemu_args(args).await,
        Commands::KnownHosts(args) => commands::cmd_known_hosts(args).await,
    };

    // Handle errors
    if let Err(e) = &result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }

    result
}
