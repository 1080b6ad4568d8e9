mod commands;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("privacypass_config=info".parse().unwrap())
                .add_directive("privacypass_config_core=info".parse().unwrap()),
        )
        .init();

    if let Err(err) = run().await {
        print_error(&err);
        std::process::exit(1);
    }
}

/// Execute a command with automatic error context
macro_rules! run_command {
    ($name:expr, $cmd:expr) => {
        $cmd.await
            .with_context(|| format!("Command '{}' failed", $name))
    };
}

async fn run() -> anyhow::Result<()> {
    let cli = commands::Cli::parse();

    match cli.command {
        commands::Commands::Dev(args) => run_command!("dev", commands::dev::run(args)),
        commands::Commands::Deploy(args) => run_command!("deploy", commands::deploy::run(args)),
        commands::Commands::Test(args) => run_command!("test", commands::e2e::run(args)),
    }
}

fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    // Print the error chain
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
        source = cause.source();
    }
}
