//! sheet-checker - Main entry point

use clap::Parser;
use std::process;
use tji_automation::{Cli, Commands};
use tji_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tracing::error;

#[tokio::main]
async fn main() {
    // `.env` is optional; real deployments export variables from cron
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Console plus a daily log file under ./logs, as the cron job always had
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Both)
        .log_file_prefix("sheet-checker")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,hyper=warn")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring logging environment: {}", e);
            log_config
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    let result = match &cli.command {
        Commands::Run {
            config,
            datasets,
            force,
        } => tji_automation::commands::run::run(config, datasets, *force).await,
        Commands::Status { config, datasets } => tji_automation::commands::status::run(config, datasets).await,
    };

    if let Err(e) = result {
        error!(error = %format!("{:#}", e), "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
