//! tji-clean - Main entry point

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tji_cleaning::{agency, datasheet, standardize, Table};
use tji_common::logging::{init_logging, LogConfig, LogLevel};
use tracing::{error, info};

/// TJI data cleaning helpers
#[derive(Parser, Debug)]
#[command(name = "tji-clean")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upcase/strip cells and standardize race, gender, age and date columns
    Standardize {
        /// Input CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the canonical form of each agency name
    Agency {
        /// Agency names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Render the datasheet composition section for a CSV
    Datasheet {
        /// Input CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Write markdown here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column whose distinct values are listed in the summary
        #[arg(short, long)]
        category: Option<String>,

        /// Numeric age column to describe under subpopulations
        #[arg(long)]
        age: Option<String>,

        /// Sex column, cross-tabulated against --race
        #[arg(long, requires = "race")]
        sex: Option<String>,

        /// Race column, cross-tabulated against --sex
        #[arg(long, requires = "sex")]
        race: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .log_file_prefix("tji-clean")
        .build();
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

    if let Err(e) = execute(cli.command) {
        error!(error = %format!("{:#}", e), "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn execute(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Standardize { input, output } => {
            let mut table = Table::from_path(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            let reports = standardize::standardize_all(&mut table)?;
            table
                .to_path(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            let replaced: usize = reports.iter().map(|r| r.replaced).sum();
            info!(rows = table.len(), replaced, "Standardized table");
            for report in reports.iter().filter(|r| r.replaced > 0) {
                eprintln!(
                    "{}: replaced {} bad values {:?}",
                    report.column, report.replaced, report.bad_values
                );
            }
            println!("Wrote {} rows to {}", table.len(), output.display());
        },

        Commands::Agency { names } => {
            for name in names {
                let canonical = agency::standardize_agency_name(Some(&name)).unwrap_or_default();
                println!("{}\t{}", name, canonical);
            }
        },

        Commands::Datasheet {
            input,
            output,
            category,
            age,
            sex,
            race,
        } => {
            let table = Table::from_path(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            let summaries = datasheet::summarize(&table)?;
            let today = chrono::Utc::now().date_naive();
            let mut markdown = datasheet::render_composition(&table, &summaries, category.as_deref(), today)?;

            let subpopulations = datasheet::Subpopulations {
                age: age.as_deref(),
                sex: sex.as_deref(),
                race: race.as_deref(),
            };
            if !subpopulations.is_empty() {
                markdown.push('\n');
                markdown.push_str(&datasheet::render_subpopulations(&table, subpopulations)?);
            }

            match output {
                Some(path) => {
                    std::fs::write(&path, markdown).with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {}", path.display());
                },
                None => print!("{}", markdown),
            }
        },
    }
    Ok(())
}
