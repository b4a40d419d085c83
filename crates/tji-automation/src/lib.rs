//! TJI Automation
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Cron-driven runner that re-cleans a dataset when its Google Sheet changes.
//!
//! # Overview
//!
//! For every configured dataset the [`Runner`](runner::Runner):
//!
//! 1. compares the sheet's Drive modification time with the watermark left
//!    by the previous run ([`detector`], [`storage`]),
//! 2. if the sheet changed (or the dataset is forced) executes the cleaning
//!    notebooks, then the compression notebooks ([`executor`]),
//! 3. emails the outcome of each phase ([`notifier`]),
//! 4. stores a new watermark, unless a stage failed.
//!
//! The `sheet-checker` binary wires these to S3, Google Drive, SES and
//! `jupyter nbconvert`; every seam is a trait so tests can substitute fakes.

pub mod commands;
pub mod config;
pub mod detector;
pub mod executor;
pub mod job;
pub mod notifier;
pub mod runner;
pub mod sheets;
pub mod storage;

pub use config::SheetCheckerConfig;
pub use job::DatasetJob;
pub use runner::{RunOutcome, Runner};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Check Google Sheets for changes and re-run cleaning and compression notebooks
#[derive(Parser, Debug)]
#[command(name = "sheet-checker")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check sheets and run notebooks for changed (or forced) datasets
    Run {
        /// File path of the config .yaml file
        #[arg(short, long, value_name = "FILE", env = "SHEET_CHECKER_CONFIG")]
        config: PathBuf,

        /// Only process these datasets (repeatable); runs them even if disabled
        #[arg(short, long = "dataset", value_name = "KEY")]
        datasets: Vec<String>,

        /// Clean and compress even if the sheet has not changed
        #[arg(short, long)]
        force: bool,
    },

    /// Show watermark and sheet modification time without running anything
    Status {
        /// File path of the config .yaml file
        #[arg(short, long, value_name = "FILE", env = "SHEET_CHECKER_CONFIG")]
        config: PathBuf,

        /// Only show these datasets (repeatable)
        #[arg(short, long = "dataset", value_name = "KEY")]
        datasets: Vec<String>,
    },
}
