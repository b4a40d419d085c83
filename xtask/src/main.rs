//! Build automation tasks for the TJI data pipeline
//!
//! Currently generates the `sheet-checker` command reference from its clap
//! definitions so the docs cannot drift from the binary.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for the TJI data pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the sheet-checker CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<tji_automation::Cli>();

    let content = format!(
        r#"# sheet-checker Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

`sheet-checker` runs each configured dataset's cleaning and compression
notebooks when its Google Sheet has been modified since the last recorded
run. Run times are kept in S3; results are emailed through SES.

## Quick Start

```bash
# What would run right now?
sheet-checker status --config config.yaml

# Nightly cron entry
sheet-checker run --config config.yaml

# Re-run one dataset regardless of the sheet
sheet-checker run --config config.yaml --dataset cdr --force
```

## Commands

{}

## Environment Variables

- `SHEET_CHECKER_CONFIG` - Path to the YAML configuration file
- `GOOGLE_ACCESS_TOKEN` - Drive API bearer token (skips the refresh exchange)
- `GOOGLE_CREDENTIALS_FILE` - OAuth client and refresh token JSON
- `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` - S3 and SES credentials
- `TIMESTAMP_BUCKET` - Bucket holding one object per dataset, keyed by the dataset name
- `S3_ENDPOINT`, `S3_REGION`, `S3_PATH_STYLE` - Non-AWS object stores
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_DIR` - Logging (`info`, `both`, `./logs` by default)

## Configuration

```yaml
{}```

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown,
        tji_automation::config::EXAMPLE_CONFIG
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("sheet-checker.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
