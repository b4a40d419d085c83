//! TJI Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the TJI data-processing workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`TjiError`] and the [`Result`] alias used by the
//!   automation and cleaning crates
//! - **Logging**: console/file `tracing` setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use tji_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("sheet checker starting");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{Result, TjiError};
