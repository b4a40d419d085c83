//! TJI Cleaning Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Helpers shared by the dataset cleaning jobs: column standardization for
//! race, gender, age and date fields, police agency name canonicalization,
//! and datasheet composition summaries.
//!
//! Data is handled as a [`Table`]: a header row plus rows of optional string
//! cells, read from and written to CSV. Empty CSV cells are missing values.

pub mod agency;
pub mod datasheet;
pub mod error;
pub mod standardize;
pub mod table;

pub use error::{CleaningError, Result};
pub use table::Table;
