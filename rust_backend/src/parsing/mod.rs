//! Parsers for per-visit photometry and exposure files.
//!
//! # Parsers
//!
//! - [`photometry_parser`]: Read photometry tables (CSV or Parquet) into DataFrames
//! - [`exposure_parser`]: Read exposure-time tables (CSV, JSON or Parquet footer metadata)
//! - [`columns`]: Resolve count and flag column names for a band and aperture
//!
//! # Example
//!
//! ```no_run
//! use gfcat_rust::parsing::exposure_parser::parse_exposure;
//! use std::path::Path;
//!
//! let exposure = parse_exposure(Path::new("e23456-nd-30s-exptime.csv"))
//!     .expect("Failed to parse exposure");
//! println!("{} bins, {:.1} s", exposure.len(), exposure.total_exposure());
//! ```

pub mod columns;
pub mod exposure_parser;
pub mod photometry_parser;


pub use columns::{ColumnScheme, FlagPlane};
