//! High-level visit loading.
//!
//! Combines the photometry and exposure parsers with light-curve
//! construction, producing [`VisitData`](crate::core::domain::VisitData)
//! ready for screening.
//!
//! # Example
//!
//! ```no_run
//! use gfcat_rust::config::PipelineConfig;
//! use gfcat_rust::core::domain::VisitId;
//! use gfcat_rust::io::loaders::VisitFileLoader;
//! use std::path::Path;
//!
//! let visit = VisitFileLoader::load(
//!     Path::new("e23456-nd-30s-photom.csv"),
//!     Path::new("e23456-nd-30s-exptime.csv"),
//!     VisitId(23456),
//!     &PipelineConfig::default(),
//! )
//! .expect("Failed to load");
//! println!("Loaded {} light curves", visit.light_curves.len());
//! ```

pub mod loaders;

#[cfg(test)]
mod loaders_tests;

pub use loaders::{LightCurveLoader, VisitFileLoader};
