//! GALEX light-curve screening.
//!
//! Loads per-visit aperture photometry, screens every light curve for
//! variability, removes spatial duplicates and characterizes flares.

pub mod algorithms;
pub mod config;
pub mod core;
pub mod io;
pub mod parsing;
pub mod preprocessing;
pub mod services;

#[cfg(feature = "python")]
pub mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// GFCAT Rust backend - light-curve screening for GALEX visits
#[cfg(feature = "python")]
#[pymodule]
fn gfcat_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(python::screen_visit_files, m)?)?;
    m.add_function(wrap_pyfunction!(python::characterize_flare_file, m)?)?;
    Ok(())
}
