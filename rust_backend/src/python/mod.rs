//! Python bindings for the screening pipeline.
//!
//! Compiled only with the `python` cargo feature. All functions are available
//! in the `gfcat_rust` Python module after installation.
//!
//! # Modules
//!
//! - [`screening`]: Visit screening and flare characterization from files

pub mod screening;

pub use screening::*;
