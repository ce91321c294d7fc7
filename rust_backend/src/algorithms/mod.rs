//! Screening and characterization algorithms.
//!
//! All algorithms are pure functions (or thin configured wrappers around
//! them) over in-memory light curves; none of them perform I/O.
//!
//! # Components
//!
//! - [`stats`]: robust quiescence, Anderson-Darling test, peak detection
//! - [`spikes`]: crude single-bin artifact filter
//! - [`screening`]: the ordered variability filter chain
//! - [`dedup`]: spatial clustering and duplicate resolution within a visit
//! - [`flares`]: two-pass flare delineation and energy integration
//! - [`photometry`]: unit conversions, aperture correction, summaries
//!
//! # Example
//!
//! ```ignore
//! use gfcat_rust::algorithms::{SpatialDeduplicator, VariabilityScreener};
//!
//! let outcome = VariabilityScreener::default().screen_all(&light_curves, &exposure);
//! let deduped = SpatialDeduplicator::default().eliminate_dupes(&outcome.candidates);
//! println!("{} candidates survive", deduped.kept.len());
//! ```

pub mod dedup;
pub mod flares;
pub mod photometry;
pub mod screening;
pub mod spikes;
pub mod stats;

pub use dedup::{dbscan, DedupOutcome, SpatialDeduplicator};
pub use flares::{FlareCharacterization, FlareCharacterizer, FlarePeak};
pub use photometry::{
    aperture_correct_cps, aperture_correction, counts_to_flux, counts_to_mag, galex_to_utc,
    mag_to_counts, summarize_photometry, LightCurveSummary, PhotometrySummary,
};
pub use screening::{classify, Classification, ScreeningOutcome, VariabilityScreener};
pub use spikes::{count_spikes, is_spiky, SpikeCount};
pub use stats::{
    anderson_darling, find_peaks, median, robust_quiescence, sigma_clip, AndersonDarling,
    SignificanceLevel,
};
