//! Per-visit screening: filter chain, spatial deduplication and the
//! cursed-visit valve combined into one pass.

pub mod pipeline;

pub use pipeline::{characterize_flare, screen, VisitOutcome, VisitPipeline, VisitScreening};
