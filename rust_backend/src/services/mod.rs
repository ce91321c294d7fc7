//! Survey-level orchestration.
//!
//! Services sit above the per-visit pipeline: they fetch visits from a
//! [`survey::VisitSource`], screen them concurrently and aggregate the
//! results into a [`catalog::SurveyCatalog`].

pub mod catalog;
pub mod checksum;
pub mod survey;

pub use catalog::{CandidateRow, SurveyCatalog};
pub use checksum::screening_digest;
pub use survey::{
    DirectoryVisitSource, LocalVisitSource, SurveyReport, SurveyScreener, VisitFailure, VisitSource,
};
