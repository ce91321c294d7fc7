//! Core domain models and error types for light-curve screening.
//!
//! This module defines the data structures passed between pipeline stages
//! (exposure tables, light curves, candidates, flare events) and the error
//! taxonomy shared by every stage.

pub mod domain;
pub mod error;

pub use domain::{
    Band, CandidateVariable, ExposureBin, ExposureTable, FlareEnergy, FlareEvent, LightCurve,
    ObjectId, QuiescenceEstimate, RejectionReason, SourcePosition, VisitData, VisitId,
};
pub use error::{PipelineError, PipelineResult};
