//! Statistical engine.
//!
//! Heterogeneity diagnostics, fixed/random-effects pooling, the
//! orchestration that ties them to prepared study estimates, and the
//! leave-one-out sensitivity analysis built on top.

pub mod distributions;
pub mod heterogeneity;
pub mod orchestrator;
pub mod pooling;
pub mod sensitivity;

pub use orchestrator::{analyze, prepare, run_analysis, AnalysisOptions, DroppedRecord, Preparation};
pub use pooling::{select_pooling_method, DEFAULT_HETEROGENEITY_THRESHOLD};
pub use sensitivity::{leave_one_out, LeaveOneOut};
