//! Report output.
//!
//! Builds the JSON result document consumed by downstream plotting and
//! manuscript tooling, and an optional Markdown summary for humans.

pub mod document;
pub mod generator;

pub use document::{PooledBlock, ResultDocument};
pub use generator::{generate_json_report, generate_markdown_report};
