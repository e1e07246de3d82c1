// THEORY:
// This file is the main entry point for the `screen_compare` library crate.
// It exports `ComparisonPipeline` and its associated data structures
// (`ComparisonConfig`, `ComparisonReport`, `Verdict`) as the high-level
// interface for comparing a baseline screenshot against a current one. The
// per-stage modules live under `core_modules` and stay usable on their own,
// e.g. to run only the differencer or only the template matcher.

pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use error::{ComparisonError, ImageRole};
pub use pipeline::{ComparisonConfig, ComparisonPipeline, ComparisonReport, Verdict};
