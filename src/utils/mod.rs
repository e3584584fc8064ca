//! Shared utilities for validation and data-parallel pixel work

pub mod parallel;
pub mod validation;

pub use validation::NumericValidator;
