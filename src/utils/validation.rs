//! Numeric validation utilities
//!
//! Range checks used by configuration validation. Every check rejects NaN.

use crate::error::{BgRemovalError, Result};

/// Validator for numeric configuration values
pub struct NumericValidator;

impl NumericValidator {
    /// Validate percentage-like value (0.0 to 1.0)
    pub fn validate_percentage(value: f32, name: &str) -> Result<f32> {
        if !value.is_finite() {
            return Err(BgRemovalError::invalid_config(format!(
                "{name} must be finite, got {value}"
            )));
        }

        if !(0.0..=1.0).contains(&value) {
            return Err(BgRemovalError::invalid_config(format!(
                "{name} must be between 0.0 and 1.0, got {value}"
            )));
        }

        Ok(value)
    }

    /// Validate numeric range (inclusive)
    pub fn validate_range<T>(value: T, min: T, max: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        // written as a negated conjunction so NaN fails too
        if !(value >= min && value <= max) {
            return Err(BgRemovalError::invalid_config(format!(
                "{name} must be between {min} and {max}, got {value}"
            )));
        }
        Ok(value)
    }

    /// Validate that a value is positive
    pub fn validate_positive<T>(value: T, name: &str) -> Result<T>
    where
        T: PartialOrd + std::fmt::Display + Copy + Default,
    {
        if !(value > T::default()) {
            return Err(BgRemovalError::invalid_config(format!(
                "{name} must be positive, got {value}"
            )));
        }
        Ok(value)
    }
}
