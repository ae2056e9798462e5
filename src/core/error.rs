//! Conversion error taxonomy

use thiserror::Error;

/// Errors surfaced by the registry, the engine and the rate provider.
///
/// Lookup and input failures are returned to the caller as-is. Network and
/// store faults are recovered inside the rate provider and only show up here
/// when no fallback table is configured.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown unit '{unit}' in category {category}")]
    UnknownUnit { category: String, unit: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Currency rates unavailable: {0}")]
    RatesUnavailable(String),

    #[error("Failed to persist rate snapshot: {0}")]
    StoreWriteFailed(String),
}

impl ConvertError {
    pub fn unknown_unit(category: &str, unit: &str) -> Self {
        ConvertError::UnknownUnit {
            category: category.to_string(),
            unit: unit.to_string(),
        }
    }
}
