//! Core conversion model and the seams around it

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod log;
pub mod rates;
pub mod units;

// Re-export main types for cleaner imports
pub use cache::SnapshotStore;
pub use error::ConvertError;
pub use history::{HistoryEntry, HistorySink};
pub use rates::{CURRENCY_CATEGORY, RateOrigin, RateSnapshot, RateSource};
pub use units::{Category, ConversionRule, Unit, UnitInfo, UnitRegistry};
