//! Currency rate snapshots and the source abstraction

use crate::core::error::ConvertError;
use crate::core::units::{Category, Unit, UnitInfo};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CURRENCY_CATEGORY: &str = "Currency";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateOrigin {
    #[default]
    Live,
    Fallback,
}

/// Immutable set of rates, each expressed as units of a currency per one
/// unit of `reference`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub reference: String,
    pub rates: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub origin: RateOrigin,
}

impl RateSnapshot {
    pub fn new(reference: &str, rates: BTreeMap<String, f64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            reference: reference.to_string(),
            rates,
            timestamp,
            origin: RateOrigin::Live,
        }
    }

    /// Minimal hard-coded table used when neither the network nor the store
    /// can supply rates.
    pub fn fallback() -> Self {
        let rates = [
            ("USD", 1.0),
            ("EUR", 0.92),
            ("GBP", 0.79),
            ("JPY", 149.5),
            ("INR", 83.1),
            ("CAD", 1.36),
            ("AUD", 1.52),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();
        Self {
            reference: "USD".to_string(),
            rates,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            origin: RateOrigin::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == RateOrigin::Fallback
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.to_ascii_uppercase()).copied()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// Fallback snapshots are always stale so callers keep retrying.
    pub fn is_stale_at(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.is_fallback() || self.age(now) >= window
    }

    /// Builds a transient currency category holding only the requested
    /// codes, with the reference currency as the implicit base.
    pub fn category(&self, precision: u32, codes: &[&str]) -> Result<Category, ConvertError> {
        let mut category = Category::new(CURRENCY_CATEGORY, precision);
        for code in codes {
            let code = code.to_ascii_uppercase();
            if category.unit(&code).is_ok() {
                continue;
            }
            let rate = self
                .rate(&code)
                .filter(|rate| rate.is_finite() && *rate > 0.0)
                .ok_or_else(|| ConvertError::unknown_unit(CURRENCY_CATEGORY, &code))?;
            let (name, symbol) = currency_display(&code);
            category.units.push(Unit::linear(&code, name, symbol, 1.0 / rate));
        }
        Ok(category)
    }

    pub fn unit_infos(&self) -> Vec<UnitInfo> {
        self.codes()
            .map(|code| {
                let (name, symbol) = currency_display(code);
                UnitInfo {
                    key: code.to_string(),
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                }
            })
            .collect()
    }
}

/// Display name and symbol for a currency code; unknown codes echo the code.
pub fn currency_display(code: &str) -> (&str, &str) {
    match code {
        "USD" => ("US Dollar", "$"),
        "EUR" => ("Euro", "€"),
        "GBP" => ("British Pound", "£"),
        "JPY" => ("Japanese Yen", "¥"),
        "CNY" => ("Chinese Yuan", "¥"),
        "INR" => ("Indian Rupee", "₹"),
        "KRW" => ("South Korean Won", "₩"),
        "CHF" => ("Swiss Franc", "Fr"),
        "AUD" => ("Australian Dollar", "A$"),
        "CAD" => ("Canadian Dollar", "C$"),
        "NZD" => ("New Zealand Dollar", "NZ$"),
        "RUB" => ("Russian Ruble", "₽"),
        "MXN" => ("Mexican Peso", "MX$"),
        "SGD" => ("Singapore Dollar", "S$"),
        "HKD" => ("Hong Kong Dollar", "HK$"),
        "BRL" => ("Brazilian Real", "R$"),
        "IDR" => ("Indonesian Rupiah", "Rp"),
        "ZAR" => ("South African Rand", "R"),
        other => (other, other),
    }
}

/// Live source of rate snapshots, e.g. an HTTP API.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self, reference: &str) -> Result<RateSnapshot>;
}
