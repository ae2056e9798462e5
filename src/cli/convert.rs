use super::ui;
use crate::converter::Converter;
use crate::core::engine::{format_value, parse_value};
use crate::core::rates::{CURRENCY_CATEGORY, RateSnapshot};
use anyhow::Result;

/// The input is echoed as typed, the result at the category precision.
pub fn format_conversion(value: f64, from: &str, result: f64, to: &str, precision: u32) -> String {
    format!(
        "{} {} = {} {}",
        format_value(value, ui::DISPLAY_PRECISION.max(precision)),
        from,
        ui::style_text(&format_value(result, precision), ui::StyleType::Result),
        to
    )
}

/// Describes where currency rates came from and how old they are.
pub fn rates_note(snapshot: &RateSnapshot, stale: bool) -> String {
    if snapshot.is_fallback() {
        return ui::style_text(
            "Warning: live rates unavailable, using built-in approximate rates",
            ui::StyleType::Warning,
        );
    }
    let updated = format!(
        "Rates last updated: {}",
        snapshot.timestamp.format("%Y-%m-%d %H:%M UTC")
    );
    if stale {
        ui::style_text(
            &format!("{updated} (stale, refresh failed)"),
            ui::StyleType::Warning,
        )
    } else {
        ui::style_text(&updated, ui::StyleType::Subtle)
    }
}

pub async fn run(
    converter: &Converter,
    category: &str,
    raw_value: &str,
    from: &str,
    to: &str,
) -> Result<()> {
    let value = parse_value(raw_value)?;
    let is_currency = category.eq_ignore_ascii_case(CURRENCY_CATEGORY);

    let needs_fetch = is_currency
        && converter
            .cached_snapshot()
            .is_none_or(|s| converter.rates().is_stale(&s));
    let spinner = needs_fetch.then(|| ui::new_spinner("Fetching currency rates..."));
    let result = converter.convert(category, from, to, value).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let result = result?;

    let precision = converter.precision(category)?;
    println!("{}", format_conversion(value, from, result, to, precision));

    if is_currency {
        if let Some(snapshot) = converter.cached_snapshot() {
            let stale = converter.rates().is_stale(&snapshot);
            println!("{}", rates_note(&snapshot, stale));
        }
    }
    Ok(())
}
