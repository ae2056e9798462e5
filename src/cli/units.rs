use super::ui;
use crate::converter::Converter;
use crate::core::UnitInfo;
use crate::core::rates::CURRENCY_CATEGORY;
use anyhow::Result;
use comfy_table::Cell;

pub fn units_table(category: &str, units: &[UnitInfo]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Unit"),
        ui::header_cell("Name"),
        ui::header_cell("Symbol"),
    ]);
    for unit in units {
        table.add_row(vec![
            Cell::new(&unit.key),
            Cell::new(&unit.name),
            Cell::new(&unit.symbol),
        ]);
    }

    format!(
        "Category: {}\n\n{}",
        ui::style_text(category, ui::StyleType::Title),
        table
    )
}

pub async fn run(converter: &Converter, category: &str) -> Result<()> {
    let is_currency = category.eq_ignore_ascii_case(CURRENCY_CATEGORY);
    // Only a cold cache blocks; a stale one is served and refreshed behind
    let spinner = (is_currency && converter.cached_snapshot().is_none())
        .then(|| ui::new_spinner("Fetching currency rates..."));
    let units = converter.list_units(category).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    println!("{}", units_table(category, &units?));
    Ok(())
}

pub fn run_categories(converter: &Converter) -> Result<()> {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Category"), ui::header_cell("Precision")]);
    for category in converter.categories() {
        let precision = converter.precision(category)?;
        table.add_row(vec![
            Cell::new(category),
            ui::number_cell(precision.to_string()),
        ]);
    }
    println!("{table}");
    Ok(())
}
