use super::convert::rates_note;
use super::ui;
use crate::converter::Converter;
use crate::core::rates::{RateSnapshot, currency_display};
use anyhow::Result;
use comfy_table::Cell;

pub fn rates_table(snapshot: &RateSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Per 1 {}", snapshot.reference)),
    ]);
    for (code, rate) in &snapshot.rates {
        let (name, _) = currency_display(code);
        table.add_row(vec![
            Cell::new(code),
            Cell::new(name),
            ui::number_cell(format!("{rate:.4}")),
        ]);
    }
    table.to_string()
}

pub async fn run(converter: &Converter, refresh: bool) -> Result<()> {
    let provider = converter.rates();
    let spinner = ui::new_spinner("Fetching currency rates...");
    let snapshot = if refresh {
        provider.refresh().await
    } else {
        provider.get_rates().await
    };
    spinner.finish_and_clear();
    let snapshot = snapshot?;

    println!(
        "Reference: {}\n",
        ui::style_text(&snapshot.reference, ui::StyleType::Title)
    );
    println!("{}", rates_table(&snapshot));
    println!("{}", rates_note(&snapshot, provider.is_stale(&snapshot)));
    Ok(())
}
