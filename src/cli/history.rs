use super::ui::{self, DISPLAY_PRECISION};
use crate::core::HistoryEntry;
use crate::core::engine::format_value;
use crate::core::history::HistorySink;
use anyhow::Result;
use comfy_table::Cell;

pub fn history_table(entries: &[HistoryEntry]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("When"),
        ui::header_cell("Category"),
        ui::header_cell("Input"),
        ui::header_cell("Output"),
    ]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&entry.category),
            ui::number_cell(format!(
                "{} {}",
                format_value(entry.input, DISPLAY_PRECISION),
                entry.from_unit
            )),
            ui::number_cell(format!(
                "{} {}",
                format_value(entry.output, DISPLAY_PRECISION),
                entry.to_unit
            )),
        ]);
    }
    table.to_string()
}

pub async fn run(history: &dyn HistorySink, clear: bool, limit: usize) -> Result<()> {
    if clear {
        history.clear().await?;
        println!("Conversion history cleared");
        return Ok(());
    }

    let entries = history.recent(limit).await?;
    if entries.is_empty() {
        println!("{}", ui::style_text("No conversions yet", ui::StyleType::Subtle));
        return Ok(());
    }
    println!("{}", history_table(&entries));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryHistory;

    #[test]
    fn test_history_table() {
        let entries = vec![HistoryEntry::new("Length", "Mile", "Kilometer", 1.0, 1.609)];
        let output = console::strip_ansi_codes(&history_table(&entries)).to_string();
        assert!(output.contains("1 Mile"));
        assert!(output.contains("1.609 Kilometer"));
    }

    #[tokio::test]
    async fn test_clear_empties_history() {
        let history = MemoryHistory::new(5);
        history
            .record(HistoryEntry::new("Time", "Hour", "Minute", 1.0, 60.0))
            .await
            .unwrap();

        run(&history, true, 5).await.unwrap();
        assert!(history.recent(5).await.unwrap().is_empty());
    }
}
