//! Output formatting utilities for CLI commands.

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};

use solstice_model::ConstructionStatus;

/// Print a table with cyan headers.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{table}");
}

/// Format a ratio as a two-decimal percentage: 33.33%
pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Format an optional timestamp as a date, or "-".
pub fn format_opt_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Display color for a construction status.
pub fn status_color(status: ConstructionStatus) -> Color {
    match status {
        ConstructionStatus::NotStarted => Color::Grey,
        ConstructionStatus::Started => Color::Yellow,
        ConstructionStatus::AwaitingMeter => Color::Cyan,
        ConstructionStatus::MeterInstalled => Color::Green,
    }
}

/// Print a single row with a colored status cell.
pub fn print_status_line(label: &str, status: ConstructionStatus) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![
        Cell::new(label),
        Cell::new(status.as_str()).fg(status_color(status)),
    ]);
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_to_two_decimals() {
        assert_eq!(format_percent(33.333), "33.33%");
        assert_eq!(format_percent(0.0), "0.00%");
        assert_eq!(format_percent(100.0), "100.00%");
    }
}
