use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use gridline_core::value::display_string;
use gridline_core::{compute_row_key, PrimaryKeySpec, RowSnapshot, Value};
use gridline_services::{HighlightRegistry, PageSummary};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

/// Null renders as an empty cell
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => display_string(other),
    }
}

/// Render a page of rows; recently saved cells are colored
pub fn rows_table(
    rows: &[RowSnapshot],
    primary_keys: &PrimaryKeySpec,
    highlights: &HighlightRegistry,
) -> Table {
    let mut table = new_table();
    let Some(first) = rows.first() else {
        return table;
    };
    let columns: Vec<&String> = first.keys().collect();
    table.set_header(columns.iter().map(|column| {
        let cell = header_cell(column);
        if primary_keys.contains(column) {
            cell.fg(Color::Cyan)
        } else {
            cell
        }
    }));

    for row in rows {
        let row_key = compute_row_key(row, primary_keys);
        table.add_row(columns.iter().map(|column| {
            let text = row.get(column.as_str()).map(cell_text).unwrap_or_default();
            let cell = Cell::new(text);
            if highlights.is_highlighted(&row_key, column) {
                cell.fg(Color::Green).add_attribute(Attribute::Bold)
            } else {
                cell
            }
        }));
    }
    table
}

/// Two-column field/value listing
pub fn record_table(record: &RowSnapshot) -> Table {
    let mut table = new_table();
    table.set_header(vec![header_cell("Field"), header_cell("Value")]);
    for (field, value) in record {
        table.add_row(vec![Cell::new(field), Cell::new(cell_text(value))]);
    }
    table
}

pub fn names_table(header: &str, names: &[String]) -> Table {
    let mut table = new_table();
    table.set_header(vec![header_cell(header)]);
    for name in names {
        table.add_row(vec![name]);
    }
    table
}

pub fn summary_line(summary: &PageSummary) -> String {
    if summary.total == 0 {
        return "No matching records".to_string();
    }
    format!(
        "Page {} of {} | rows {}-{} of {}",
        summary.page, summary.total_pages, summary.first_row, summary.last_row, summary.total
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_line_formats() {
        let summary = PageSummary {
            page: 2,
            total_pages: 3,
            total: 250,
            first_row: 101,
            last_row: 200,
            has_previous: true,
            has_next: true,
        };
        assert_eq!(summary_line(&summary), "Page 2 of 3 | rows 101-200 of 250");
    }

    #[test]
    fn null_cells_are_blank() {
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!(30.0)), "30");
    }

    #[test]
    fn rows_table_uses_first_row_columns() {
        let rows: Vec<RowSnapshot> = vec![
            serde_json::from_value(json!({"type": "X1", "vdss_V": 30})).unwrap(),
            serde_json::from_value(json!({"type": "X2", "vdss_V": null})).unwrap(),
        ];
        let rendered = rows_table(&rows, &PrimaryKeySpec::new(["type"]), &HighlightRegistry::new())
            .to_string();
        assert!(rendered.contains("vdss_V"));
        assert!(rendered.contains("X2"));
    }
}
