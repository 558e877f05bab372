use chrono::{DateTime, Local, Utc};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, TableComponent,
    modifiers::UTF8_SOLID_INNER_BORDERS, presets::UTF8_FULL,
};

use crate::store::SessionStatus;

/// Confidence in 0..=1 as a whole percentage
pub(super) fn format_percent(fraction: f64) -> String {
    if fraction.is_nan() {
        "N/A".to_string()
    } else {
        format!("{:.0}%", fraction * 100.0)
    }
}

/// Human-readable byte size (B, KB, MB)
pub(super) fn format_bytes(n: u64) -> String {
    if n >= 1024 * 1024 {
        format!("{:.1} MB", n as f64 / (1024.0 * 1024.0))
    } else if n >= 1024 {
        format!("{:.1} KB", n as f64 / 1024.0)
    } else {
        format!("{n} B")
    }
}

/// Stored RFC 3339 timestamp shown in local time; unparseable input is shown as-is
pub(super) fn format_timestamp(ts: &str) -> String {
    match ts.parse::<DateTime<Utc>>() {
        Ok(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        Err(_) => ts.to_string(),
    }
}

pub(super) fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub(super) fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::InProgress => Color::Yellow,
        SessionStatus::Completed => Color::Green,
        SessionStatus::Failed => Color::Red,
    }
}

pub(super) fn styled_cell(text: &str, color: Option<Color>, bold: bool) -> Cell {
    let mut cell = Cell::new(text);
    if let Some(c) = color {
        cell = cell.fg(c);
    }
    if bold {
        cell = cell.add_attribute(Attribute::Bold);
    }
    cell
}

pub(super) fn header_cell(text: &str, use_color: bool) -> Cell {
    let mut cell = Cell::new(text).add_attribute(Attribute::Bold);
    if use_color {
        cell = cell.fg(Color::Cyan);
    }
    cell
}

/// Replace the double-line header separator (╞═╪═╡) with single-line (├─┼─┤)
fn normalize_header_separator(table: &mut Table) {
    table.set_style(TableComponent::HeaderLines, '─');
    table.set_style(TableComponent::LeftHeaderIntersection, '├');
    table.set_style(TableComponent::MiddleHeaderIntersections, '┼');
    table.set_style(TableComponent::RightHeaderIntersection, '┤');
}

/// Create a table with the standard preset, inner borders, and normalized header separator.
pub(super) fn create_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    normalize_header_separator(&mut table);
    table
}

pub(super) fn right_cell(text: &str, color: Option<Color>, bold: bool) -> Cell {
    styled_cell(text, color, bold).set_alignment(CellAlignment::Right)
}

/// Two-column key/value table used for single-record views
pub(super) fn detail_table(rows: Vec<(&str, String)>, use_color: bool) -> Table {
    let mut table = create_styled_table();
    for (key, value) in rows {
        table.add_row(vec![header_cell(key, use_color), Cell::new(value)]);
    }
    table
}
