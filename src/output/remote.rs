use crate::client::{DeficiencyPrediction, HistoryEntry, PestDetection, WeatherGuidance};

use super::format::{
    create_styled_table, detail_table, format_percent, header_cell, optional, right_cell,
    styled_cell,
};

pub(crate) fn print_prediction(session_id: &str, prediction: &DeficiencyPrediction, use_color: bool) {
    let mut rows = vec![
        ("Session", session_id.to_string()),
        ("Deficiency", prediction.deficiency.clone()),
        ("Confidence", format_percent(prediction.confidence)),
    ];
    if !prediction.recommendations.is_empty() {
        rows.push(("Recommendations", prediction.recommendations.join("\n")));
    }
    println!("{}", detail_table(rows, use_color));
}

pub(crate) fn print_pest(detection: &PestDetection, use_color: bool) {
    let rows = vec![
        ("Pest", detection.pest.clone()),
        ("Confidence", format_percent(detection.confidence)),
        ("Severity", optional(detection.severity.as_deref())),
        ("Treatment", optional(detection.treatment.as_deref())),
    ];
    println!("{}", detail_table(rows, use_color));
}

pub(crate) fn print_history(entries: &[HistoryEntry], use_color: bool) {
    if entries.is_empty() {
        println!("No fertilizer history recorded.");
        return;
    }
    let mut table = create_styled_table();
    table.set_header(vec![
        header_cell("ID", use_color),
        header_cell("Date", use_color),
        header_cell("Crop", use_color),
        header_cell("Fertilizer", use_color),
        header_cell("Qty (kg)", use_color),
        header_cell("Notes", use_color),
    ]);
    for entry in entries {
        table.add_row(vec![
            styled_cell(&optional(entry.id.as_deref()), None, false),
            styled_cell(&entry.applied_on, None, false),
            styled_cell(&entry.crop, None, false),
            styled_cell(&entry.fertilizer, None, false),
            right_cell(&optional(entry.quantity_kg), None, false),
            styled_cell(&optional(entry.notes.as_deref()), None, false),
        ]);
    }
    println!("{table}");
}

pub(crate) fn print_weather(guidance: &WeatherGuidance, use_color: bool) {
    let mut rows = vec![
        ("Location", guidance.location.clone()),
        ("Temperature (°C)", optional(guidance.temperature_c)),
        ("Humidity (%)", optional(guidance.humidity)),
        ("Rainfall (mm)", optional(guidance.rainfall_mm)),
        ("Yield outlook", optional(guidance.yield_outlook.as_deref())),
    ];
    if !guidance.advice.is_empty() {
        rows.push(("Advice", guidance.advice.join("\n")));
    }
    println!("{}", detail_table(rows, use_color));
}
