use comfy_table::Color;

use crate::store::{AnalysisSession, SessionCounts};

use super::format::{
    create_styled_table, detail_table, format_bytes, format_percent, format_timestamp,
    header_cell, optional, right_cell, status_color, styled_cell,
};

/// Truncate session ID for display
fn truncate_session_id(id: &str, max_len: usize) -> String {
    if id.len() <= max_len {
        id.to_string()
    } else {
        format!("{}...", &id[..max_len - 3])
    }
}

pub(crate) fn print_session_table(sessions: &[AnalysisSession], use_color: bool) {
    if sessions.is_empty() {
        println!("No sessions found.");
        return;
    }

    let mut table = create_styled_table();
    table.set_header(vec![
        header_cell("Session", use_color),
        header_cell("Created", use_color),
        header_cell("Type", use_color),
        header_cell("Status", use_color),
        header_cell("Result", use_color),
        header_cell("Confidence", use_color),
    ]);

    for session in sessions {
        let color = use_color.then(|| status_color(session.status));
        let (result, confidence) = match &session.results {
            Some(r) => (r.deficiency.clone(), format_percent(r.confidence)),
            None => ("-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            styled_cell(&truncate_session_id(&session.id, 24), None, false),
            styled_cell(&format_timestamp(&session.created_at), None, false),
            styled_cell(session.analysis_type.as_str(), None, false),
            styled_cell(session.status.as_str(), color, false),
            styled_cell(&result, None, false),
            right_cell(&confidence, None, false),
        ]);
    }

    println!("{table}");
    println!("{} session(s)", sessions.len());
}

pub(crate) fn print_session_detail(session: &AnalysisSession, use_color: bool) {
    let mut rows = vec![
        ("Session", session.id.clone()),
        ("Created", format_timestamp(&session.created_at)),
        ("Updated", format_timestamp(&session.updated_at)),
        ("Type", session.analysis_type.as_str().to_string()),
        ("Status", session.status.as_str().to_string()),
    ];

    if let Some(leaf) = &session.leaf_metadata {
        let dimensions = match (leaf.width, leaf.height) {
            (Some(w), Some(h)) => format!("{w}x{h}"),
            _ => "-".to_string(),
        };
        rows.push(("Image", format!("{} ({}, {})", leaf.file_name, leaf.format, format_bytes(leaf.file_size))));
        rows.push(("Dimensions", dimensions));
        rows.push(("Plant age (days)", optional(leaf.plant_age_days)));
        rows.push(("Sample type", optional(leaf.sample_type.as_deref())));
    }

    if let Some(soil) = &session.soil_metadata {
        rows.push(("Soil type", optional(soil.soil_type.as_deref())));
        rows.push(("pH", optional(soil.ph)));
        rows.push((
            "N / P / K (kg/ha)",
            format!(
                "{} / {} / {}",
                optional(soil.nitrogen),
                optional(soil.phosphorus),
                optional(soil.potassium)
            ),
        ));
        rows.push(("Organic matter (%)", optional(soil.organic_matter)));
        rows.push(("Moisture (%)", optional(soil.moisture)));
    }

    if let Some(results) = &session.results {
        rows.push(("Deficiency", results.deficiency.clone()));
        rows.push(("Confidence", format_percent(results.confidence)));
        if !results.recommendations.is_empty() {
            rows.push(("Recommendations", results.recommendations.join("\n")));
        }
    }

    if let Some(reason) = &session.failure_reason {
        rows.push(("Failure", reason.clone()));
    }

    println!("{}", detail_table(rows, use_color));
}

pub(crate) fn print_session_counts(counts: &SessionCounts, max_sessions: usize, use_color: bool) {
    let mut table = create_styled_table();
    table.set_header(vec![
        header_cell("Status", use_color),
        header_cell("Sessions", use_color),
    ]);
    let color = |c: Color| use_color.then_some(c);
    for (label, count, c) in [
        ("in_progress", counts.in_progress, color(Color::Yellow)),
        ("completed", counts.completed, color(Color::Green)),
        ("failed", counts.failed, color(Color::Red)),
    ] {
        table.add_row(vec![
            styled_cell(label, c, false),
            right_cell(&count.to_string(), None, false),
        ]);
    }
    table.add_row(vec![
        styled_cell("total", None, true),
        right_cell(&format!("{} / {}", counts.total, max_sessions), None, true),
    ]);
    println!("{table}");
    println!("{} comprehensive (leaf + soil)", counts.comprehensive);
}
