//! ==============================================================================
//! dashboard.rs - html rendering of the display state
//! ==============================================================================
//!
//! one page, one table. rows are rendered in DisplayState order; nothing
//! here sorts. the timestamp cell shows the text as stored.
//!
//! ==============================================================================

use crate::domain::{DisplayState, SensorRecord};

use std::fmt::Write;

pub const TITLE: &str = "Prawn Farm Water Quality Logs";

/// column headers, in display order
pub const COLUMNS: [&str; 5] = ["Timestamp", "Temp (°C)", "TDS (ppm)", "pH", "ORP (mV)"];

/// render the full dashboard page.
/// `refresh_seconds` of 0 leaves out the meta refresh.
pub fn render_page(state: &DisplayState, refresh_seconds: u64) -> String {
    let refresh = if refresh_seconds > 0 {
        format!(r#"<meta http-equiv="refresh" content="{refresh_seconds}">"#)
    } else {
        String::new()
    };

    format!(
        r#"<!doctype html>
<html>
<head>
    <meta charset="utf-8">
    {refresh}
    <title>{TITLE}</title>
    <style>
        body {{ font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee; }}
        .table-container {{ max-width: 960px; margin: 0 auto; }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 0.5rem 0.75rem; border-bottom: 1px solid #2c2c4a; text-align: left; }}
        th {{ background: #16213e; }}
    </style>
</head>
<body>
    <div class="table-container">
        <h2>{TITLE}</h2>
        {table}
    </div>
</body>
</html>"#,
        table = render_table(&state.records),
    )
}

/// render the table element alone
pub fn render_table(records: &[SensorRecord]) -> String {
    let mut html = String::from("<table>\n<thead>\n<tr>");
    for column in COLUMNS {
        let _ = write!(html, "<th>{}</th>", html_escape(column));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for r in records {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            html_escape(r.timestamp.raw()),
            cell(r.temperature),
            cell(r.tds),
            cell(r.ph),
            cell(r.orp),
        );
    }

    html.push_str("</tbody>\n</table>");
    html
}

/// a missing measurement is an empty cell
fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
