use std::fmt::Write;

use serde_json::{json, Map, Value};

use crate::chart::{self, escape};
use crate::error::DashboardError;
use crate::models::{
    Classification, Forecast, MetricsRow, MetricsSummary, MetricsTable, DERIVED_COLUMNS,
    REQUIRED_COLUMNS,
};

const PAGE_TITLE: &str = "AI-Driven RCA Predictive Analysis";

fn header_row(table: &MetricsTable) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(table.extra_columns.iter().cloned())
        .chain(DERIVED_COLUMNS.iter().map(|c| c.to_string()))
        .collect()
}

fn cells(row: &MetricsRow) -> Vec<String> {
    let record = &row.record;
    let mut out = vec![record.date.to_string()];
    out.extend(record.numbers().iter().map(|value| format_number(*value)));
    out.push(record.severity.clone());
    out.extend(record.extra.iter().cloned());
    out.extend(row.metrics.values().iter().map(|value| format_metric(*value)));
    out
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format_metric(value)
    }
}

fn format_metric(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.2}")
    } else {
        value.to_string()
    }
}

/// Plain-text table of the first `limit` rows, columns padded to width.
pub fn render_table(table: &MetricsTable, limit: usize) -> String {
    let headers = header_row(table);
    let rows: Vec<Vec<String>> = table.rows.iter().take(limit).map(cells).collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows.iter() {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.len());
        }
    }

    let mut output = String::new();
    let line = |cols: &[String]| {
        cols.iter()
            .zip(widths.iter())
            .map(|(cell, &width)| format!("{cell:>width$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };
    let _ = writeln!(output, "{}", line(headers.as_slice()));
    for row in rows.iter() {
        let _ = writeln!(output, "{}", line(row.as_slice()));
    }
    if table.rows.len() > limit {
        let _ = writeln!(output, "... {} more rows", table.rows.len() - limit);
    }
    output
}

/// Every row as a JSON object keyed in table column order; undefined metrics become `null`.
pub fn render_json(table: &MetricsTable) -> serde_json::Result<String> {
    let rows: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let record = &row.record;
            let mut object = Map::new();
            object.insert(REQUIRED_COLUMNS[0].to_string(), json!(record.date.to_string()));
            for (name, value) in REQUIRED_COLUMNS[1..10].iter().zip(record.numbers()) {
                object.insert(name.to_string(), json!(value));
            }
            object.insert(REQUIRED_COLUMNS[10].to_string(), json!(record.severity));
            for (name, value) in table.extra_columns.iter().zip(record.extra.iter()) {
                object.insert(name.clone(), json!(value));
            }
            for (name, value) in DERIVED_COLUMNS.iter().zip(row.metrics.values()) {
                object.insert(name.to_string(), json!(value));
            }
            Value::Object(object)
        })
        .collect();
    serde_json::to_string_pretty(&rows)
}

pub fn render_summary(summary: &MetricsSummary) -> String {
    let mut output = String::new();
    let span = match (summary.first_date, summary.last_date) {
        (Some(first), Some(last)) => format!("{first} to {last}"),
        _ => "no dates".to_string(),
    };
    let _ = writeln!(output, "{} rows covering {}", summary.row_count, span);

    for (name, mean) in DERIVED_COLUMNS.iter().zip(summary.means.iter()) {
        match mean {
            Some(value) => {
                let _ = writeln!(output, "- mean {name}: {value:.2}");
            }
            None => {
                let _ = writeln!(output, "- mean {name}: undefined");
            }
        }
    }

    if summary.undefined_rows > 0 {
        let _ = writeln!(
            output,
            "{} rows have undefined metrics (zero or missing denominators)",
            summary.undefined_rows
        );
    }
    output
}

pub fn render_classification(classification: &Classification) -> String {
    let mut output = String::new();
    match classification.top() {
        Some(top) => {
            let _ = writeln!(
                output,
                "Predicted Category: {} (score {:.3})",
                top.label, top.score
            );
        }
        None => {
            let _ = writeln!(output, "Predicted Category: none");
        }
    }
    for entry in classification.labels.iter().skip(1) {
        let _ = writeln!(output, "- {}: {:.3}", entry.label, entry.score);
    }
    output
}

/// Single-page HTML dashboard with the processed table and charts inlined.
pub fn build_dashboard(
    table: &MetricsTable,
    forecast: &Forecast,
    periods: usize,
    incident: Option<&Result<Classification, DashboardError>>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "<!DOCTYPE html>");
    let _ = writeln!(output, "<html lang=\"en\"><head><meta charset=\"utf-8\">");
    let _ = writeln!(output, "<title>{PAGE_TITLE}</title>");
    let _ = writeln!(
        output,
        "<style>body{{font-family:sans-serif;margin:2rem;}}table{{border-collapse:collapse;font-size:12px;}}\
         th,td{{border:1px solid #ddd;padding:4px 6px;text-align:right;}}th{{background:#f3f3f3;}}\
         .scroll{{overflow-x:auto;max-height:420px;}}.error{{color:#b00020;}}</style>"
    );
    let _ = writeln!(output, "</head><body>");
    let _ = writeln!(output, "<h1>{PAGE_TITLE}</h1>");

    let _ = writeln!(output, "<h2>Processed RCA Metrics</h2>");
    let _ = writeln!(output, "<div class=\"scroll\"><table>");
    let _ = write!(output, "<tr>");
    for header in header_row(table) {
        let _ = write!(output, "<th>{}</th>", escape(&header));
    }
    let _ = writeln!(output, "</tr>");
    for row in table.rows.iter() {
        let _ = write!(output, "<tr>");
        for cell in cells(row) {
            let _ = write!(output, "<td>{}</td>", escape(&cell));
        }
        let _ = writeln!(output, "</tr>");
    }
    let _ = writeln!(output, "</table></div>");

    let _ = writeln!(output, "{}", chart::resolution_trend(table));
    let _ = writeln!(output, "{}", chart::severity_scatter(table));

    let _ = writeln!(output, "<h2>Predicting Future Ticket Resolution Rate</h2>");
    let _ = writeln!(output, "{}", chart::forecast_trend(forecast, periods));
    let _ = writeln!(
        output,
        "<p>{} (MAE {:.2} over {} observations)</p>",
        escape(&forecast.model_info),
        forecast.mae,
        forecast.history_length
    );

    let _ = writeln!(output, "<h2>Incident Severity Prediction</h2>");
    match incident {
        Some(Ok(classification)) => {
            let _ = writeln!(
                output,
                "<blockquote>{}</blockquote>",
                escape(&classification.sequence)
            );
            let _ = writeln!(output, "<ul>");
            for entry in classification.labels.iter() {
                let _ = writeln!(
                    output,
                    "<li>{}: {:.3}</li>",
                    escape(&entry.label),
                    entry.score
                );
            }
            let _ = writeln!(output, "</ul>");
        }
        Some(Err(err)) => {
            let _ = writeln!(output, "<p class=\"error\">{}</p>", escape(&err.to_string()));
        }
        None => {
            let _ = writeln!(
                output,
                "<p>Run with <code>--incident</code> to classify an incident description.</p>"
            );
        }
    }

    let _ = writeln!(output, "</body></html>");
    output
}
