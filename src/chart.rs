//! Standalone SVG charts for the dashboard.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{Forecast, MetricsTable};

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 360.0;
const PAD_LEFT: f64 = 60.0;
const PAD_RIGHT: f64 = 140.0;
const PAD_TOP: f64 = 40.0;
const PAD_BOTTOM: f64 = 48.0;
const PALETTE: &[&str] = &[
    "#636efa", "#ef553b", "#00cc96", "#ab63fa", "#ffa15a", "#19d3f3", "#ff6692", "#b6e880",
];

#[derive(Debug, Clone)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub group: String,
}

/// Linear mapping from a data range onto a pixel range.
#[derive(Debug, Clone, Copy)]
struct Scale {
    min: f64,
    max: f64,
    from: f64,
    to: f64,
}

impl Scale {
    fn new(values: impl Iterator<Item = f64>, from: f64, to: f64) -> Self {
        let (mut min, mut max) = (f64::MAX, f64::MIN);
        for value in values {
            min = min.min(value);
            max = max.max(value);
        }
        if min > max {
            (min, max) = (0.0, 1.0);
        }
        if (max - min).abs() < f64::EPSILON {
            min -= 1.0;
            max += 1.0;
        }
        Self { min, max, from, to }
    }

    fn map(&self, value: f64) -> f64 {
        self.from + (value - self.min) / (self.max - self.min) * (self.to - self.from)
    }
}

pub fn resolution_trend(table: &MetricsTable) -> String {
    let points: Vec<(NaiveDate, f64)> = table
        .rows
        .iter()
        .map(|row| (row.record.date, row.metrics.ticket_resolution_rate))
        .collect();
    line_chart(
        "Ticket Resolution Rate Over Time",
        "Date",
        "Ticket_Resolution_Rate",
        &points,
    )
}

pub fn severity_scatter(table: &MetricsTable) -> String {
    let points: Vec<ScatterPoint> = table
        .rows
        .iter()
        .map(|row| ScatterPoint {
            x: row.metrics.average_resolution_time,
            y: row.metrics.pending_ticket_impact,
            size: row.metrics.backlog_rate,
            group: row.record.severity.clone(),
        })
        .collect();
    scatter_chart(
        "Incident Severity vs. Pending Ticket Impact",
        "Average_Resolution_Time",
        "Pending_Ticket_Impact",
        &points,
    )
}

pub fn forecast_trend(forecast: &Forecast, periods: usize) -> String {
    let title = format!("Predicted Ticket Resolution Rate for Next {periods} Days");
    forecast_chart(&title, forecast)
}

/// Line chart over dates. Non-finite values are skipped.
pub fn line_chart(title: &str, x_label: &str, y_label: &str, points: &[(NaiveDate, f64)]) -> String {
    let mut points: Vec<(NaiveDate, f64)> = points
        .iter()
        .copied()
        .filter(|(_, y)| y.is_finite())
        .collect();
    points.sort_by_key(|(date, _)| *date);

    let origin = points.first().map(|(date, _)| *date);
    let day = |date: NaiveDate| origin.map_or(0.0, |o| (date - o).num_days() as f64);

    let x = Scale::new(points.iter().map(|(d, _)| day(*d)), PAD_LEFT, WIDTH - PAD_RIGHT);
    let y = Scale::new(points.iter().map(|(_, v)| *v), HEIGHT - PAD_BOTTOM, PAD_TOP);

    let mut svg = open_svg(title);
    draw_axes(&mut svg, x_label, y_label, &y);
    draw_date_ticks(&mut svg, &points.iter().map(|(d, _)| *d).collect::<Vec<_>>(), &x, day);

    let path = polyline(points.iter().map(|(d, v)| (x.map(day(*d)), y.map(*v))));
    let _ = writeln!(
        svg,
        r##"<polyline points="{path}" fill="none" stroke="{}" stroke-width="2"/>"##,
        PALETTE[0]
    );
    close_svg(svg)
}

/// Scatter chart coloured by group, marker radius scaled by `size`.
pub fn scatter_chart(title: &str, x_label: &str, y_label: &str, points: &[ScatterPoint]) -> String {
    let points: Vec<&ScatterPoint> = points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();

    let x = Scale::new(points.iter().map(|p| p.x), PAD_LEFT, WIDTH - PAD_RIGHT);
    let y = Scale::new(points.iter().map(|p| p.y), HEIGHT - PAD_BOTTOM, PAD_TOP);
    let radius = Scale::new(
        points.iter().map(|p| p.size).filter(|s| s.is_finite()),
        3.0,
        14.0,
    );

    let mut groups: Vec<&str> = Vec::new();
    for point in points.iter() {
        if !groups.contains(&point.group.as_str()) {
            groups.push(point.group.as_str());
        }
    }

    let mut svg = open_svg(title);
    draw_axes(&mut svg, x_label, y_label, &y);
    draw_value_ticks(&mut svg, &x);

    for point in points.iter() {
        let color = group_color(&groups, &point.group);
        let r = if point.size.is_finite() {
            radius.map(point.size)
        } else {
            3.0
        };
        let _ = writeln!(
            svg,
            r##"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{color}" fill-opacity="0.7"><title>{}</title></circle>"##,
            x.map(point.x),
            y.map(point.y),
            r,
            escape(&point.group)
        );
    }

    for (idx, group) in groups.iter().enumerate() {
        let ly = PAD_TOP + 18.0 * idx as f64;
        let lx = WIDTH - PAD_RIGHT + 16.0;
        let _ = writeln!(
            svg,
            r##"<circle cx="{lx:.1}" cy="{ly:.1}" r="5" fill="{}"/><text x="{:.1}" y="{:.1}" font-size="11">{}</text>"##,
            PALETTE[idx % PALETTE.len()],
            lx + 10.0,
            ly + 4.0,
            escape(group)
        );
    }
    close_svg(svg)
}

/// `yhat` line with the interval band; future points use a dashed stroke.
pub fn forecast_chart(title: &str, forecast: &Forecast) -> String {
    let points: Vec<_> = forecast
        .points
        .iter()
        .filter(|p| p.yhat.is_finite())
        .collect();
    let origin = points.first().map(|p| p.ds);
    let day = |date: NaiveDate| origin.map_or(0.0, |o| (date - o).num_days() as f64);

    let x = Scale::new(points.iter().map(|p| day(p.ds)), PAD_LEFT, WIDTH - PAD_RIGHT);
    let y = Scale::new(
        points.iter().flat_map(|p| [p.yhat_lower, p.yhat_upper]),
        HEIGHT - PAD_BOTTOM,
        PAD_TOP,
    );

    let mut svg = open_svg(title);
    draw_axes(&mut svg, "ds", "yhat", &y);
    draw_date_ticks(&mut svg, &points.iter().map(|p| p.ds).collect::<Vec<_>>(), &x, day);

    if !points.is_empty() {
        let upper = points.iter().map(|p| (x.map(day(p.ds)), y.map(p.yhat_upper)));
        let lower = points
            .iter()
            .rev()
            .map(|p| (x.map(day(p.ds)), y.map(p.yhat_lower)));
        let band = polyline(upper.chain(lower));
        let _ = writeln!(
            svg,
            r##"<polygon points="{band}" fill="{}" fill-opacity="0.15" stroke="none"/>"##,
            PALETTE[0]
        );
    }

    let history = polyline(
        points
            .iter()
            .filter(|p| !p.is_future)
            .map(|p| (x.map(day(p.ds)), y.map(p.yhat))),
    );
    // Future segment starts at the last fitted point so the line is continuous.
    let split = points.iter().rposition(|p| !p.is_future).unwrap_or(0);
    let future = polyline(
        points
            .iter()
            .skip(split)
            .map(|p| (x.map(day(p.ds)), y.map(p.yhat))),
    );
    let _ = writeln!(
        svg,
        r##"<polyline points="{history}" fill="none" stroke="{}" stroke-width="2"/>"##,
        PALETTE[0]
    );
    let _ = writeln!(
        svg,
        r##"<polyline points="{future}" fill="none" stroke="{}" stroke-width="2" stroke-dasharray="6,4"/>"##,
        PALETTE[0]
    );
    close_svg(svg)
}

fn open_svg(title: &str) -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {HEIGHT}" width="{WIDTH}" height="{HEIGHT}" font-family="sans-serif">"#
    );
    let _ = writeln!(
        svg,
        r##"<rect width="100%" height="100%" fill="#ffffff"/><text x="{PAD_LEFT}" y="24" font-size="16" font-weight="bold">{}</text>"##,
        escape(title)
    );
    svg
}

fn close_svg(mut svg: String) -> String {
    svg.push_str("</svg>\n");
    svg
}

fn draw_axes(svg: &mut String, x_label: &str, y_label: &str, y: &Scale) {
    let bottom = HEIGHT - PAD_BOTTOM;
    let right = WIDTH - PAD_RIGHT;
    let _ = writeln!(
        svg,
        r##"<line x1="{PAD_LEFT}" y1="{bottom}" x2="{right}" y2="{bottom}" stroke="#444"/><line x1="{PAD_LEFT}" y1="{PAD_TOP}" x2="{PAD_LEFT}" y2="{bottom}" stroke="#444"/>"##
    );
    for step in 0..=4 {
        let value = y.min + (y.max - y.min) * step as f64 / 4.0;
        let py = y.map(value);
        let _ = writeln!(
            svg,
            r##"<line x1="{PAD_LEFT}" y1="{py:.1}" x2="{right}" y2="{py:.1}" stroke="#e5e5e5"/><text x="{:.1}" y="{:.1}" font-size="10" text-anchor="end">{}</text>"##,
            PAD_LEFT - 6.0,
            py + 3.0,
            format_tick(value)
        );
    }
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" font-size="12" text-anchor="middle">{}</text>"#,
        (PAD_LEFT + right) / 2.0,
        HEIGHT - 8.0,
        escape(x_label)
    );
    let _ = writeln!(
        svg,
        r#"<text x="14" y="{:.1}" font-size="12" text-anchor="middle" transform="rotate(-90 14 {:.1})">{}</text>"#,
        (PAD_TOP + bottom) / 2.0,
        (PAD_TOP + bottom) / 2.0,
        escape(y_label)
    );
}

fn draw_date_ticks(
    svg: &mut String,
    dates: &[NaiveDate],
    x: &Scale,
    day: impl Fn(NaiveDate) -> f64,
) {
    if dates.is_empty() {
        return;
    }
    let stride = (dates.len() / 5).max(1);
    for date in dates.iter().step_by(stride) {
        let px = x.map(day(*date));
        let _ = writeln!(
            svg,
            r#"<text x="{px:.1}" y="{:.1}" font-size="10" text-anchor="middle">{}</text>"#,
            HEIGHT - PAD_BOTTOM + 14.0,
            date.format("%Y-%m-%d")
        );
    }
}

fn draw_value_ticks(svg: &mut String, x: &Scale) {
    for step in 0..=4 {
        let value = x.min + (x.max - x.min) * step as f64 / 4.0;
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="10" text-anchor="middle">{}</text>"#,
            x.map(value),
            HEIGHT - PAD_BOTTOM + 14.0,
            format_tick(value)
        );
    }
}

fn polyline(points: impl Iterator<Item = (f64, f64)>) -> String {
    points
        .map(|(px, py)| format!("{px:.1},{py:.1}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn group_color(groups: &[&str], group: &str) -> &'static str {
    let idx = groups.iter().position(|g| *g == group).unwrap_or(0);
    PALETTE[idx % PALETTE.len()]
}

fn format_tick(value: f64) -> String {
    if value.abs() >= 100.0 || value.fract().abs() < 1e-9 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForecastPoint;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    #[test]
    fn line_chart_skips_non_finite_points() {
        let svg = line_chart(
            "Trend",
            "Date",
            "Rate",
            &[(date(1), 50.0), (date(2), f64::NAN), (date(3), 70.0)],
        );

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        let polyline = svg
            .lines()
            .find(|line| line.starts_with("<polyline"))
            .unwrap();
        let points = polyline.split('"').nth(1).unwrap();
        assert_eq!(points.split(' ').count(), 2);
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn scatter_chart_has_one_legend_entry_per_severity() {
        let points = vec![
            ScatterPoint { x: 1.0, y: 2.0, size: 10.0, group: "High".to_string() },
            ScatterPoint { x: 2.0, y: 3.0, size: 20.0, group: "Low".to_string() },
            ScatterPoint { x: 3.0, y: 1.0, size: 5.0, group: "High".to_string() },
            ScatterPoint { x: f64::INFINITY, y: 1.0, size: 5.0, group: "Medium".to_string() },
        ];
        let svg = scatter_chart("Scatter", "x", "y", &points);

        assert_eq!(svg.matches("<title>").count(), 3);
        assert_eq!(svg.matches(">High</text>").count(), 1);
        assert_eq!(svg.matches(">Low</text>").count(), 1);
        assert!(!svg.contains("Medium"));
    }

    #[test]
    fn forecast_chart_draws_band_and_dashed_future() {
        let points = (1..=4)
            .map(|day| ForecastPoint {
                ds: date(day),
                yhat: 60.0 + day as f64,
                yhat_lower: 58.0 + day as f64,
                yhat_upper: 62.0 + day as f64,
                is_future: day > 2,
            })
            .collect();
        let forecast = Forecast {
            points,
            model_info: "test".to_string(),
            mae: 0.0,
            history_length: 2,
        };
        let svg = forecast_trend(&forecast, 2);

        assert!(svg.contains("Predicted Ticket Resolution Rate for Next 2 Days"));
        assert!(svg.contains("<polygon"));
        assert!(svg.contains("stroke-dasharray"));
    }

    #[test]
    fn titles_are_escaped() {
        let svg = line_chart("A & B <test>", "x", "y", &[]);
        assert!(svg.contains("A &amp; B &lt;test&gt;"));
    }

    #[test]
    fn flat_series_does_not_divide_by_zero() {
        let svg = line_chart("Flat", "x", "y", &[(date(1), 5.0), (date(1), 5.0)]);
        assert!(!svg.contains("NaN"));
        assert!(!svg.contains("inf"));
    }
}
