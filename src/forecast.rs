//! Forecast input preparation and trend forecasting.
//!
//! The resolution-rate history is reshaped to the `(ds, y)` schema and fed to a
//! [`Forecaster`]. The shipped [`HoltForecaster`] fits a double exponential
//! smoothing model (level + trend) and returns in-sample fitted values followed
//! by daily future points with an 80% interval.

use chrono::Duration;
use tracing::{debug, warn};

use crate::error::{DashboardError, Result};
use crate::models::{Forecast, ForecastInput, ForecastPoint, MetricsTable};

pub const DEFAULT_PERIODS: usize = 30;
/// Ten years of daily steps.
pub const MAX_PERIODS: usize = 3650;

/// z-score for a two-sided 80% interval.
const Z80: f64 = 1.28;
const GRID: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Projects the table to `(Date, Ticket_Resolution_Rate)` renamed to `(ds, y)`.
pub fn to_forecast_input(table: &MetricsTable) -> Vec<ForecastInput> {
    table
        .rows
        .iter()
        .map(|row| ForecastInput {
            ds: row.record.date,
            y: row.metrics.ticket_resolution_rate,
        })
        .collect()
}

pub trait Forecaster {
    /// Fits `history` and predicts `periods` daily steps past its last date.
    fn forecast(&self, history: &[ForecastInput], periods: usize) -> Result<Forecast>;
}

#[derive(Debug, Clone, Copy)]
pub struct HoltForecaster;

impl Forecaster for HoltForecaster {
    fn forecast(&self, history: &[ForecastInput], periods: usize) -> Result<Forecast> {
        if periods > MAX_PERIODS {
            return Err(DashboardError::ForecastHorizon { periods });
        }
        let mut usable: Vec<ForecastInput> =
            history.iter().copied().filter(|obs| obs.y.is_finite()).collect();
        let dropped = history.len() - usable.len();
        if dropped > 0 {
            warn!(dropped, "dropping non-finite observations before fitting");
        }
        if usable.len() < 2 {
            return Err(DashboardError::InsufficientHistory { rows: usable.len() });
        }
        usable.sort_by_key(|obs| obs.ds);

        let y: Vec<f64> = usable.iter().map(|obs| obs.y).collect();
        let (alpha, beta) = optimize(&y);
        let fit = holt_fit(&y, alpha, beta);
        let mae = mean_absolute_error(&y[1..], &fit.fitted[1..]);

        let residuals: Vec<f64> = y[1..]
            .iter()
            .zip(fit.fitted[1..].iter())
            .map(|(actual, fitted)| actual - fitted)
            .collect();
        let sigma = std_dev(&residuals);

        debug!(alpha, beta, mae, sigma, history = y.len(), "fitted Holt model");

        let mut points = Vec::with_capacity(usable.len() + periods);
        for (obs, fitted) in usable.iter().zip(fit.fitted.iter()) {
            let margin = Z80 * sigma;
            points.push(ForecastPoint {
                ds: obs.ds,
                yhat: *fitted,
                yhat_lower: fitted - margin,
                yhat_upper: fitted + margin,
                is_future: false,
            });
        }

        let last_date = usable[usable.len() - 1].ds;
        for h in 1..=periods {
            let ds = last_date
                .checked_add_signed(Duration::days(h as i64))
                .ok_or(DashboardError::ForecastHorizon { periods })?;
            let yhat = fit.level + h as f64 * fit.trend;
            let margin = Z80 * sigma * (h as f64).sqrt();
            points.push(ForecastPoint {
                ds,
                yhat,
                yhat_lower: yhat - margin,
                yhat_upper: yhat + margin,
                is_future: true,
            });
        }

        Ok(Forecast {
            points,
            model_info: format!("Holt linear trend (alpha={alpha:.1}, beta={beta:.1})"),
            mae,
            history_length: usable.len(),
        })
    }
}

struct HoltFit {
    fitted: Vec<f64>,
    level: f64,
    trend: f64,
}

/// `fitted[t]` is the one-step-ahead prediction made at `t - 1`.
fn holt_fit(y: &[f64], alpha: f64, beta: f64) -> HoltFit {
    let mut level = y[0];
    let mut trend = if y.len() > 1 { y[1] - y[0] } else { 0.0 };
    let mut fitted = Vec::with_capacity(y.len());
    fitted.push(level);

    for value in y.iter().skip(1) {
        let prev_level = level;
        fitted.push(prev_level + trend);
        level = alpha * value + (1.0 - alpha) * (prev_level + trend);
        trend = beta * (level - prev_level) + (1.0 - beta) * trend;
    }

    HoltFit {
        fitted,
        level,
        trend,
    }
}

fn optimize(y: &[f64]) -> (f64, f64) {
    let mut best = (0.3, 0.1);
    let mut best_mae = f64::MAX;

    for &alpha in GRID.iter() {
        for &beta in GRID.iter() {
            let fit = holt_fit(y, alpha, beta);
            let mae = mean_absolute_error(&y[1..], &fit.fitted[1..]);
            if mae < best_mae {
                best_mae = mae;
                best = (alpha, beta);
            }
        }
    }

    best
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n as f64
}

fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}
