//! Ordinary least squares trend over the revenue series.

use analysis_core::{ForecastResult, Metric, MetricSeries, Projection};

pub const DEFAULT_HORIZON: usize = 1;

/// Fit `revenue = slope * i + intercept` where `i` is the index of the year
/// in the window (oldest = 0), then extrapolate `horizon` years past the
/// newest window year.
///
/// Returns None with fewer than two non-null revenue points.
pub fn project_revenue(metrics: &MetricSeries, horizon: usize) -> Option<ForecastResult> {
    let points: Vec<(f64, f64)> = metrics
        .get(Metric::Revenue)?
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.value.map(|v| (i as f64, v)))
        .collect();

    if points.len() < 2 || horizon == 0 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let base_year = *metrics.years.first()?;
    let last_index = metrics.years.len() as f64 - 1.0;
    let last_year = *metrics.years.last()?;

    let projections = (1..=horizon)
        .map(|step| Projection {
            fiscal_year: last_year + step as i32,
            value: slope * (last_index + step as f64) + intercept,
        })
        .collect();

    Some(ForecastResult {
        method: "linear".to_string(),
        base_year,
        slope,
        intercept,
        points_used: points.len(),
        projections,
    })
}
