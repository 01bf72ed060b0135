//! Run metrics derived from an order-parameter time series.
//!
//! Pure functions over (time, r) sequences; nothing here mutates engine
//! state. Every check degrades gracefully on short or empty series instead
//! of erroring.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum series length for the convergence/oscillation checks.
const MIN_SERIES_LEN: usize = 100;

/// Relative band around the final value used by settling detection.
const SETTLING_BAND: f64 = 0.05;

/// Settling window cap (samples).
const SETTLING_WINDOW_MAX: usize = 50;

/// Std threshold on the trailing 20% for convergence.
const CONVERGENCE_STD: f64 = 0.05;

/// Local-extrema fraction over the trailing 50% above which the series
/// counts as oscillating.
const OSCILLATION_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    pub final_r: f64,
    pub mean_r: f64,
    pub std_r: f64,
    pub min_r: f64,
    pub max_r: f64,
    /// Earliest time after which r stays within 5% of the final value for a
    /// sustained window; `None` when the series never settles.
    pub settling_time: Option<f64>,
    pub converged: bool,
    pub oscillating: bool,
}

/// Summarize an order-parameter series. `times` and `order` are expected to
/// be the same length; extra entries on either side are ignored.
pub fn summarize(times: &[f64], order: &[f64]) -> RunSummary {
    let len = usize::min(times.len(), order.len());
    if len == 0 {
        return RunSummary::default();
    }
    let times = &times[..len];
    let order = &order[..len];

    let final_r = order[len - 1];
    let mean_r = order.iter().sum::<f64>() / len as f64;
    let std_r = population_std(order, mean_r);
    let min_r = order.iter().copied().fold(f64::INFINITY, f64::min);
    let max_r = order.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    RunSummary {
        final_r,
        mean_r,
        std_r,
        min_r,
        max_r,
        settling_time: settling_time(times, order, final_r),
        converged: converged(order),
        oscillating: oscillating(order),
    }
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Search starts at the first sample reaching 90% of the final value; from
/// there, the earliest index whose following `min(50, len/10)` samples all
/// sit inside the 5% band wins.
fn settling_time(times: &[f64], order: &[f64], final_r: f64) -> Option<f64> {
    let len = order.len();
    let window = usize::min(SETTLING_WINDOW_MAX, len / 10).max(1);
    let tol = SETTLING_BAND * final_r.abs();

    let start = order.iter().position(|&r| r >= 0.9 * final_r)?;
    for i in start..=len.saturating_sub(window) {
        if order[i..i + window]
            .iter()
            .all(|&r| (r - final_r).abs() <= tol)
        {
            return Some(times[i]);
        }
    }
    None
}

fn converged(order: &[f64]) -> bool {
    let len = order.len();
    if len < MIN_SERIES_LEN {
        return false;
    }
    let tail = &order[len - len / 5..];
    let mean = tail.iter().sum::<f64>() / tail.len() as f64;
    population_std(tail, mean) < CONVERGENCE_STD
}

/// Counts local extrema (sign changes of the first difference) over the
/// trailing half of the series.
fn oscillating(order: &[f64]) -> bool {
    let len = order.len();
    if len < MIN_SERIES_LEN {
        return false;
    }
    let tail = &order[len / 2..];
    if tail.len() < 3 {
        return false;
    }
    let mut extrema = 0usize;
    for i in 1..tail.len() - 1 {
        let d1 = tail[i] - tail[i - 1];
        let d2 = tail[i + 1] - tail[i];
        if d1 * d2 < 0.0 {
            extrema += 1;
        }
    }
    extrema as f64 / tail.len() as f64 > OSCILLATION_FRACTION
}
