use crate::grid::TimeGrid;
use serde::{Deserialize, Serialize};

/// Exponential growth P(t) = P0 * e^(r t).
///
/// Defaults are the course page's values: P0 = 100, r = 0.03.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialParams {
    /// Initial population P(0).
    pub p0: f64,
    /// Growth rate; may be zero or negative (decline / equilibrium).
    pub r: f64,
}

impl Default for ExponentialParams {
    fn default() -> Self {
        Self { p0: 100.0, r: 0.03 }
    }
}

/// Logistic (Verhulst) growth P(t) = K / (1 + ((K - P0)/P0) e^(-r t)).
///
/// Defaults match the interactive page: P0 = 100, r = 0.03, K = 1000.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Initial population P(0).
    pub p0: f64,
    /// Intrinsic growth rate.
    pub r: f64,
    /// Carrying capacity.
    pub k: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            p0: 100.0,
            r: 0.03,
            k: 1000.0,
        }
    }
}

/// Evaluates the exponential model over a grid.
///
/// P0 <= 0 (or non-finite input) yields an all-zero series of grid length
/// rather than an error: the page always draws a curve.
pub fn exponential(params: &ExponentialParams, grid: &TimeGrid) -> Vec<f64> {
    let t = grid.sample();
    if !(params.p0 > 0.0) || !params.r.is_finite() {
        return vec![0.0; t.len()];
    }
    t.iter().map(|&t| params.p0 * (params.r * t).exp()).collect()
}

/// Evaluates the logistic model over a grid.
///
/// P0 <= 0 or K <= 0 (or non-finite input) yields an all-zero series; the
/// division is otherwise well-posed for every real r.
pub fn logistic(params: &LogisticParams, grid: &TimeGrid) -> Vec<f64> {
    let t = grid.sample();
    if !(params.p0 > 0.0) || !(params.k > 0.0) || !params.r.is_finite() {
        return vec![0.0; t.len()];
    }
    let ratio = (params.k - params.p0) / params.p0;
    t.iter()
        .map(|&t| params.k / (1.0 + ratio * (-params.r * t).exp()))
        .collect()
}
