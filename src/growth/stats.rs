//! Statistics at a Cutoff
//!
//! Absolute level (mean) and trend (least-squares slope) of a series
//! truncated to episodes `<= cutoff`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::series::TimeSeries;
use crate::error::{GradingError, Result};

/// Highest episode number included in a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Cutoff(u32);

impl Cutoff {
    pub fn new(value: i64) -> Result<Self> {
        u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .map(Cutoff)
            .ok_or(GradingError::InvalidCutoff(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Cutoff {
    type Error = GradingError;

    fn try_from(value: i64) -> Result<Self> {
        Cutoff::new(value)
    }
}

impl From<Cutoff> for u32 {
    fn from(cutoff: Cutoff) -> Self {
        cutoff.0
    }
}

impl fmt::Display for Cutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Statistics for one (entity, metric, cutoff).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatResult {
    pub absolute: Option<f64>,
    pub slope: Option<f64>,
}

impl StatResult {
    pub const EMPTY: StatResult = StatResult { absolute: None, slope: None };
}

pub struct StatisticsComputer;

impl StatisticsComputer {
    /// `with_trend = false` never produces a slope.
    pub fn compute(series: Option<&TimeSeries>, cutoff: Cutoff, with_trend: bool) -> StatResult {
        let Some(series) = series else {
            return StatResult::EMPTY;
        };
        let n = series.count_through(cutoff.get());
        if n == 0 {
            return StatResult::EMPTY;
        }

        let xs = &series.time_steps()[..n];
        let ys = &series.values()[..n];

        StatResult {
            absolute: Some(mean(ys)),
            slope: if with_trend { ols_slope(xs, ys) } else { None },
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Slope of `y` regressed on `x`; `None` below two points or when all `x`
/// coincide.
pub fn ols_slope(xs: &[u32], ys: &[f64]) -> Option<f64> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let x_mean = xs.iter().map(|x| *x as f64).sum::<f64>() / xs.len() as f64;
    let y_mean = mean(ys);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = *x as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }

    if sxx == 0.0 {
        return None;
    }
    Some(sxy / sxx)
}
