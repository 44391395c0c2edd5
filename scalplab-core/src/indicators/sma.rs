//! Simple Moving Average (SMA).
//!
//! Rolling mean of a candle field over a lookback window.
//! Lookback: period - 1 (first valid value at index period-1).
//! Any NaN inside the window makes that output NaN.

use crate::components::indicator::{Indicator, Source};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: Source,
    name: String,
}

impl Sma {
    /// SMA of close prices.
    pub fn new(period: usize) -> Self {
        Self::of(period, Source::Close)
    }

    /// SMA of an arbitrary candle field (e.g. volume).
    pub fn of(period: usize, source: Source) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        let name = match source {
            Source::Close => format!("sma_{period}"),
            other => format!("{}_sma_{period}", other.prefix()),
        };
        Self {
            period,
            source,
            name,
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        sma_of_series(&self.source.extract(candles), self.period)
    }
}

/// Rolling mean of a raw series.
///
/// Tracks the NaN count inside the window so a NaN only poisons the outputs
/// whose window contains it.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;

    for i in 0..n {
        let entering = values[i];
        if entering.is_nan() {
            nan_count += 1;
        } else {
            sum += entering;
        }

        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }

        if i + 1 >= period && nan_count == 0 {
            result[i] = sum / period as f64;
        }
    }

    result
}
