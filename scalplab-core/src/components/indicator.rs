//! Indicator trait and candle field selection.
//!
//! Indicators are pure functions: candle history in, numeric series out.
//! They are computed once per analysis pass and stored as frame columns.

use crate::domain::Candle;
use serde::{Deserialize, Serialize};

/// Trait for indicators.
///
/// Indicators take a full candle series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warmup).
///
/// # Look-ahead contamination guard
/// No indicator value at candle t may depend on data from candle t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire candle series.
    ///
    /// Returns a `Vec<f64>` of the same length as `candles`.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Which candle field a single-input indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
}

impl Source {
    pub fn prefix(&self) -> &'static str {
        match self {
            Source::Open => "open",
            Source::High => "high",
            Source::Low => "low",
            Source::Close => "close",
            Source::Volume => "volume",
        }
    }

    pub fn read(&self, candle: &Candle) -> f64 {
        match self {
            Source::Open => candle.open,
            Source::High => candle.high,
            Source::Low => candle.low,
            Source::Close => candle.close,
            Source::Volume => candle.volume,
        }
    }

    /// Extract this field from every candle.
    pub fn extract(&self, candles: &[Candle]) -> Vec<f64> {
        candles.iter().map(|c| self.read(c)).collect()
    }
}
