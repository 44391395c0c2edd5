//! ATR-scaled dynamic stop loss.
//!
//! stop = max(-(multiplier * ATR / current_rate), floor), where `floor` is the
//! static stop loss. ATR is read from the latest fully closed candle only.

use serde::{Deserialize, Serialize};

use crate::components::frame::CandleFrame;
use crate::domain::CallbackContext;

/// Dynamic stop-loss override driven by an ATR column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrStoploss {
    pub atr_column: String,
    pub multiplier: f64,
    /// Static stop loss; the dynamic stop never goes below it.
    pub floor: f64,
}

impl AtrStoploss {
    pub fn new(atr_column: impl Into<String>, multiplier: f64, floor: f64) -> Self {
        assert!(multiplier > 0.0, "multiplier must be positive");
        assert!(floor < 0.0, "stop-loss floor must be negative");
        Self {
            atr_column: atr_column.into(),
            multiplier,
            floor,
        }
    }

    /// Stop fraction for a given ATR and rate; `None` if either is unusable.
    pub fn stop_fraction(&self, atr: f64, rate: f64) -> Option<f64> {
        if !atr.is_finite() || atr < 0.0 || !rate.is_finite() || rate <= 0.0 {
            return None;
        }
        Some((-(self.multiplier * atr / rate)).max(self.floor))
    }

    /// Evaluate against the frame at the callback's current time.
    pub fn evaluate(&self, frame: &CandleFrame, ctx: &CallbackContext) -> Option<f64> {
        let index = frame.latest_closed_index(ctx.current_time)?;
        let atr = frame.row(index)?.value(&self.atr_column)?;
        self.stop_fraction(atr, ctx.current_rate)
    }
}
