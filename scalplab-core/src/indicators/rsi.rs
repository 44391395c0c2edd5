//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 → RSI = 0; both → 50.

use crate::components::indicator::{Indicator, Source};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let period = self.period;
        let mut out = vec![f64::NAN; candles.len()];
        if candles.len() <= period {
            return out;
        }

        // changes[i] is the move into candle i + 1
        let changes: Vec<f64> = Source::Close
            .extract(candles)
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect();
        let (seed, rest) = changes.split_at(period);
        let Some(mut avg) = WilderAverages::seed(seed) else {
            return out;
        };
        out[period] = avg.rsi();

        let alpha = 1.0 / period as f64;
        for (slot, &change) in out[period + 1..].iter_mut().zip(rest) {
            // A gap invalidates everything after it
            if change.is_nan() {
                break;
            }
            avg.update(change, alpha);
            *slot = avg.rsi();
        }
        out
    }
}

/// Running Wilder averages of up-moves and down-moves.
#[derive(Debug, Clone, Copy)]
struct WilderAverages {
    gain: f64,
    loss: f64,
}

impl WilderAverages {
    /// Simple means over the first window; `None` if it holds a NaN.
    fn seed(changes: &[f64]) -> Option<Self> {
        if changes.iter().any(|c| c.is_nan()) {
            return None;
        }
        let n = changes.len() as f64;
        Some(Self {
            gain: changes.iter().map(|c| c.max(0.0)).sum::<f64>() / n,
            loss: changes.iter().map(|c| (-c).max(0.0)).sum::<f64>() / n,
        })
    }

    fn update(&mut self, change: f64, alpha: f64) {
        self.gain = alpha * change.max(0.0) + (1.0 - alpha) * self.gain;
        self.loss = alpha * (-change).max(0.0) + (1.0 - alpha) * self.loss;
    }

    fn rsi(&self) -> f64 {
        match (self.gain == 0.0, self.loss == 0.0) {
            (true, true) => 50.0,
            (false, true) => 100.0,
            (true, false) => 0.0,
            (false, false) => 100.0 - 100.0 / (1.0 + self.gain / self.loss),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles};

    #[test]
    fn rsi_all_gains() {
        let candles = make_candles(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let result = Rsi::new(3).compute(&candles);
        assert_approx(result[3], 100.0, 1e-6);
        assert_approx(result[5], 100.0, 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let candles = make_candles(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        let result = Rsi::new(3).compute(&candles);
        assert_approx(result[3], 0.0, 1e-6);
    }

    #[test]
    fn rsi_flat_is_fifty() {
        let candles = make_candles(&[100.0; 6]);
        let result = Rsi::new(3).compute(&candles);
        assert_approx(result[4], 50.0, 1e-6);
    }

    #[test]
    fn rsi_mixed_seed_value() {
        // Changes over the seed window: +0.34, -0.25, -0.48
        // avg_gain = 0.34/3, avg_loss = 0.73/3 → RSI = 100 - 100/(1 + 0.34/0.73)
        let candles = make_candles(&[44.0, 44.34, 44.09, 43.61, 44.33]);
        let result = Rsi::new(3).compute(&candles);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!(result[2].is_nan());
        let expected = 100.0 - 100.0 / (1.0 + 0.34 / 0.73);
        assert_approx(result[3], expected, 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let candles = make_candles(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        let result = Rsi::new(3).compute(&candles);
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!(
                    (0.0..=100.0).contains(&v),
                    "RSI out of bounds at candle {i}: {v}"
                );
            }
        }
    }

    #[test]
    fn rsi_nan_in_seed_produces_all_nan() {
        let mut candles = make_candles(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        candles[2].close = f64::NAN;
        let result = Rsi::new(3).compute(&candles);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_smooths_after_seed() {
        // Seed over +1, -1 gives 50; the next +1 moves averages to 0.75 / 0.25
        let candles = make_candles(&[1.0, 2.0, 1.0, 2.0]);
        let result = Rsi::new(2).compute(&candles);
        assert_approx(result[2], 50.0, 1e-12);
        assert_approx(result[3], 75.0, 1e-12);
    }

    #[test]
    fn rsi_gap_after_seed_blanks_the_tail() {
        let mut candles = make_candles(&[100.0, 101.0, 100.5, 102.0, 103.0, 102.5, 104.0]);
        candles[5].close = f64::NAN;
        let result = Rsi::new(3).compute(&candles);
        assert!(!result[3].is_nan() && !result[4].is_nan());
        assert!(result[5..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_lookback() {
        assert_eq!(Rsi::new(14).lookback(), 14);
    }
}
