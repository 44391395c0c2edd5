//! Slow stochastic oscillator.
//!
//! Fast %K = 100 * (close - lowest_low) / (highest_high - lowest_low) over `k` candles,
//! 0 when the range is empty. Slow %K = SMA(fast %K, slow_k); slow %D = SMA(slow %K, slow_d).
//!
//! Lookback: k + slow_k - 2 for %K, k + slow_k + slow_d - 3 for %D.

use crate::components::indicator::Indicator;
use crate::domain::Candle;
use crate::indicators::sma::sma_of_series;

/// Which stochastic output to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochasticLine {
    K,
    D,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    k: usize,
    slow_k: usize,
    slow_d: usize,
    line: StochasticLine,
    name: String,
}

impl Stochastic {
    pub fn new(k: usize, slow_k: usize, slow_d: usize, line: StochasticLine) -> Self {
        assert!(
            k >= 1 && slow_k >= 1 && slow_d >= 1,
            "Stochastic periods must be >= 1"
        );
        let label = match line {
            StochasticLine::K => "k",
            StochasticLine::D => "d",
        };
        Self {
            k,
            slow_k,
            slow_d,
            line,
            name: format!("stoch_{label}_{k}_{slow_k}_{slow_d}"),
        }
    }

    pub fn k(k: usize, slow_k: usize, slow_d: usize) -> Self {
        Self::new(k, slow_k, slow_d, StochasticLine::K)
    }

    pub fn d(k: usize, slow_k: usize, slow_d: usize) -> Self {
        Self::new(k, slow_k, slow_d, StochasticLine::D)
    }
}

/// Raw fast %K series.
pub fn fast_k(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &candles[i + 1 - period..=i];
        let mut highest = f64::NEG_INFINITY;
        let mut lowest = f64::INFINITY;
        let mut valid = true;
        for c in window {
            if c.high.is_nan() || c.low.is_nan() {
                valid = false;
                break;
            }
            highest = highest.max(c.high);
            lowest = lowest.min(c.low);
        }
        let close = candles[i].close;
        if !valid || close.is_nan() {
            continue;
        }

        let range = highest - lowest;
        result[i] = if range > 0.0 {
            100.0 * (close - lowest) / range
        } else {
            0.0
        };
    }

    result
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let k_lookback = self.k + self.slow_k - 2;
        match self.line {
            StochasticLine::K => k_lookback,
            StochasticLine::D => k_lookback + self.slow_d - 1,
        }
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let slow_k = sma_of_series(&fast_k(candles, self.k), self.slow_k);
        match self.line {
            StochasticLine::K => slow_k,
            StochasticLine::D => sma_of_series(&slow_k, self.slow_d),
        }
    }
}
