//! Keltner Channel: moving-average basis +/- ATR multiplier.
//!
//! Three bands (separate Indicator instances):
//! - Middle: EMA or SMA of close
//! - Upper: middle + mult * ATR(atr_period)
//! - Lower: middle - mult * ATR(atr_period)
//!
//! Lookback: max(basis_period - 1, atr_period).

use crate::components::indicator::{Indicator, Source};
use crate::domain::Candle;
use crate::indicators::atr::Atr;
use crate::indicators::ema::ema_of_series;
use crate::indicators::sma::sma_of_series;

/// Which band of the Keltner Channel to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeltnerBand {
    Upper,
    Middle,
    Lower,
}

/// Moving average the channel is centred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeltnerBasis {
    Ema(usize),
    Sma(usize),
}

impl KeltnerBasis {
    fn period(&self) -> usize {
        match *self {
            KeltnerBasis::Ema(p) | KeltnerBasis::Sma(p) => p,
        }
    }

    fn label(&self) -> String {
        match *self {
            KeltnerBasis::Ema(p) => format!("ema{p}"),
            KeltnerBasis::Sma(p) => format!("sma{p}"),
        }
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        match *self {
            KeltnerBasis::Ema(p) => ema_of_series(closes, p),
            KeltnerBasis::Sma(p) => sma_of_series(closes, p),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Keltner {
    basis: KeltnerBasis,
    atr_period: usize,
    multiplier: f64,
    band: KeltnerBand,
    name: String,
}

impl Keltner {
    pub fn new(basis: KeltnerBasis, atr_period: usize, multiplier: f64, band: KeltnerBand) -> Self {
        assert!(basis.period() >= 1, "Keltner basis period must be >= 1");
        assert!(atr_period >= 1, "Keltner ATR period must be >= 1");
        let label = match band {
            KeltnerBand::Upper => "upper",
            KeltnerBand::Middle => "middle",
            KeltnerBand::Lower => "lower",
        };
        Self {
            basis,
            atr_period,
            multiplier,
            band,
            name: format!(
                "keltner_{label}_{}_{atr_period}_{multiplier}",
                basis.label()
            ),
        }
    }

    pub fn upper(basis: KeltnerBasis, atr_period: usize, multiplier: f64) -> Self {
        Self::new(basis, atr_period, multiplier, KeltnerBand::Upper)
    }

    pub fn middle(basis: KeltnerBasis, atr_period: usize, multiplier: f64) -> Self {
        Self::new(basis, atr_period, multiplier, KeltnerBand::Middle)
    }

    pub fn lower(basis: KeltnerBasis, atr_period: usize, multiplier: f64) -> Self {
        Self::new(basis, atr_period, multiplier, KeltnerBand::Lower)
    }
}

impl Indicator for Keltner {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.band {
            KeltnerBand::Middle => self.basis.period() - 1,
            _ => (self.basis.period() - 1).max(self.atr_period),
        }
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let middle = self.basis.compute(&Source::Close.extract(candles));
        if self.band == KeltnerBand::Middle {
            return middle;
        }

        let atr = Atr::new(self.atr_period).compute(candles);
        let sign = match self.band {
            KeltnerBand::Upper => 1.0,
            _ => -1.0,
        };

        // NaN in either operand propagates through the arithmetic
        middle
            .iter()
            .zip(&atr)
            .map(|(m, a)| m + sign * self.multiplier * a)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_candles, DEFAULT_EPSILON};

    fn sample() -> Vec<Candle> {
        make_ohlc_candles(&[
            (10.0, 12.0, 9.0, 11.0),
            (11.0, 13.0, 10.0, 12.0),
            (12.0, 14.0, 11.0, 13.0),
            (13.0, 15.0, 12.0, 14.0),
            (14.0, 16.0, 13.0, 15.0),
        ])
    }

    #[test]
    fn keltner_middle_is_ema() {
        let result = Keltner::middle(KeltnerBasis::Ema(3), 3, 1.5).compute(&sample());
        // EMA(3) seed at index 2: mean(11, 12, 13) = 12.0
        assert_approx(result[2], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn keltner_sma_basis() {
        let result = Keltner::middle(KeltnerBasis::Sma(2), 3, 1.5).compute(&sample());
        assert!(result[0].is_nan());
        assert_approx(result[1], 11.5, DEFAULT_EPSILON);
        assert_approx(result[4], 14.5, DEFAULT_EPSILON);
    }

    #[test]
    fn keltner_upper_uses_atr() {
        // TR[1..=3] = 3 each → ATR(3)[3] = 3; SMA(2)[3] = 13.5
        let result = Keltner::upper(KeltnerBasis::Sma(2), 3, 2.0).compute(&sample());
        assert!(result[2].is_nan());
        assert_approx(result[3], 13.5 + 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn keltner_bands_ordered_and_symmetric() {
        let candles = sample();
        let basis = KeltnerBasis::Ema(3);
        let u = Keltner::upper(basis, 3, 1.5).compute(&candles);
        let m = Keltner::middle(basis, 3, 1.5).compute(&candles);
        let l = Keltner::lower(basis, 3, 1.5).compute(&candles);

        let mut checked = 0;
        for i in 0..candles.len() {
            if u[i].is_nan() || m[i].is_nan() || l[i].is_nan() {
                continue;
            }
            assert!(u[i] > m[i] && m[i] > l[i], "bands not ordered at {i}");
            assert_approx(u[i] - m[i], m[i] - l[i], DEFAULT_EPSILON);
            checked += 1;
        }
        assert!(checked > 0);
    }

    #[test]
    fn keltner_lookback() {
        assert_eq!(Keltner::upper(KeltnerBasis::Ema(20), 14, 1.5).lookback(), 19);
        assert_eq!(Keltner::upper(KeltnerBasis::Sma(10), 14, 1.5).lookback(), 14);
        assert_eq!(Keltner::middle(KeltnerBasis::Sma(10), 14, 1.5).lookback(), 9);
    }
}
