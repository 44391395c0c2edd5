//! Look-ahead contamination tests for indicators and full strategy analysis.
//!
//! Invariant: no value at row t may depend on candles t+1 or later.
//!
//! Method: compute on a truncated series (rows 0..150) and the full series
//! (rows 0..300). Rows 0..150 must be identical between both runs.

use chrono::NaiveDate;
use scalplab_core::components::frame::CandleFrame;
use scalplab_core::components::indicator::{Indicator, Source};
use scalplab_core::domain::{Candle, Timeframe};
use scalplab_core::indicators::*;
use scalplab_core::strategy::{analyze, create_strategy, STRATEGY_NAMES};
use std::collections::BTreeMap;

/// Deterministic pseudo-random walk on one-minute candles.
fn make_test_candles(n: usize) -> Vec<Candle> {
    let base = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
            let change = ((seed >> 33) % 200) as f64 / 100.0 - 1.0;
            let open = price;
            price = (price + change).max(10.0);
            let close = price;
            Candle {
                timestamp: base + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.4,
                low: open.min(close) - 0.4,
                close,
                volume: 1000.0 + ((seed >> 40) % 500) as f64,
            }
        })
        .collect()
}

fn assert_no_lookahead(indicator: &dyn Indicator, full: &[Candle], truncated_len: usize) {
    let truncated_result = indicator.compute(&full[..truncated_len]);
    let full_result = indicator.compute(full);

    assert_eq!(truncated_result.len(), truncated_len, "{}", indicator.name());
    assert_eq!(full_result.len(), full.len(), "{}", indicator.name());

    for i in 0..truncated_len {
        let (t, f) = (truncated_result[i], full_result[i]);
        if t.is_nan() && f.is_nan() {
            continue;
        }
        assert!(
            !t.is_nan() && !f.is_nan(),
            "{}: NaN mismatch at row {i} (truncated={t}, full={f})",
            indicator.name()
        );
        assert!(
            (t - f).abs() < 1e-10,
            "{}: look-ahead at row {i}: truncated={t}, full={f}",
            indicator.name()
        );
    }
}

#[test]
fn lookahead_moving_averages() {
    let candles = make_test_candles(300);
    assert_no_lookahead(&Sma::new(10), &candles, 150);
    assert_no_lookahead(&Sma::of(20, Source::Volume), &candles, 150);
    assert_no_lookahead(&Ema::new(5), &candles, 150);
    assert_no_lookahead(&Ema::new(50), &candles, 150);
}

#[test]
fn lookahead_oscillators() {
    let candles = make_test_candles(300);
    assert_no_lookahead(&Rsi::new(14), &candles, 150);
    assert_no_lookahead(&Stochastic::k(5, 3, 3), &candles, 150);
    assert_no_lookahead(&Stochastic::d(5, 3, 3), &candles, 150);
    assert_no_lookahead(&Adx::new(14), &candles, 150);
}

#[test]
fn lookahead_macd() {
    let candles = make_test_candles(300);
    assert_no_lookahead(&Macd::line(12, 26, 9), &candles, 150);
    assert_no_lookahead(&Macd::signal(12, 26, 9), &candles, 150);
    assert_no_lookahead(&Macd::histogram(12, 26, 9), &candles, 150);
}

#[test]
fn lookahead_bands() {
    let candles = make_test_candles(300);
    assert_no_lookahead(&Atr::new(14), &candles, 150);
    assert_no_lookahead(&Bollinger::upper(20, 2.0), &candles, 150);
    assert_no_lookahead(&Bollinger::lower(20, 2.0), &candles, 150);
    assert_no_lookahead(&Keltner::upper(KeltnerBasis::Sma(20), 20, 2.0), &candles, 150);
    assert_no_lookahead(&Keltner::lower(KeltnerBasis::Ema(20), 10, 1.5), &candles, 150);
}

/// Every column a strategy writes, signals included, is prefix-stable.
#[test]
fn lookahead_strategy_analysis() {
    let candles = make_test_candles(300);
    for name in STRATEGY_NAMES {
        let strategy = create_strategy(name, &BTreeMap::new()).unwrap();
        let tf = Timeframe::M1;

        let mut full = CandleFrame::new("BTC/USDT", tf, candles.clone()).unwrap();
        let mut truncated = CandleFrame::new("BTC/USDT", tf, candles[..150].to_vec()).unwrap();
        analyze(strategy.as_ref(), &mut full).unwrap();
        analyze(strategy.as_ref(), &mut truncated).unwrap();

        for (column, values) in truncated.columns() {
            let other = full.column(column).unwrap();
            for i in 0..truncated.len() {
                assert_eq!(
                    values.render(i),
                    other.render(i),
                    "{name}: column '{column}' differs at row {i}"
                );
            }
        }
    }
}
