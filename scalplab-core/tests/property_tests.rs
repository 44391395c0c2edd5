//! Property tests for strategy invariants.
//!
//! Uses proptest to verify:
//! 1. Dynamic stop never falls below the static floor
//! 2. Crossovers fire once per crossing, never on consecutive rows
//! 3. Frames shorter than the warm-up emit no signals
//! 4. The indicator stage is idempotent
//! 5. ROI lookup picks the largest threshold not exceeding elapsed time
//! 6. Overrides outside the declared range are rejected

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use scalplab_core::components::frame::{crossed_above_series, crossed_below_series, CandleFrame};
use scalplab_core::components::stoploss::AtrStoploss;
use scalplab_core::domain::{Candle, Timeframe};
use scalplab_core::params::{ParamError, ParamSpace, ParamValue, Parameter};
use scalplab_core::risk::RoiSchedule;
use scalplab_core::strategy::{analyze, create_strategy, ENTER_LONG, EXIT_LONG, STRATEGY_NAMES};
use std::collections::BTreeMap;

// ── Generators ───────────────────────────────────────────────────────

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-2.0..2.0_f64, 1..max_len).prop_map(|steps| {
        let mut price = 100.0_f64;
        steps
            .into_iter()
            .map(|s| {
                price = (price + s).max(5.0);
                price
            })
            .collect()
    })
}

fn candles_from(closes: &[f64]) -> Vec<Candle> {
    let base = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 800.0 + (i % 7) as f64 * 150.0,
            }
        })
        .collect()
}

fn arb_strategy_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(STRATEGY_NAMES.to_vec())
}

// ── 1. Stop floor ────────────────────────────────────────────────────

proptest! {
    /// The dynamic stop is a negative fraction no looser than the floor.
    #[test]
    fn stop_never_below_floor(
        atr in 0.0..50.0_f64,
        rate in 0.01..1000.0_f64,
        multiplier in 0.5..4.0_f64,
        floor in -0.2..-0.001_f64,
    ) {
        let stop = AtrStoploss::new("atr", multiplier, floor);
        let fraction = stop.stop_fraction(atr, rate).unwrap();
        prop_assert!(fraction >= floor);
        prop_assert!(fraction <= 0.0);
    }
}

// ── 2. Crossovers ────────────────────────────────────────────────────

proptest! {
    /// A crossing fires on exactly one row, and never on two rows in a row.
    #[test]
    fn crossover_fires_once_per_crossing(a in prop::collection::vec(-5.0..5.0_f64, 2..120)) {
        let zero = vec![0.0; a.len()];
        let up = crossed_above_series(&a, &zero);
        let down = crossed_below_series(&a, &zero);

        prop_assert_eq!(up[0], None);
        let transitions = a.windows(2).filter(|w| w[1] > 0.0 && w[0] <= 0.0).count();
        let fired = up.iter().filter(|v| **v == Some(true)).count();
        prop_assert_eq!(fired, transitions);

        for w in up.windows(2).chain(down.windows(2)) {
            prop_assert!(!(w[0] == Some(true) && w[1] == Some(true)));
        }
    }
}

// ── 3. Short frames ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Below the warm-up length no entry or exit signal is ever set.
    #[test]
    fn short_frame_emits_no_signals(name in arb_strategy_name(), closes in arb_closes(60)) {
        let strategy = create_strategy(name, &BTreeMap::new()).unwrap();
        let startup = strategy.risk().startup_candle_count;
        let closes = &closes[..closes.len().min(startup - 1)];

        let mut frame = CandleFrame::new("ETH/USDT", Timeframe::M1, candles_from(closes)).unwrap();
        let stats = analyze(strategy.as_ref(), &mut frame).unwrap();

        prop_assert!(!stats.warmed_up);
        prop_assert_eq!(stats.entries + stats.exits, 0);
        prop_assert!(frame.signals(ENTER_LONG).unwrap().iter().all(|v| !v));
        prop_assert!(frame.signals(EXIT_LONG).unwrap().iter().all(|v| !v));
    }

    /// Running the indicator stage twice yields identical columns.
    #[test]
    fn indicator_stage_is_idempotent(name in arb_strategy_name(), closes in arb_closes(150)) {
        let strategy = create_strategy(name, &BTreeMap::new()).unwrap();
        let mut frame = CandleFrame::new("ETH/USDT", Timeframe::M1, candles_from(&closes)).unwrap();

        strategy.populate_indicators(&mut frame).unwrap();
        let first = frame.clone();
        strategy.populate_indicators(&mut frame).unwrap();

        let names: Vec<_> = first.column_names().collect();
        prop_assert_eq!(&names, &frame.column_names().collect::<Vec<_>>());
        for name in names {
            let (a, b) = (first.column(name).unwrap(), frame.column(name).unwrap());
            for i in 0..frame.len() {
                prop_assert_eq!(a.render(i), b.render(i));
            }
        }
    }
}

// ── 4. ROI lookup ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn roi_picks_largest_threshold_not_exceeding_elapsed(
        keys in prop::collection::btree_set(0u32..500, 1..8),
        minutes in 0i64..1000,
    ) {
        let steps: Vec<(u32, f64)> = keys.iter().map(|&m| (m, f64::from(m) / 1000.0)).collect();
        let roi = RoiSchedule::new(&steps);
        let expected = keys
            .iter()
            .rev()
            .find(|&&m| i64::from(m) <= minutes)
            .map(|&m| f64::from(m) / 1000.0);
        prop_assert_eq!(roi.threshold_at(Duration::minutes(minutes)), expected);
    }
}

// ── 5. Parameter ranges ──────────────────────────────────────────────

proptest! {
    #[test]
    fn out_of_range_overrides_rejected(value in -100i64..100) {
        let param = Parameter::int("ema_fast", 3, 8, 5, ParamSpace::Buy);
        let result = param.validate(ParamValue::Int(value));
        if (3..=8).contains(&value) {
            prop_assert_eq!(result, Ok(ParamValue::Int(value)));
        } else {
            let rejected = matches!(result, Err(ParamError::OutOfRange { .. }));
            prop_assert!(rejected);
        }
    }
}
