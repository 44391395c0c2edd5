//! Integration tests for the runner: config in, CSV and JSON artifacts out.

use std::collections::BTreeMap;
use std::path::Path;

use proptest::prelude::*;
use scalplab_core::domain::{Candle, Timeframe};
use scalplab_core::fingerprint::DatasetHash;
use scalplab_core::params::ParamValue;
use scalplab_core::strategy::create_strategy;
use scalplab_runner::{
    analyze_frame, load_summary, run_config, synthetic_candles, synthetic_frame, RunConfig,
};

fn write_candles(path: &Path, candles: &[Candle]) {
    let mut body = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        body.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp.and_utc().timestamp_millis(),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    std::fs::write(path, body).unwrap();
}

fn config(data_dir: &Path, output_dir: &Path, strategy: &str, pairs: &[&str]) -> RunConfig {
    RunConfig {
        strategy: strategy.to_string(),
        pairs: pairs.iter().map(|p| p.to_string()).collect(),
        data_dir: data_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        synthetic: None,
        params: BTreeMap::new(),
    }
}

#[test]
fn csv_run_writes_signals_and_summary() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let btc = synthetic_candles("BTC/USDT", Timeframe::M1, 240);
    let eth = synthetic_candles("ETH/USDT", Timeframe::M1, 20);
    write_candles(&data.path().join("BTC_USDT-1m.csv"), &btc);
    write_candles(&data.path().join("ETH_USDT-1m.csv"), &eth);

    let cfg = config(data.path(), out.path(), "ema_scalping", &["BTC/USDT", "ETH/USDT"]);
    let (summary, dir) = run_config(&cfg).unwrap();

    assert_eq!(dir, out.path());
    assert_eq!(summary.strategy, "ema_scalping");
    assert_eq!(summary.pairs.len(), 2);

    let btc_row = &summary.pairs[0];
    assert_eq!(btc_row.pair, "BTC/USDT");
    assert_eq!(btc_row.timeframe, "1m");
    assert_eq!(btc_row.rows, 240);
    assert!(btc_row.warmed_up);
    assert_eq!(btc_row.dataset_hash, DatasetHash::of(&btc).0);

    // Shorter than the 30-candle warm-up: analyzed, but silent
    let eth_row = &summary.pairs[1];
    assert!(!eth_row.warmed_up);
    assert_eq!((eth_row.entries, eth_row.exits), (0, 0));

    let signals = std::fs::read_to_string(out.path().join("BTC_USDT-1m-signals.csv")).unwrap();
    assert_eq!(signals.lines().count(), 241);
    assert!(signals.lines().next().unwrap().ends_with("enter_long,exit_long,enter_tag,exit_tag"));

    assert_eq!(load_summary(out.path()).unwrap(), summary);
}

#[test]
fn synthetic_run_needs_no_data_dir() {
    let out = tempfile::tempdir().unwrap();
    let mut cfg = config(
        Path::new("/nonexistent"),
        &out.path().join("nested"),
        "macd_ema",
        &["SOL/USDT"],
    );
    cfg.synthetic = Some(120);

    let (summary, _) = run_config(&cfg).unwrap();
    assert_eq!(summary.pairs[0].timeframe, "4h");
    assert_eq!(summary.pairs[0].rows, 120);
    assert!(out.path().join("nested/SOL_USDT-4h-signals.csv").exists());
}

#[test]
fn overrides_change_fingerprint_and_bad_ones_fail() {
    let out = tempfile::tempdir().unwrap();
    let mut cfg = config(Path::new("."), out.path(), "rsi_bb", &["BTC/USDT"]);
    cfg.synthetic = Some(50);
    let (base, _) = run_config(&cfg).unwrap();

    cfg.params.insert("rsi_buy_threshold".into(), ParamValue::Int(28));
    let (tuned, _) = run_config(&cfg).unwrap();
    assert_ne!(base.param_fingerprint, tuned.param_fingerprint);
    assert_eq!(tuned.params["rsi_buy_threshold"], ParamValue::Int(28));

    cfg.params.insert("rsi_buy_threshold".into(), ParamValue::Int(99));
    assert!(run_config(&cfg).is_err());
}

#[test]
fn missing_candles_and_unknown_strategy_are_errors() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let cfg = config(data.path(), out.path(), "ema_scalping", &["BTC/USDT"]);
    let err = run_config(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("BTC/USDT"), "{err:#}");

    let cfg = config(data.path(), out.path(), "hodl", &["BTC/USDT"]);
    let err = run_config(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("hodl"), "{err:#}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn signal_counts_never_exceed_rows(count in 0usize..150) {
        let strategy = create_strategy("bollinger_squeeze", &BTreeMap::new()).unwrap();
        let frame = synthetic_frame("ADA/USDT", Timeframe::M5, count).unwrap();
        let report = analyze_frame(strategy.as_ref(), frame).unwrap();

        prop_assert_eq!(report.stats.rows, count);
        prop_assert!(report.stats.entries <= count);
        prop_assert!(report.stats.exits <= count);
        if count < 40 {
            prop_assert_eq!(report.stats.entries + report.stats.exits, 0);
        }
    }
}
