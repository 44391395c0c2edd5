//! Analysis runner: wires strategy construction, candle loading, the analysis
//! pass and export together.
//!
//! Entry points:
//! - `run_config()`: loads every pair named in a `RunConfig`, analyzes them in
//!   parallel and writes signal CSVs plus `summary.json`. Used by the CLI.
//! - `analyze_frames()`: analysis over pre-loaded frames, no I/O.
//! - `advise()`: evaluates the runtime callbacks for one open trade.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use scalplab_core::components::frame::CandleFrame;
use scalplab_core::domain::{CallbackContext, LeverageRequest, TradeSide, TradeView};
use scalplab_core::fingerprint::{DatasetHash, ParamFingerprint};
use scalplab_core::params::ParamValue;
use scalplab_core::risk::ratchet;
use scalplab_core::strategy::{analyze, create_strategy, AnalysisStats, Strategy, StrategyError};

use crate::config::RunConfig;
use crate::data_loader::{load_frame, synthetic_frame};
use crate::export::{write_signals, write_summary};

/// Current schema version for persisted summaries.
pub const SCHEMA_VERSION: u32 = 1;

/// One analyzed pair.
#[derive(Debug, Clone)]
pub struct PairReport {
    pub frame: CandleFrame,
    pub stats: AnalysisStats,
    pub dataset_hash: DatasetHash,
}

impl PairReport {
    pub fn summary(&self) -> PairSummary {
        PairSummary {
            pair: self.frame.pair().to_string(),
            timeframe: self.frame.timeframe().to_string(),
            rows: self.stats.rows,
            entries: self.stats.entries,
            exits: self.stats.exits,
            warmed_up: self.stats.warmed_up,
            dataset_hash: self.dataset_hash.0.clone(),
        }
    }
}

/// Per-pair line of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSummary {
    pub pair: String,
    pub timeframe: String,
    pub rows: usize,
    pub entries: usize,
    pub exits: usize,
    pub warmed_up: bool,
    pub dataset_hash: String,
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: String,
    pub param_fingerprint: String,
    pub params: BTreeMap<String, ParamValue>,
    pub pairs: Vec<PairSummary>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Analyze one frame in place.
pub fn analyze_frame(
    strategy: &dyn Strategy,
    mut frame: CandleFrame,
) -> Result<PairReport, StrategyError> {
    let dataset_hash = DatasetHash::of(frame.candles());
    let stats = analyze(strategy, &mut frame)?;
    tracing::info!(
        strategy = strategy.name(),
        pair = frame.pair(),
        rows = stats.rows,
        entries = stats.entries,
        exits = stats.exits,
        "pair analyzed"
    );
    Ok(PairReport {
        frame,
        stats,
        dataset_hash,
    })
}

/// Analyze many frames in parallel, one rayon task per pair.
///
/// Output order matches input order.
pub fn analyze_frames(
    strategy: &dyn Strategy,
    frames: Vec<CandleFrame>,
) -> Result<Vec<PairReport>, StrategyError> {
    frames
        .into_par_iter()
        .map(|frame| analyze_frame(strategy, frame))
        .collect()
}

/// Load the frames a config names: synthetic when requested, CSV otherwise.
pub fn load_frames(config: &RunConfig, strategy: &dyn Strategy) -> Result<Vec<CandleFrame>> {
    let timeframe = strategy.risk().timeframe;
    config
        .pairs
        .iter()
        .map(|pair| match config.synthetic {
            Some(count) => synthetic_frame(pair, timeframe, count)
                .with_context(|| format!("failed to build synthetic candles for {pair}")),
            None => {
                let path = config.data_path(pair, timeframe);
                load_frame(&path, pair, timeframe)
                    .with_context(|| format!("failed to load candles for {pair}"))
            }
        })
        .collect()
}

/// Full offline run: build, load, analyze, export.
///
/// Returns the summary and the directory the artifacts were written to.
pub fn run_config(config: &RunConfig) -> Result<(RunSummary, PathBuf)> {
    let strategy = create_strategy(&config.strategy, &config.params)
        .with_context(|| format!("cannot build strategy '{}'", config.strategy))?;
    let frames = load_frames(config, strategy.as_ref())?;
    let summary = run_frames(strategy.as_ref(), frames, &config.output_dir)?;
    Ok((summary, config.output_dir.clone()))
}

/// Analyze pre-loaded frames and write every artifact into `output_dir`.
pub fn run_frames(
    strategy: &dyn Strategy,
    frames: Vec<CandleFrame>,
    output_dir: &Path,
) -> Result<RunSummary> {
    let reports = analyze_frames(strategy, frames)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    for report in &reports {
        let path = write_signals(&report.frame, output_dir)?;
        tracing::debug!(path = %path.display(), "signals written");
    }

    let summary = summarize(strategy, &reports);
    write_summary(&summary, output_dir)?;
    tracing::info!(
        strategy = %summary.strategy,
        pairs = summary.pairs.len(),
        fingerprint = %summary.param_fingerprint,
        output = %output_dir.display(),
        "run complete"
    );
    Ok(summary)
}

pub fn summarize(strategy: &dyn Strategy, reports: &[PairReport]) -> RunSummary {
    let params = strategy.parameters().values();
    RunSummary {
        schema_version: SCHEMA_VERSION,
        strategy: strategy.name().to_string(),
        param_fingerprint: ParamFingerprint::compute(strategy.name(), &params).0,
        params,
        pairs: reports.iter().map(PairReport::summary).collect(),
    }
}

// ─── Callback advice ────────────────────────────────────────────────

/// An open trade at one instant, as the framework would describe it.
#[derive(Debug, Clone)]
pub struct AdviceRequest {
    pub open_time: NaiveDateTime,
    pub open_rate: f64,
    pub current_time: NaiveDateTime,
    pub current_rate: f64,
    /// Defaults to the long profit implied by the rates.
    pub current_profit: Option<f64>,
    /// Stop rate already in force; the advised stop never moves below it.
    pub previous_stop_rate: Option<f64>,
}

/// What every runtime callback says about an open trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advice {
    pub pair: String,
    pub latest_closed: Option<NaiveDateTime>,
    pub current_profit: f64,
    /// Stop-loss fraction from the dynamic stop, if any.
    pub custom_stoploss: Option<f64>,
    /// Stop rate after applying the fraction and ratcheting against the
    /// previous stop.
    pub stop_rate: Option<f64>,
    pub custom_exit: Option<String>,
    pub roi_target: Option<f64>,
    pub roi_reached: bool,
    pub trailing_active: bool,
    pub leverage: f64,
}

/// Evaluate the callbacks for a trade on an analyzed frame.
pub fn advise(strategy: &dyn Strategy, frame: &CandleFrame, request: &AdviceRequest) -> Advice {
    let pair = frame.pair().to_string();
    let trade = TradeView::long(pair.clone(), request.open_time, request.open_rate);
    let current_profit = request
        .current_profit
        .unwrap_or_else(|| trade.profit_at(request.current_rate));
    let ctx = CallbackContext {
        current_time: request.current_time,
        current_rate: request.current_rate,
        current_profit,
    };

    let custom_stoploss = strategy.custom_stoploss(frame, &trade, &ctx);
    let stop_rate = custom_stoploss
        .map(|fraction| ratchet(request.previous_stop_rate, request.current_rate * (1.0 + fraction)))
        .or(request.previous_stop_rate);

    let risk = strategy.risk();
    let held = trade.held_for(request.current_time);
    let leverage = strategy.leverage(&LeverageRequest {
        pair: pair.clone(),
        current_time: request.current_time,
        current_rate: request.current_rate,
        proposed_leverage: 1.0,
        max_leverage: risk.leverage,
        entry_tag: None,
        side: TradeSide::Long,
    });

    Advice {
        latest_closed: frame
            .latest_closed_index(request.current_time)
            .map(|i| frame.candles()[i].timestamp),
        custom_exit: strategy.custom_exit(frame, &trade, &ctx),
        roi_target: risk.minimal_roi.threshold_at(held),
        roi_reached: risk.minimal_roi.is_reached(held, current_profit),
        trailing_active: risk.trailing.is_active(current_profit),
        pair,
        current_profit,
        custom_stoploss,
        stop_rate,
        leverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::synthetic_candles;
    use scalplab_core::domain::Timeframe;

    fn frame(pair: &str, n: usize) -> CandleFrame {
        CandleFrame::new(pair, Timeframe::M1, synthetic_candles(pair, Timeframe::M1, n)).unwrap()
    }

    #[test]
    fn parallel_analysis_keeps_input_order() {
        let strategy = create_strategy("ema_scalping", &BTreeMap::new()).unwrap();
        let frames = vec![frame("A/USDT", 200), frame("B/USDT", 10), frame("C/USDT", 300)];
        let reports = analyze_frames(strategy.as_ref(), frames).unwrap();

        let pairs: Vec<_> = reports.iter().map(|r| r.frame.pair()).collect();
        assert_eq!(pairs, vec!["A/USDT", "B/USDT", "C/USDT"]);
        assert!(reports[0].stats.warmed_up);
        assert!(!reports[1].stats.warmed_up);
        assert_eq!(reports[2].stats.rows, 300);
    }

    #[test]
    fn summary_fingerprint_tracks_params() {
        let base = create_strategy("rsi_bb", &BTreeMap::new()).unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert("bb_period".to_string(), ParamValue::Int(22));
        let tuned = create_strategy("rsi_bb", &overrides).unwrap();

        let a = summarize(base.as_ref(), &[]);
        let b = summarize(tuned.as_ref(), &[]);
        assert_eq!(a.strategy, "rsi_bb");
        assert_ne!(a.param_fingerprint, b.param_fingerprint);
        assert_eq!(b.params["bb_period"], ParamValue::Int(22));
    }

    #[test]
    fn advice_ratchets_stop_and_reads_roi() {
        let strategy = create_strategy("ema_scalping", &BTreeMap::new()).unwrap();
        let report = analyze_frame(strategy.as_ref(), frame("BTC/USDT", 120)).unwrap();
        let candles = report.frame.candles();
        let open = candles[100];
        let last = candles[119];

        let request = AdviceRequest {
            open_time: open.timestamp,
            open_rate: open.close,
            current_time: last.timestamp + chrono::Duration::minutes(1),
            current_rate: last.close,
            current_profit: Some(0.001),
            previous_stop_rate: Some(last.close * 2.0),
        };
        let advice = advise(strategy.as_ref(), &report.frame, &request);

        assert_eq!(advice.latest_closed, Some(last.timestamp));
        assert_eq!(advice.leverage, 10.0);
        let fraction = advice.custom_stoploss.unwrap();
        assert!(fraction >= -0.02 && fraction <= 0.0);
        // The previous stop is above anything the ATR stop proposes
        assert_eq!(advice.stop_rate, Some(last.close * 2.0));
        // Held 20 minutes: the 15-minute step applies
        assert_eq!(advice.roi_target, Some(0.005));
        assert!(!advice.roi_reached);
        assert!(!advice.trailing_active);
    }
}
