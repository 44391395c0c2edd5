//! ScalpLab Runner: offline harness around `scalplab-core`.
//!
//! This crate provides:
//! - TOML run configs naming a strategy, pairs and parameter overrides
//! - CSV candle loading with a deterministic synthetic fallback
//! - Per-pair analysis, parallel across pairs
//! - Signal CSV and `summary.json` export
//! - Callback advice for a single open trade

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use config::{pair_file_stem, pair_from_path, ConfigError, RunConfig};
pub use data_loader::{load_frame, read_candles, synthetic_candles, synthetic_frame, LoadError};
pub use export::{load_summary, signals_csv, write_signals, write_summary};
pub use runner::{
    advise, analyze_frame, analyze_frames, run_config, run_frames, Advice, AdviceRequest, PairReport,
    PairSummary, RunSummary,
};
