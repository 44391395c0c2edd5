//! ScalpLab Core: indicators, signal reducers and runtime callbacks for
//! leveraged scalping strategies.
//!
//! This crate contains everything a strategy needs, with no I/O:
//! - Domain types (candles, timeframes, read-only trade views)
//! - Indicator library producing NaN-padded columns
//! - Candle frame with named derived columns and row views
//! - Tri-state predicates and the entry/exit signal reducer
//! - Dynamic ATR stop-loss and ordered custom-exit rules
//! - Parameter declarations, static risk config, fingerprints
//! - The four shipped strategies and the name registry

pub mod components;
pub mod domain;
pub mod fingerprint;
pub mod indicators;
pub mod params;
pub mod risk;
pub mod strategy;
