//! Candle loading for the runner.
//!
//! Reads `timestamp,open,high,low,close,volume` CSV files into a
//! `CandleFrame`. The timestamp column accepts RFC 3339, `%Y-%m-%d %H:%M:%S`
//! (UTC), or integer epoch milliseconds.
//!
//! Synthetic candles are a developer-only mode: a deterministic random walk
//! seeded from the pair name, so the same pair always gets the same series.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use scalplab_core::components::frame::{CandleFrame, FrameError};
use scalplab_core::domain::{Candle, Timeframe};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed CSV in {}: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{}:{line}: unrecognised timestamp '{value}'", .path.display())]
    Timestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{}:{line}: candle fails OHLCV sanity check", .path.display())]
    InvalidCandle { path: PathBuf, line: u64 },

    #[error("{} contains no candles", .path.display())]
    Empty { path: PathBuf },

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

#[derive(Debug, Deserialize)]
struct CsvCandle {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse a candle timestamp in any of the accepted formats.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    let millis: i64 = raw.parse().ok()?;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Read candles from a CSV file.
pub fn read_candles(path: &Path) -> Result<Vec<Candle>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut candles = Vec::new();
    for record in reader.deserialize::<CsvCandle>() {
        let row = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        // Header is line 1
        let line = candles.len() as u64 + 2;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.to_path_buf(),
            line,
            value: row.timestamp.clone(),
        })?;
        let candle = Candle::new(timestamp, row.open, row.high, row.low, row.close, row.volume);
        if !candle.is_sane() {
            return Err(LoadError::InvalidCandle {
                path: path.to_path_buf(),
                line,
            });
        }
        candles.push(candle);
    }

    if candles.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(candles)
}

/// Load a CSV file into a frame for `pair`.
pub fn load_frame(path: &Path, pair: &str, timeframe: Timeframe) -> Result<CandleFrame, LoadError> {
    let candles = read_candles(path)?;
    tracing::debug!(pair, path = %path.display(), rows = candles.len(), "loaded candles");
    Ok(CandleFrame::new(pair, timeframe, candles)?)
}

/// Deterministic random-walk candles for `pair`.
///
/// Prices start at 100 and move up to ±0.4% per candle; roughly one candle
/// in ten carries a volume spike so volume filters have something to see.
pub fn synthetic_candles(pair: &str, timeframe: Timeframe, count: usize) -> Vec<Candle> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // Deterministic seed from pair name
    let seed: [u8; 32] = *blake3::hash(pair.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let step = timeframe.duration();

    let mut price = 100.0_f64;
    (0..count)
        .map(|i| {
            let change: f64 = rng.gen_range(-0.004..0.004);
            let open = price;
            let close = price * (1.0 + change);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.002));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.002));
            let spike = if rng.gen_bool(0.1) { 3.0 } else { 1.0 };
            let volume = rng.gen_range(500.0..1500.0) * spike;
            price = close;
            Candle::new(start + step * i as i32, open, high, low, close, volume)
        })
        .collect()
}

/// Synthetic candles wrapped in a frame.
pub fn synthetic_frame(
    pair: &str,
    timeframe: Timeframe,
    count: usize,
) -> Result<CandleFrame, LoadError> {
    tracing::warn!(pair, count, "generating synthetic candles");
    Ok(CandleFrame::new(
        pair,
        timeframe,
        synthetic_candles(pair, timeframe, count),
    )?)
}
