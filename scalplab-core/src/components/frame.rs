//! Candle frame: the per-pair table strategies enrich with derived columns.
//!
//! Candles are append-only with strictly increasing timestamps. Columns are
//! aligned 1:1 with candles; a numeric NaN or a flag `None` means "undefined".

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::components::indicator::{Indicator, Source};
use crate::domain::{Candle, Pair, Timeframe};

/// Errors raised while building or extending a frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("candle {index} at {current} is not after the previous candle at {previous}")]
    NonIncreasingTimestamp {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("column '{column}' has {actual} rows, frame has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("column name '{0}' is reserved for candle fields")]
    ReservedColumn(String),

    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),
}

/// A derived column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Indicator output; NaN = undefined.
    Numeric(Vec<f64>),
    /// Tri-state condition; `None` = undefined.
    Flag(Vec<Option<bool>>),
    /// Two-state signal column (`enter_long`, `exit_long`).
    Signal(Vec<bool>),
    /// Free text (`enter_tag`, `exit_tag`).
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Flag(v) => v.len(),
            Column::Signal(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell rendered for export. Undefined cells render as an empty string.
    pub fn render(&self, index: usize) -> String {
        match self {
            Column::Numeric(v) => match v.get(index) {
                Some(x) if !x.is_nan() => x.to_string(),
                _ => String::new(),
            },
            Column::Flag(v) => match v.get(index).copied().flatten() {
                Some(b) => b.to_string(),
                None => String::new(),
            },
            Column::Signal(v) => v.get(index).map(|b| u8::from(*b).to_string()).unwrap_or_default(),
            Column::Text(v) => v.get(index).cloned().flatten().unwrap_or_default(),
        }
    }
}

const CANDLE_FIELDS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

fn candle_source(name: &str) -> Option<Source> {
    match name {
        "open" => Some(Source::Open),
        "high" => Some(Source::High),
        "low" => Some(Source::Low),
        "close" => Some(Source::Close),
        "volume" => Some(Source::Volume),
        _ => None,
    }
}

/// Ordered candle history for one pair and timeframe, plus derived columns.
#[derive(Debug, Clone)]
pub struct CandleFrame {
    pair: Pair,
    timeframe: Timeframe,
    candles: Vec<Candle>,
    columns: BTreeMap<String, Column>,
}

impl CandleFrame {
    pub fn new(
        pair: impl Into<Pair>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> Result<Self, FrameError> {
        for (index, w) in candles.windows(2).enumerate() {
            if w[1].timestamp <= w[0].timestamp {
                return Err(FrameError::NonIncreasingTimestamp {
                    index: index + 1,
                    previous: w[0].timestamp,
                    current: w[1].timestamp,
                });
            }
        }
        Ok(Self {
            pair: pair.into(),
            timeframe,
            candles,
            columns: BTreeMap::new(),
        })
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Append a newer candle. Derived columns are dropped: they must be
    /// recomputed over the extended history.
    pub fn push(&mut self, candle: Candle) -> Result<(), FrameError> {
        if let Some(last) = self.candles.last() {
            if candle.timestamp <= last.timestamp {
                return Err(FrameError::NonIncreasingTimestamp {
                    index: self.candles.len(),
                    previous: last.timestamp,
                    current: candle.timestamp,
                });
            }
        }
        self.candles.push(candle);
        self.columns.clear();
        Ok(())
    }

    // ─── Column writes ───

    fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<(), FrameError> {
        let name = name.into();
        if CANDLE_FIELDS.contains(&name.as_str()) {
            return Err(FrameError::ReservedColumn(name));
        }
        if column.len() != self.candles.len() {
            return Err(FrameError::LengthMismatch {
                column: name,
                expected: self.candles.len(),
                actual: column.len(),
            });
        }
        self.columns.insert(name, column);
        Ok(())
    }

    pub fn insert_numeric(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), FrameError> {
        self.insert(name, Column::Numeric(values))
    }

    pub fn insert_flag(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<bool>>,
    ) -> Result<(), FrameError> {
        self.insert(name, Column::Flag(values))
    }

    pub fn insert_signal(
        &mut self,
        name: impl Into<String>,
        values: Vec<bool>,
    ) -> Result<(), FrameError> {
        self.insert(name, Column::Signal(values))
    }

    pub fn insert_text(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<String>>,
    ) -> Result<(), FrameError> {
        self.insert(name, Column::Text(values))
    }

    /// Compute an indicator over the full history and store it under `column`.
    pub fn add_indicator(
        &mut self,
        column: impl Into<String>,
        indicator: &dyn Indicator,
    ) -> Result<(), FrameError> {
        let values = indicator.compute(&self.candles);
        self.insert_numeric(column, values)
    }

    // ─── Column reads ───

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Numeric series by name. Candle fields are extracted on demand.
    pub fn numeric(&self, name: &str) -> Option<Vec<f64>> {
        if let Some(source) = candle_source(name) {
            return Some(source.extract(&self.candles));
        }
        match self.columns.get(name)? {
            Column::Numeric(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn numeric_ref(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name)? {
            Column::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub fn flags(&self, name: &str) -> Option<&[Option<bool>]> {
        match self.columns.get(name)? {
            Column::Flag(v) => Some(v),
            _ => None,
        }
    }

    pub fn signals(&self, name: &str) -> Option<&[bool]> {
        match self.columns.get(name)? {
            Column::Signal(v) => Some(v),
            _ => None,
        }
    }

    pub fn texts(&self, name: &str) -> Option<&[Option<String>]> {
        match self.columns.get(name)? {
            Column::Text(v) => Some(v),
            _ => None,
        }
    }

    // ─── Row access ───

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.candles.len()).then_some(Row { frame: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.candles.len()).map(move |index| Row { frame: self, index })
    }

    /// Index of the most recent candle that has fully closed at `now`.
    ///
    /// A candle is closed once `timestamp + timeframe <= now`; the candle still
    /// in progress is never returned.
    pub fn latest_closed_index(&self, now: NaiveDateTime) -> Option<usize> {
        let tf = self.timeframe.duration();
        let closed = self.candles.partition_point(|c| c.timestamp + tf <= now);
        closed.checked_sub(1)
    }
}

/// Read-only view of one frame row, with access to earlier rows.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    frame: &'a CandleFrame,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn candle(&self) -> &'a Candle {
        &self.frame.candles[self.index]
    }

    pub fn frame(&self) -> &'a CandleFrame {
        self.frame
    }

    /// Numeric value at this row: a candle field or a numeric column.
    /// Missing columns and NaN both read as `None`.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.value_at(name, self.index)
    }

    /// Numeric value `n` rows back. `None` before the first row.
    pub fn shifted(&self, name: &str, n: usize) -> Option<f64> {
        self.value_at(name, self.index.checked_sub(n)?)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flag_at(name, self.index)
    }

    pub fn flag_shifted(&self, name: &str, n: usize) -> Option<bool> {
        self.flag_at(name, self.index.checked_sub(n)?)
    }

    fn value_at(&self, name: &str, index: usize) -> Option<f64> {
        let v = match candle_source(name) {
            Some(source) => source.read(self.frame.candles.get(index)?),
            None => match self.frame.columns.get(name)? {
                Column::Numeric(v) => *v.get(index)?,
                _ => return None,
            },
        };
        (!v.is_nan()).then_some(v)
    }

    fn flag_at(&self, name: &str, index: usize) -> Option<bool> {
        match self.frame.columns.get(name)? {
            Column::Flag(v) => *v.get(index)?,
            Column::Signal(v) => v.get(index).copied(),
            _ => None,
        }
    }
}

// ─── Series helpers ───

/// Element-wise comparison; undefined where either side is NaN.
pub fn compare_series(a: &[f64], b: &[f64], op: impl Fn(f64, f64) -> bool) -> Vec<Option<bool>> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (!x.is_nan() && !y.is_nan()).then(|| op(x, y)))
        .collect()
}

/// `a` strictly above `b` now and at or below it on the previous row.
pub fn crossed_above_series(a: &[f64], b: &[f64]) -> Vec<Option<bool>> {
    crossing(a, b, |x, y| x > y)
}

/// `a` strictly below `b` now and at or above it on the previous row.
pub fn crossed_below_series(a: &[f64], b: &[f64]) -> Vec<Option<bool>> {
    crossing(a, b, |x, y| x < y)
}

fn crossing(a: &[f64], b: &[f64], holds: impl Fn(f64, f64) -> bool) -> Vec<Option<bool>> {
    let n = a.len().min(b.len());
    let mut out = vec![None; n];
    for i in 1..n {
        let (a0, b0, a1, b1) = (a[i - 1], b[i - 1], a[i], b[i]);
        if a0.is_nan() || b0.is_nan() || a1.is_nan() || b1.is_nan() {
            continue;
        }
        out[i] = Some(holds(a1, b1) && !holds(a0, b0));
    }
    out
}

/// Element-wise `num / den`; NaN where the denominator is zero or undefined.
pub fn ratio_series(num: &[f64], den: &[f64]) -> Vec<f64> {
    num.iter()
        .zip(den)
        .map(|(&n, &d)| if d == 0.0 || d.is_nan() { f64::NAN } else { n / d })
        .collect()
}

/// Band width `(upper - lower) / base`, with `base` the middle band or close.
pub fn band_width_series(upper: &[f64], lower: &[f64], base: &[f64]) -> Vec<f64> {
    let spread: Vec<f64> = upper.iter().zip(lower).map(|(u, l)| u - l).collect();
    ratio_series(&spread, base)
}

/// Position inside the bands: `(close - lower) / (upper - lower)`.
pub fn percent_b_series(close: &[f64], upper: &[f64], lower: &[f64]) -> Vec<f64> {
    let above_lower: Vec<f64> = close.iter().zip(lower).map(|(c, l)| c - l).collect();
    let spread: Vec<f64> = upper.iter().zip(lower).map(|(u, l)| u - l).collect();
    ratio_series(&above_lower, &spread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_candles, Sma};

    fn frame(closes: &[f64]) -> CandleFrame {
        CandleFrame::new("BTC/USDT", Timeframe::M1, make_candles(closes)).unwrap()
    }

    #[test]
    fn rejects_non_increasing_timestamps() {
        let mut candles = make_candles(&[1.0, 2.0, 3.0]);
        candles[2].timestamp = candles[1].timestamp;
        let err = CandleFrame::new("X/Y", Timeframe::M1, candles).unwrap_err();
        assert!(matches!(err, FrameError::NonIncreasingTimestamp { index: 2, .. }));
    }

    #[test]
    fn push_appends_and_drops_columns() {
        let mut f = frame(&[1.0, 2.0]);
        f.add_indicator("sma_2", &Sma::new(2)).unwrap();
        let mut next = f.candles()[1];
        next.timestamp += Timeframe::M1.duration();
        f.push(next).unwrap();
        assert_eq!(f.len(), 3);
        assert!(f.column("sma_2").is_none());

        let stale = f.candles()[0];
        assert!(f.push(stale).is_err());
    }

    #[test]
    fn insert_checks_length_and_reserved_names() {
        let mut f = frame(&[1.0, 2.0]);
        assert!(matches!(
            f.insert_numeric("x", vec![1.0]),
            Err(FrameError::LengthMismatch { .. })
        ));
        assert_eq!(
            f.insert_numeric("close", vec![1.0, 2.0]),
            Err(FrameError::ReservedColumn("close".into()))
        );
    }

    #[test]
    fn row_reads_candles_columns_and_shifts() {
        let mut f = frame(&[10.0, 11.0, 12.0]);
        f.add_indicator("sma_2", &Sma::new(2)).unwrap();
        f.insert_flag("up", vec![None, Some(true), Some(false)]).unwrap();

        let row = f.row(2).unwrap();
        assert_eq!(row.value("close"), Some(12.0));
        assert_eq!(row.value("sma_2"), Some(11.5));
        assert_eq!(row.shifted("sma_2", 1), Some(10.5));
        assert_eq!(row.shifted("sma_2", 2), None); // NaN warmup
        assert_eq!(row.shifted("close", 3), None); // before first row
        assert_eq!(row.flag("up"), Some(false));
        assert_eq!(row.flag_shifted("up", 1), Some(true));
        assert_eq!(row.value("missing"), None);
        assert!(f.row(3).is_none());
    }

    #[test]
    fn latest_closed_index_skips_open_candle() {
        let f = frame(&[1.0, 2.0, 3.0]);
        let t0 = f.candles()[0].timestamp;
        let minute = Timeframe::M1.duration();

        assert_eq!(f.latest_closed_index(t0), None);
        assert_eq!(f.latest_closed_index(t0 + minute), Some(0));
        // Halfway through candle 2: candle 1 is the latest closed one
        assert_eq!(
            f.latest_closed_index(t0 + minute * 2 + chrono::Duration::seconds(30)),
            Some(1)
        );
        assert_eq!(f.latest_closed_index(t0 + minute * 10), Some(2));
    }

    #[test]
    fn crossover_series_fire_once_per_crossing() {
        let a = [1.0, 2.0, 3.0, 3.0, 1.0];
        let b = [2.0, 2.0, 2.0, 2.0, 2.0];
        let up = crossed_above_series(&a, &b);
        let down = crossed_below_series(&a, &b);
        assert_eq!(up, vec![None, Some(false), Some(true), Some(false), Some(false)]);
        assert_eq!(down, vec![None, Some(false), Some(false), Some(false), Some(true)]);
    }

    #[test]
    fn crossover_undefined_around_nan() {
        let a = [f64::NAN, 3.0, 1.0];
        let b = [2.0, 2.0, 2.0];
        assert_eq!(crossed_above_series(&a, &b), vec![None, None, Some(false)]);
    }

    #[test]
    fn ratio_and_compare_handle_undefined() {
        let r = ratio_series(&[4.0, 1.0, 2.0], &[2.0, 0.0, f64::NAN]);
        assert_eq!(r[0], 2.0);
        assert!(r[1].is_nan() && r[2].is_nan());
        let c = compare_series(&[1.0, f64::NAN], &[0.0, 0.0], |x, y| x > y);
        assert_eq!(c, vec![Some(true), None]);
    }

    #[test]
    fn band_helpers() {
        let upper = [12.0, 10.0];
        let lower = [8.0, 10.0];
        let width = band_width_series(&upper, &lower, &[10.0, 10.0]);
        assert_eq!(width, vec![0.4, 0.0]);
        let pb = percent_b_series(&[11.0, 10.0], &upper, &lower);
        assert_eq!(pb[0], 0.75);
        assert!(pb[1].is_nan()); // collapsed bands
    }

    #[test]
    fn render_cells() {
        assert_eq!(Column::Numeric(vec![f64::NAN]).render(0), "");
        assert_eq!(Column::Flag(vec![Some(true)]).render(0), "true");
        assert_eq!(Column::Signal(vec![true]).render(0), "1");
        assert_eq!(Column::Text(vec![None]).render(0), "");
    }
}
