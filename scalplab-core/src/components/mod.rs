//! Building blocks shared by every strategy.
//!
//! - `frame`: the per-pair candle table with named derived columns
//! - `indicator`: the indicator trait producing one column per instance
//! - `predicate`: tri-state row predicates and the entry/exit signal reducer
//! - `stoploss`: ATR-scaled dynamic stop with a static floor
//! - `exit`: ordered early-exit rules

pub mod exit;
pub mod frame;
pub mod indicator;
pub mod predicate;
pub mod stoploss;

pub use exit::{ExitReasoner, ExitSnapshot};
pub use frame::{CandleFrame, Column, FrameError, Row};
pub use indicator::{Indicator, Source};
pub use predicate::{Conjunction, Predicate, SignalRule};
pub use stoploss::AtrStoploss;
