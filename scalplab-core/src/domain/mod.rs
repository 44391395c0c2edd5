//! Domain types: candles, timeframes, and read-only trade views.

pub mod candle;
pub mod timeframe;
pub mod trade;

pub use candle::Candle;
pub use timeframe::Timeframe;
pub use trade::{CallbackContext, EntryRequest, LeverageRequest, TradeSide, TradeView};

/// Errors raised while constructing domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("invalid timeframe '{0}' (expected e.g. 1m, 5m, 1h, 4h, 1d)")]
    InvalidTimeframe(String),
}

/// Trading pair identifier, e.g. "BTC/USDT".
pub type Pair = String;
