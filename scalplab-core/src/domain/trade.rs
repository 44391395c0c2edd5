//! Read-only views of framework-owned trade state passed into callbacks.
//!
//! The framework owns positions and their lifecycle. Strategies only read the
//! handful of attributes below and return advisory values.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

/// Accessors the framework exposes for an open trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeView {
    pub pair: String,
    pub open_time: NaiveDateTime,
    pub open_rate: f64,
    pub side: TradeSide,
}

impl TradeView {
    pub fn long(pair: impl Into<String>, open_time: NaiveDateTime, open_rate: f64) -> Self {
        Self {
            pair: pair.into(),
            open_time,
            open_rate,
            side: TradeSide::Long,
        }
    }

    /// Time the trade has been open at `now`. Never negative.
    pub fn held_for(&self, now: NaiveDateTime) -> Duration {
        (now - self.open_time).max(Duration::zero())
    }

    /// Profit fraction at `rate`, ignoring fees and leverage.
    pub fn profit_at(&self, rate: f64) -> f64 {
        match self.side {
            TradeSide::Long => rate / self.open_rate - 1.0,
            TradeSide::Short => 1.0 - rate / self.open_rate,
        }
    }
}

/// Per-tick inputs shared by the stop-loss and exit callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallbackContext {
    pub current_time: NaiveDateTime,
    pub current_rate: f64,
    /// Unrealized profit as a fraction (0.01 = 1%).
    pub current_profit: f64,
}

/// Inputs to the leverage hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageRequest {
    pub pair: String,
    pub current_time: NaiveDateTime,
    pub current_rate: f64,
    pub proposed_leverage: f64,
    pub max_leverage: f64,
    pub entry_tag: Option<String>,
    pub side: TradeSide,
}

/// Inputs to the entry-confirmation hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRequest {
    pub pair: String,
    pub order_type: String,
    pub amount: f64,
    pub rate: f64,
    pub current_time: NaiveDateTime,
    pub entry_tag: Option<String>,
    pub side: TradeSide,
}
