//! Strategy trait, the analysis pass, and the shipped strategies.
//!
//! Each strategy is a parameter block, an indicator stage, entry and exit
//! rules, and optional runtime callbacks (dynamic stop, custom exit, leverage,
//! entry confirmation). Strategies are immutable after construction and hold
//! no per-pair state, so one instance serves every pair concurrently.

pub mod bollinger_squeeze;
pub mod ema_scalping;
pub mod macd_ema;
pub mod registry;
pub mod rsi_bb;

pub use bollinger_squeeze::BollingerSqueeze;
pub use ema_scalping::EmaScalping;
pub use macd_ema::MacdEma;
pub use registry::{create_strategy, STRATEGY_NAMES};
pub use rsi_bb::RsiBb;

use serde::{Deserialize, Serialize};

use crate::components::exit::{ExitReasoner, ExitSnapshot};
use crate::components::frame::{CandleFrame, FrameError};
use crate::components::predicate::SignalRule;
use crate::components::stoploss::AtrStoploss;
use crate::domain::{CallbackContext, EntryRequest, LeverageRequest, Timeframe, TradeView};
use crate::params::{ParamError, ParamSet, Parameter};
use crate::risk::StaticRisk;

pub const ENTER_LONG: &str = "enter_long";
pub const EXIT_LONG: &str = "exit_long";
pub const ENTER_TAG: &str = "enter_tag";
pub const EXIT_TAG: &str = "exit_tag";

/// Errors raised while constructing or running a strategy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("unknown strategy '{name}' (available: {available})", name = .0, available = STRATEGY_NAMES.join(", "))]
    UnknownStrategy(String),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// A declarative trading strategy.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn risk(&self) -> &StaticRisk;

    /// Declared tunables with their current values.
    fn parameters(&self) -> &ParamSet;

    /// Append every derived column the rules and callbacks read.
    fn populate_indicators(&self, frame: &mut CandleFrame) -> Result<(), FrameError>;

    fn entry_rule(&self) -> &SignalRule;

    fn exit_rule(&self) -> &SignalRule;

    fn dynamic_stoploss(&self) -> Option<&AtrStoploss> {
        None
    }

    fn exit_reasoner(&self) -> Option<&ExitReasoner> {
        None
    }

    /// Stop-loss override for an open trade, or `None` to keep the current stop.
    fn custom_stoploss(
        &self,
        frame: &CandleFrame,
        _trade: &TradeView,
        ctx: &CallbackContext,
    ) -> Option<f64> {
        self.dynamic_stoploss()?.evaluate(frame, ctx)
    }

    /// Label of the first matching early-exit rule on the latest closed candle.
    fn custom_exit(
        &self,
        frame: &CandleFrame,
        trade: &TradeView,
        ctx: &CallbackContext,
    ) -> Option<String> {
        let reasoner = self.exit_reasoner()?;
        let row = frame.row(frame.latest_closed_index(ctx.current_time)?)?;
        let snapshot = ExitSnapshot { row, trade, ctx };
        reasoner.evaluate(&snapshot).map(str::to_string)
    }

    fn confirm_trade_entry(&self, _request: &EntryRequest) -> bool {
        true
    }

    /// Fixed per strategy; inputs are ignored.
    fn leverage(&self, _request: &LeverageRequest) -> f64 {
        self.risk().leverage
    }

    fn descriptor(&self) -> StrategyDescriptor {
        let mut callbacks = Vec::new();
        if let Some(stop) = self.dynamic_stoploss() {
            callbacks.push(format!("custom_stoploss: atr x {}", stop.multiplier));
        }
        if let Some(reasoner) = self.exit_reasoner() {
            let labels: Vec<_> = reasoner.labels().collect();
            callbacks.push(format!("custom_exit: {}", labels.join(", ")));
        }
        StrategyDescriptor {
            name: self.name().to_string(),
            timeframe: self.risk().timeframe,
            risk: self.risk().clone(),
            parameters: self.parameters().iter().cloned().collect(),
            entry: rule_summary(self.entry_rule()),
            exit: rule_summary(self.exit_rule()),
            callbacks,
        }
    }
}

/// Exportable description of a strategy for the framework and optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub name: String,
    pub timeframe: Timeframe,
    pub risk: StaticRisk,
    pub parameters: Vec<Parameter>,
    pub entry: Vec<String>,
    pub exit: Vec<String>,
    pub callbacks: Vec<String>,
}

fn rule_summary(rule: &SignalRule) -> Vec<String> {
    std::iter::once(rule.primary())
        .chain(rule.alternatives())
        .map(|c| {
            let preds: Vec<_> = c.predicates().iter().map(|p| p.name()).collect();
            format!("{}: {}", c.name(), preds.join(" AND "))
        })
        .collect()
}

/// Counts from one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub rows: usize,
    pub entries: usize,
    pub exits: usize,
    pub warmed_up: bool,
}

/// Run the indicator stage, then write the entry and exit signal columns.
///
/// A frame shorter than the declared startup count still gets its indicator
/// columns, but every signal row is `false`.
pub fn analyze(
    strategy: &dyn Strategy,
    frame: &mut CandleFrame,
) -> Result<AnalysisStats, StrategyError> {
    strategy.populate_indicators(frame)?;

    let rows = frame.len();
    let startup = strategy.risk().startup_candle_count;
    if rows < startup {
        tracing::warn!(
            strategy = strategy.name(),
            pair = frame.pair(),
            rows,
            startup,
            "frame shorter than startup candle count, no signals emitted"
        );
        frame.insert_signal(ENTER_LONG, vec![false; rows])?;
        frame.insert_signal(EXIT_LONG, vec![false; rows])?;
        frame.insert_text(ENTER_TAG, vec![None; rows])?;
        frame.insert_text(EXIT_TAG, vec![None; rows])?;
        return Ok(AnalysisStats {
            rows,
            entries: 0,
            exits: 0,
            warmed_up: false,
        });
    }

    let (enter, enter_tags) = strategy.entry_rule().apply(frame);
    let (exit, exit_tags) = strategy.exit_rule().apply(frame);
    let entries = enter.iter().filter(|v| **v).count();
    let exits = exit.iter().filter(|v| **v).count();

    frame.insert_signal(ENTER_LONG, enter)?;
    frame.insert_signal(EXIT_LONG, exit)?;
    frame.insert_text(ENTER_TAG, enter_tags)?;
    frame.insert_text(EXIT_TAG, exit_tags)?;

    tracing::debug!(
        strategy = strategy.name(),
        pair = frame.pair(),
        rows,
        entries,
        exits,
        "analysis complete"
    );

    Ok(AnalysisStats {
        rows,
        entries,
        exits,
        warmed_up: true,
    })
}

/// Shared risk defaults: leverage 10, exit signals on, trailing after offset.
pub(crate) fn risk_block(
    timeframe: Timeframe,
    stoploss: f64,
    roi: &[(u32, f64)],
    trailing: (f64, f64),
    startup_candle_count: usize,
) -> StaticRisk {
    use crate::risk::{RoiSchedule, TrailingStop};
    StaticRisk {
        timeframe,
        stoploss,
        minimal_roi: RoiSchedule::new(roi),
        trailing: TrailingStop::new(trailing.0, trailing.1),
        startup_candle_count,
        use_exit_signal: true,
        exit_profit_only: false,
        ignore_roi_if_entry_signal: false,
        leverage: 10.0,
    }
}
