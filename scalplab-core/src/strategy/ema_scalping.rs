//! EMA 5/10/21 crossover scalper on 1m candles.
//!
//! Enters on a fast/medium EMA cross-up inside an uptrend, confirmed by RSI,
//! a volume spike, positive MACD momentum and a minimum Bollinger width.
//! Exits on the cross-down, overbought RSI, fading MACD, or a downtrend.

use chrono::Duration;

use crate::components::exit::ExitReasoner;
use crate::components::frame::{
    band_width_series, compare_series, crossed_above_series, crossed_below_series, ratio_series,
    CandleFrame, FrameError,
};
use crate::components::indicator::{Indicator, Source};
use crate::components::predicate::{
    above, at_least, at_most, falling, flag, gt, lt, Conjunction, SignalRule,
};
use crate::components::stoploss::AtrStoploss;
use crate::domain::Timeframe;
use crate::indicators::{Atr, Bollinger, Ema, Macd, Rsi, Sma};
use crate::params::{ParamError, ParamSet, ParamSpace, Parameter};
use crate::risk::StaticRisk;

use super::{risk_block, Strategy};

pub const NAME: &str = "ema_scalping";

const STOPLOSS: f64 = -0.02;
const ATR_MULTIPLIER: f64 = 1.5;
const MIN_BB_WIDTH: f64 = 0.015;

/// Typed view of the declared parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaScalpingParams {
    pub ema_fast: usize,
    pub ema_medium: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub rsi_buy_min: f64,
    pub rsi_buy_max: f64,
    pub rsi_sell_threshold: f64,
    pub volume_factor: f64,
}

impl EmaScalpingParams {
    pub fn declare() -> ParamSet {
        use ParamSpace::{Buy, Sell};
        ParamSet::new(vec![
            Parameter::int("ema_fast", 3, 8, 5, Buy),
            Parameter::int("ema_medium", 8, 15, 10, Buy),
            Parameter::int("ema_slow", 18, 25, 21, Buy),
            Parameter::int("rsi_period", 10, 16, 14, Buy),
            Parameter::int("rsi_buy_min", 25, 35, 30, Buy),
            Parameter::int("rsi_buy_max", 65, 75, 70, Buy),
            Parameter::int("rsi_sell_threshold", 70, 80, 75, Sell),
            Parameter::decimal("volume_factor", 1.2, 2.0, 1.5, Buy),
        ])
    }

    pub fn from_set(set: &ParamSet) -> Result<Self, ParamError> {
        Ok(Self {
            ema_fast: set.usize("ema_fast")?,
            ema_medium: set.usize("ema_medium")?,
            ema_slow: set.usize("ema_slow")?,
            rsi_period: set.usize("rsi_period")?,
            rsi_buy_min: set.decimal("rsi_buy_min")?,
            rsi_buy_max: set.decimal("rsi_buy_max")?,
            rsi_sell_threshold: set.decimal("rsi_sell_threshold")?,
            volume_factor: set.decimal("volume_factor")?,
        })
    }
}

impl Default for EmaScalpingParams {
    fn default() -> Self {
        Self {
            ema_fast: 5,
            ema_medium: 10,
            ema_slow: 21,
            rsi_period: 14,
            rsi_buy_min: 30.0,
            rsi_buy_max: 70.0,
            rsi_sell_threshold: 75.0,
            volume_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmaScalping {
    set: ParamSet,
    params: EmaScalpingParams,
    risk: StaticRisk,
    entry: SignalRule,
    exit: SignalRule,
    stoploss: AtrStoploss,
    reasoner: ExitReasoner,
}

impl EmaScalping {
    pub fn new() -> Self {
        Self::from_parts(EmaScalpingParams::declare(), EmaScalpingParams::default())
    }

    pub fn with_params(set: ParamSet) -> Result<Self, ParamError> {
        let params = EmaScalpingParams::from_set(&set)?;
        Ok(Self::from_parts(set, params))
    }

    fn from_parts(set: ParamSet, params: EmaScalpingParams) -> Self {
        Self {
            entry: entry_rule(&params),
            exit: exit_rule(&params),
            risk: risk_block(
                Timeframe::M1,
                STOPLOSS,
                &[(0, 0.03), (3, 0.02), (5, 0.015), (10, 0.01), (15, 0.005)],
                (0.005, 0.01),
                30,
            ),
            stoploss: AtrStoploss::new("atr", ATR_MULTIPLIER, STOPLOSS),
            reasoner: exit_reasoner(),
            params,
            set,
        }
    }

    pub fn params(&self) -> &EmaScalpingParams {
        &self.params
    }
}

impl Default for EmaScalping {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_rule(p: &EmaScalpingParams) -> SignalRule {
    SignalRule::new(Conjunction::new(
        "ema_cross_up",
        vec![
            flag("ema_cross_up"),
            flag("uptrend"),
            at_least("rsi", p.rsi_buy_min),
            at_most("rsi", p.rsi_buy_max),
            above("volume_ratio", p.volume_factor),
            above("macdhist", 0.0),
            above("bb_width", MIN_BB_WIDTH),
            gt("close", "ema_slow"),
        ],
    ))
}

fn exit_rule(p: &EmaScalpingParams) -> SignalRule {
    SignalRule::new(Conjunction::new("ema_cross_down", vec![flag("ema_cross_down")]))
        .or(Conjunction::new(
            "rsi_overbought",
            vec![above("rsi", p.rsi_sell_threshold)],
        ))
        .or(Conjunction::new(
            "macd_fading",
            vec![lt("macd", "macdsignal"), falling("macdhist")],
        ))
        .or(Conjunction::new("downtrend", vec![flag("downtrend")]))
}

fn exit_reasoner() -> ExitReasoner {
    ExitReasoner::new()
        .rule("quick_profit_scalp", |s| {
            s.profit() > 0.02 && s.held_for() < Duration::seconds(120)
        })
        .rule("rsi_extreme_exit", |s| {
            s.profit() > 0.005 && s.value("rsi").is_some_and(|r| r > 80.0)
        })
}

impl Strategy for EmaScalping {
    fn name(&self) -> &str {
        NAME
    }

    fn risk(&self) -> &StaticRisk {
        &self.risk
    }

    fn parameters(&self) -> &ParamSet {
        &self.set
    }

    fn populate_indicators(&self, frame: &mut CandleFrame) -> Result<(), FrameError> {
        let p = &self.params;
        let candles = frame.candles();

        let fast = Ema::new(p.ema_fast).compute(candles);
        let medium = Ema::new(p.ema_medium).compute(candles);
        let slow = Ema::new(p.ema_slow).compute(candles);
        let cross_up = crossed_above_series(&fast, &medium);
        let cross_down = crossed_below_series(&fast, &medium);
        let uptrend = compare_series(&medium, &slow, |m, s| m > s);
        let downtrend = compare_series(&medium, &slow, |m, s| m < s);

        let volume = Source::Volume.extract(candles);
        let volume_sma = Sma::of(10, Source::Volume).compute(candles);
        let volume_ratio = ratio_series(&volume, &volume_sma);

        let bb_upper = Bollinger::upper(20, 2.0).compute(candles);
        let bb_lower = Bollinger::lower(20, 2.0).compute(candles);
        let bb_width = band_width_series(&bb_upper, &bb_lower, &Source::Close.extract(candles));

        let rsi = Rsi::new(p.rsi_period).compute(candles);
        let macd = Macd::line(12, 26, 9).compute(candles);
        let macdsignal = Macd::signal(12, 26, 9).compute(candles);
        let macdhist = Macd::histogram(12, 26, 9).compute(candles);
        let atr = Atr::new(14).compute(candles);

        frame.insert_numeric("ema_fast", fast)?;
        frame.insert_numeric("ema_medium", medium)?;
        frame.insert_numeric("ema_slow", slow)?;
        frame.insert_flag("ema_cross_up", cross_up)?;
        frame.insert_flag("ema_cross_down", cross_down)?;
        frame.insert_flag("uptrend", uptrend)?;
        frame.insert_flag("downtrend", downtrend)?;
        frame.insert_numeric("rsi", rsi)?;
        frame.insert_numeric("volume_sma", volume_sma)?;
        frame.insert_numeric("volume_ratio", volume_ratio)?;
        frame.insert_numeric("macd", macd)?;
        frame.insert_numeric("macdsignal", macdsignal)?;
        frame.insert_numeric("macdhist", macdhist)?;
        frame.insert_numeric("bb_upper", bb_upper)?;
        frame.insert_numeric("bb_lower", bb_lower)?;
        frame.insert_numeric("bb_width", bb_width)?;
        frame.insert_numeric("atr", atr)?;
        Ok(())
    }

    fn entry_rule(&self) -> &SignalRule {
        &self.entry
    }

    fn exit_rule(&self) -> &SignalRule {
        &self.exit
    }

    fn dynamic_stoploss(&self) -> Option<&AtrStoploss> {
        Some(&self.stoploss)
    }

    fn exit_reasoner(&self) -> Option<&ExitReasoner> {
        Some(&self.reasoner)
    }
}
