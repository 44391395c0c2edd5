//! MACD crossover swing strategy on 4h candles, filtered by a stacked EMA
//! trend, ADX strength and stochastic momentum.

use crate::components::exit::ExitReasoner;
use crate::components::frame::{
    compare_series, crossed_above_series, crossed_below_series, percent_b_series, ratio_series,
    CandleFrame, FrameError,
};
use crate::components::indicator::{Indicator, Source};
use crate::components::predicate::{
    above, all, below, flag, gt, lt, rising, Conjunction, SignalRule,
};
use crate::components::stoploss::AtrStoploss;
use crate::domain::Timeframe;
use crate::indicators::{Adx, Atr, Bollinger, Ema, Macd, Rsi, Sma, Stochastic};
use crate::params::{ParamError, ParamSet, ParamSpace, Parameter};
use crate::risk::StaticRisk;

use super::{risk_block, Strategy};

pub const NAME: &str = "macd_ema";

const STOPLOSS: f64 = -0.06;
const ATR_MULTIPLIER: f64 = 2.5;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdEmaParams {
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ema_short: usize,
    pub ema_medium: usize,
    pub ema_long: usize,
    pub rsi_period: usize,
    pub rsi_buy_max: f64,
    /// Declared for the optimizer; no rule reads it.
    pub rsi_sell_min: f64,
    pub volume_factor: f64,
}

impl MacdEmaParams {
    pub fn declare() -> ParamSet {
        use ParamSpace::{Buy, Sell};
        ParamSet::new(vec![
            Parameter::int("macd_fast", 8, 15, 12, Buy),
            Parameter::int("macd_slow", 20, 30, 26, Buy),
            Parameter::int("macd_signal", 7, 12, 9, Buy),
            Parameter::int("ema_short", 8, 15, 12, Buy),
            Parameter::int("ema_medium", 18, 25, 21, Buy),
            Parameter::int("ema_long", 45, 55, 50, Buy),
            Parameter::int("rsi_period", 12, 18, 14, Buy),
            Parameter::int("rsi_buy_max", 65, 75, 70, Buy),
            Parameter::int("rsi_sell_min", 25, 35, 30, Sell),
            Parameter::decimal("volume_factor", 1.2, 2.5, 1.8, Buy),
        ])
    }

    pub fn from_set(set: &ParamSet) -> Result<Self, ParamError> {
        Ok(Self {
            macd_fast: set.usize("macd_fast")?,
            macd_slow: set.usize("macd_slow")?,
            macd_signal: set.usize("macd_signal")?,
            ema_short: set.usize("ema_short")?,
            ema_medium: set.usize("ema_medium")?,
            ema_long: set.usize("ema_long")?,
            rsi_period: set.usize("rsi_period")?,
            rsi_buy_max: set.decimal("rsi_buy_max")?,
            rsi_sell_min: set.decimal("rsi_sell_min")?,
            volume_factor: set.decimal("volume_factor")?,
        })
    }
}

impl Default for MacdEmaParams {
    fn default() -> Self {
        Self {
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ema_short: 12,
            ema_medium: 21,
            ema_long: 50,
            rsi_period: 14,
            rsi_buy_max: 70.0,
            rsi_sell_min: 30.0,
            volume_factor: 1.8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MacdEma {
    set: ParamSet,
    params: MacdEmaParams,
    risk: StaticRisk,
    entry: SignalRule,
    exit: SignalRule,
    stoploss: AtrStoploss,
    reasoner: ExitReasoner,
}

impl MacdEma {
    pub fn new() -> Self {
        Self::from_parts(MacdEmaParams::declare(), MacdEmaParams::default())
    }

    pub fn with_params(set: ParamSet) -> Result<Self, ParamError> {
        let params = MacdEmaParams::from_set(&set)?;
        Ok(Self::from_parts(set, params))
    }

    fn from_parts(set: ParamSet, params: MacdEmaParams) -> Self {
        Self {
            entry: entry_rule(&params),
            exit: exit_rule(),
            risk: risk_block(
                Timeframe::H4,
                STOPLOSS,
                &[(0, 0.20), (120, 0.15), (240, 0.10), (480, 0.05), (720, 0.02)],
                (0.015, 0.025),
                60,
            ),
            stoploss: AtrStoploss::new("atr", ATR_MULTIPLIER, STOPLOSS),
            reasoner: exit_reasoner(),
            params,
            set,
        }
    }

    pub fn params(&self) -> &MacdEmaParams {
        &self.params
    }
}

impl Default for MacdEma {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_rule(p: &MacdEmaParams) -> SignalRule {
    SignalRule::new(Conjunction::new(
        "macd_cross_above",
        vec![
            flag("macd_cross_above"),
            flag("uptrend"),
            above("macd", -0.0001),
            above("volume_ratio", p.volume_factor),
            below("rsi", p.rsi_buy_max),
            above("adx", 25.0),
            below("bb_percent", 0.85),
            all(
                "stoch_bullish",
                vec![gt("stoch_k", "stoch_d"), below("stoch_k", 80.0)],
            ),
            rising("macdhist"),
            gt("close", "ema_medium"),
        ],
    ))
}

fn exit_rule() -> SignalRule {
    SignalRule::new(Conjunction::new(
        "macd_cross_below",
        vec![flag("macd_cross_below")],
    ))
    .or(Conjunction::new(
        "rsi_extreme",
        vec![above("rsi", 80.0), above("bb_percent", 0.95)],
    ))
    .or(Conjunction::new(
        "trend_break",
        vec![lt("close", "ema_short"), lt("ema_short", "ema_medium")],
    ))
    .or(Conjunction::new(
        "stoch_overbought",
        vec![lt("stoch_k", "stoch_d"), above("stoch_k", 80.0)],
    ))
}

fn exit_reasoner() -> ExitReasoner {
    ExitReasoner::new()
        .rule("high_profit_extreme_rsi", |s| {
            s.profit() > 0.15 && s.value("rsi").is_some_and(|r| r > 85.0)
        })
        .rule("macd_histogram_declining", |s| {
            let hist = |n| s.row.shifted("macdhist", n);
            let declining = match (hist(0), hist(1), hist(2)) {
                (Some(h0), Some(h1), Some(h2)) => h0 < h1 && h1 < h2,
                _ => false,
            };
            declining && s.profit() > 0.05
        })
}

impl Strategy for MacdEma {
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
        let close = Source::Close.extract(candles);

        let (fast, slow, signal) = (p.macd_fast, p.macd_slow, p.macd_signal);
        let macd = Macd::line(fast, slow, signal).compute(candles);
        let macdsignal = Macd::signal(fast, slow, signal).compute(candles);
        let macdhist = Macd::histogram(fast, slow, signal).compute(candles);
        let cross_above = crossed_above_series(&macd, &macdsignal);
        let cross_below = crossed_below_series(&macd, &macdsignal);

        let ema_short = Ema::new(p.ema_short).compute(candles);
        let ema_medium = Ema::new(p.ema_medium).compute(candles);
        let ema_long = Ema::new(p.ema_long).compute(candles);
        let uptrend = stacked(
            &compare_series(&ema_short, &ema_medium, |s, m| s > m),
            &compare_series(&ema_medium, &ema_long, |m, l| m > l),
            &compare_series(&close, &ema_short, |c, s| c > s),
        );
        let downtrend = stacked(
            &compare_series(&ema_short, &ema_medium, |s, m| s < m),
            &compare_series(&ema_medium, &ema_long, |m, l| m < l),
            &compare_series(&close, &ema_short, |c, s| c < s),
        );

        let volume = Source::Volume.extract(candles);
        let volume_sma = Sma::of(20, Source::Volume).compute(candles);
        let volume_ratio = ratio_series(&volume, &volume_sma);

        let bb_upper = Bollinger::upper(20, 2.0).compute(candles);
        let bb_lower = Bollinger::lower(20, 2.0).compute(candles);
        let bb_percent = percent_b_series(&close, &bb_upper, &bb_lower);

        let rsi = Rsi::new(p.rsi_period).compute(candles);
        let adx = Adx::new(14).compute(candles);
        let stoch_k = Stochastic::k(5, 3, 3).compute(candles);
        let stoch_d = Stochastic::d(5, 3, 3).compute(candles);
        let atr = Atr::new(14).compute(candles);

        frame.insert_numeric("macd", macd)?;
        frame.insert_numeric("macdsignal", macdsignal)?;
        frame.insert_numeric("macdhist", macdhist)?;
        frame.insert_flag("macd_cross_above", cross_above)?;
        frame.insert_flag("macd_cross_below", cross_below)?;
        frame.insert_numeric("ema_short", ema_short)?;
        frame.insert_numeric("ema_medium", ema_medium)?;
        frame.insert_numeric("ema_long", ema_long)?;
        frame.insert_flag("uptrend", uptrend)?;
        frame.insert_flag("downtrend", downtrend)?;
        frame.insert_numeric("rsi", rsi)?;
        frame.insert_numeric("volume_sma", volume_sma)?;
        frame.insert_numeric("volume_ratio", volume_ratio)?;
        frame.insert_numeric("adx", adx)?;
        frame.insert_numeric("bb_percent", bb_percent)?;
        frame.insert_numeric("stoch_k", stoch_k)?;
        frame.insert_numeric("stoch_d", stoch_d)?;
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

/// Row-wise three-way AND with tri-state semantics.
fn stacked(a: &[Option<bool>], b: &[Option<bool>], c: &[Option<bool>]) -> Vec<Option<bool>> {
    use crate::components::predicate::all_of;
    a.iter()
        .zip(b)
        .zip(c)
        .map(|((x, y), z)| all_of([*x, *y, *z]))
        .collect()
}
