//! RSI + Bollinger mean reversion on 1h candles.
//!
//! Buys oversold RSI near the lower band with volume and trend-strength
//! confirmation; sells overbought RSI near the upper band or on negative MACD.
//! Uses only the static stop and ROI table.

use crate::components::frame::{band_width_series, percent_b_series, CandleFrame, FrameError};
use crate::components::indicator::{Indicator, Source};
use crate::components::predicate::{
    above, any, below, custom, gt, lt, Conjunction, SignalRule,
};
use crate::domain::Timeframe;
use crate::indicators::{Adx, Bollinger, Ema, Macd, Rsi, Sma};
use crate::params::{ParamError, ParamSet, ParamSpace, Parameter};
use crate::risk::StaticRisk;

use super::{risk_block, Strategy};

pub const NAME: &str = "rsi_bb";

const STOPLOSS: f64 = -0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct RsiBbParams {
    pub rsi_period: usize,
    pub rsi_buy_threshold: f64,
    pub rsi_sell_threshold: f64,
    pub bb_period: usize,
    pub bb_std: f64,
    pub volume_factor: f64,
}

impl RsiBbParams {
    pub fn declare() -> ParamSet {
        use ParamSpace::{Buy, Sell};
        ParamSet::new(vec![
            Parameter::int("rsi_period", 10, 20, 14, Buy),
            Parameter::int("rsi_buy_threshold", 25, 35, 30, Buy),
            Parameter::int("rsi_sell_threshold", 65, 75, 70, Sell),
            Parameter::int("bb_period", 15, 25, 20, Buy),
            Parameter::decimal("bb_std", 1.5, 2.5, 2.0, Buy),
            Parameter::decimal("volume_factor", 1.0, 2.0, 1.5, Buy),
        ])
    }

    pub fn from_set(set: &ParamSet) -> Result<Self, ParamError> {
        Ok(Self {
            rsi_period: set.usize("rsi_period")?,
            rsi_buy_threshold: set.decimal("rsi_buy_threshold")?,
            rsi_sell_threshold: set.decimal("rsi_sell_threshold")?,
            bb_period: set.usize("bb_period")?,
            bb_std: set.decimal("bb_std")?,
            volume_factor: set.decimal("volume_factor")?,
        })
    }
}

impl Default for RsiBbParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_buy_threshold: 30.0,
            rsi_sell_threshold: 70.0,
            bb_period: 20,
            bb_std: 2.0,
            volume_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RsiBb {
    set: ParamSet,
    params: RsiBbParams,
    risk: StaticRisk,
    entry: SignalRule,
    exit: SignalRule,
}

impl RsiBb {
    pub fn new() -> Self {
        Self::from_parts(RsiBbParams::declare(), RsiBbParams::default())
    }

    pub fn with_params(set: ParamSet) -> Result<Self, ParamError> {
        let params = RsiBbParams::from_set(&set)?;
        Ok(Self::from_parts(set, params))
    }

    fn from_parts(set: ParamSet, params: RsiBbParams) -> Self {
        Self {
            entry: entry_rule(&params),
            exit: exit_rule(&params),
            risk: risk_block(
                Timeframe::H1,
                STOPLOSS,
                &[(0, 0.15), (60, 0.10), (120, 0.05), (180, 0.02)],
                (0.01, 0.02),
                30,
            ),
            params,
            set,
        }
    }

    pub fn params(&self) -> &RsiBbParams {
        &self.params
    }
}

impl Default for RsiBb {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_rule(p: &RsiBbParams) -> SignalRule {
    let volume_factor = p.volume_factor;
    SignalRule::new(Conjunction::new(
        "rsi_oversold",
        vec![
            below("rsi", p.rsi_buy_threshold),
            any(
                "near_lower_band",
                vec![
                    custom("close <= bb_lower * 1.02", |row| {
                        Some(row.value("close")? <= row.value("bb_lower")? * 1.02)
                    }),
                    below("bb_percent", 0.1),
                ],
            ),
            custom(format!("volume > volume_sma * {volume_factor}"), move |row| {
                Some(row.value("volume")? > row.value("volume_sma")? * volume_factor)
            }),
            any(
                "macd_supportive",
                vec![gt("macd", "macdsignal"), above("macdhist", 0.0)],
            ),
            above("adx", 20.0),
            above("bb_width", 0.02),
        ],
    ))
}

fn exit_rule(p: &RsiBbParams) -> SignalRule {
    SignalRule::new(Conjunction::new(
        "rsi_overbought",
        vec![
            above("rsi", p.rsi_sell_threshold),
            any(
                "near_upper_band",
                vec![
                    custom("close >= bb_upper * 0.98", |row| {
                        Some(row.value("close")? >= row.value("bb_upper")? * 0.98)
                    }),
                    above("bb_percent", 0.9),
                ],
            ),
        ],
    ))
    .or(Conjunction::new(
        "macd_negative",
        vec![lt("macd", "macdsignal"), below("macdhist", 0.0)],
    ))
}

impl Strategy for RsiBb {
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

        let bb_upper = Bollinger::upper(p.bb_period, p.bb_std).compute(candles);
        let bb_middle = Bollinger::middle(p.bb_period, p.bb_std).compute(candles);
        let bb_lower = Bollinger::lower(p.bb_period, p.bb_std).compute(candles);
        let bb_percent = percent_b_series(&close, &bb_upper, &bb_lower);
        let bb_width = band_width_series(&bb_upper, &bb_lower, &bb_middle);

        let rsi = Rsi::new(p.rsi_period).compute(candles);
        let volume_sma = Sma::of(20, Source::Volume).compute(candles);
        let ema_short = Ema::new(9).compute(candles);
        let ema_long = Ema::new(21).compute(candles);
        let macd = Macd::line(12, 26, 9).compute(candles);
        let macdsignal = Macd::signal(12, 26, 9).compute(candles);
        let macdhist = Macd::histogram(12, 26, 9).compute(candles);
        let adx = Adx::new(14).compute(candles);

        frame.insert_numeric("rsi", rsi)?;
        frame.insert_numeric("volume_sma", volume_sma)?;
        frame.insert_numeric("ema_short", ema_short)?;
        frame.insert_numeric("ema_long", ema_long)?;
        frame.insert_numeric("macd", macd)?;
        frame.insert_numeric("macdsignal", macdsignal)?;
        frame.insert_numeric("macdhist", macdhist)?;
        frame.insert_numeric("adx", adx)?;
        frame.insert_numeric("bb_upper", bb_upper)?;
        frame.insert_numeric("bb_middle", bb_middle)?;
        frame.insert_numeric("bb_lower", bb_lower)?;
        frame.insert_numeric("bb_percent", bb_percent)?;
        frame.insert_numeric("bb_width", bb_width)?;
        Ok(())
    }

    fn entry_rule(&self) -> &SignalRule {
        &self.entry
    }

    fn exit_rule(&self) -> &SignalRule {
        &self.exit
    }
}
