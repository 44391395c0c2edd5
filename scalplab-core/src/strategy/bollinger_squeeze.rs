//! Bollinger/Keltner squeeze breakout scalper on 5m candles.
//!
//! Waits for a volatility squeeze (narrow Bollinger bands, or Bollinger bands
//! inside the Keltner channel) and enters on the first close above the upper
//! band with momentum, volume and trend-strength confirmation.

use crate::components::exit::ExitReasoner;
use crate::components::frame::{
    band_width_series, compare_series, crossed_above_series, crossed_below_series,
    percent_b_series, ratio_series, CandleFrame, FrameError,
};
use crate::components::indicator::{Indicator, Source};
use crate::components::predicate::{
    above, all, below, custom, flag, gt, lt, Conjunction, SignalRule,
};
use crate::components::stoploss::AtrStoploss;
use crate::domain::Timeframe;
use crate::indicators::{Adx, Atr, Bollinger, Ema, Keltner, KeltnerBasis, Macd, Rsi, Sma};
use crate::params::{ParamError, ParamSet, ParamSpace, Parameter};
use crate::risk::StaticRisk;

use super::{risk_block, Strategy};

pub const NAME: &str = "bollinger_squeeze";

const STOPLOSS: f64 = -0.025;
const ATR_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSqueezeParams {
    pub bb_period: usize,
    pub bb_std: f64,
    pub rsi_period: usize,
    pub rsi_buy_threshold: f64,
    pub rsi_sell_threshold: f64,
    pub volume_spike: f64,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub squeeze_threshold: f64,
}

impl BollingerSqueezeParams {
    pub fn declare() -> ParamSet {
        use ParamSpace::{Buy, Sell};
        ParamSet::new(vec![
            Parameter::int("bb_period", 15, 25, 20, Buy),
            Parameter::decimal("bb_std", 1.8, 2.2, 2.0, Buy),
            Parameter::int("rsi_period", 10, 16, 14, Buy),
            Parameter::int("rsi_buy_threshold", 45, 55, 50, Buy),
            Parameter::int("rsi_sell_threshold", 45, 55, 50, Sell),
            Parameter::decimal("volume_spike", 1.8, 3.0, 2.0, Buy),
            Parameter::int("adx_period", 12, 18, 14, Buy),
            Parameter::int("adx_threshold", 18, 25, 20, Buy),
            Parameter::decimal("squeeze_threshold", 0.01, 0.03, 0.02, Buy),
        ])
    }

    pub fn from_set(set: &ParamSet) -> Result<Self, ParamError> {
        Ok(Self {
            bb_period: set.usize("bb_period")?,
            bb_std: set.decimal("bb_std")?,
            rsi_period: set.usize("rsi_period")?,
            rsi_buy_threshold: set.decimal("rsi_buy_threshold")?,
            rsi_sell_threshold: set.decimal("rsi_sell_threshold")?,
            volume_spike: set.decimal("volume_spike")?,
            adx_period: set.usize("adx_period")?,
            adx_threshold: set.decimal("adx_threshold")?,
            squeeze_threshold: set.decimal("squeeze_threshold")?,
        })
    }
}

impl Default for BollingerSqueezeParams {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_std: 2.0,
            rsi_period: 14,
            rsi_buy_threshold: 50.0,
            rsi_sell_threshold: 50.0,
            volume_spike: 2.0,
            adx_period: 14,
            adx_threshold: 20.0,
            squeeze_threshold: 0.02,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BollingerSqueeze {
    set: ParamSet,
    params: BollingerSqueezeParams,
    risk: StaticRisk,
    entry: SignalRule,
    exit: SignalRule,
    stoploss: AtrStoploss,
    reasoner: ExitReasoner,
}

impl BollingerSqueeze {
    pub fn new() -> Self {
        Self::from_parts(
            BollingerSqueezeParams::declare(),
            BollingerSqueezeParams::default(),
        )
    }

    pub fn with_params(set: ParamSet) -> Result<Self, ParamError> {
        let params = BollingerSqueezeParams::from_set(&set)?;
        Ok(Self::from_parts(set, params))
    }

    fn from_parts(set: ParamSet, params: BollingerSqueezeParams) -> Self {
        Self {
            entry: entry_rule(&params),
            exit: exit_rule(&params),
            risk: risk_block(
                Timeframe::M5,
                STOPLOSS,
                &[(0, 0.04), (5, 0.025), (10, 0.02), (20, 0.015), (30, 0.01)],
                (0.008, 0.015),
                40,
            ),
            stoploss: AtrStoploss::new("atr", ATR_MULTIPLIER, STOPLOSS),
            reasoner: exit_reasoner(),
            params,
            set,
        }
    }

    pub fn params(&self) -> &BollingerSqueezeParams {
        &self.params
    }
}

impl Default for BollingerSqueeze {
    fn default() -> Self {
        Self::new()
    }
}

/// A close above the upper band puts `bb_percent` above 1, so together with
/// the `bb_percent < 0.95` filter this rule never holds on computed columns.
/// Kept as published.
fn entry_rule(p: &BollingerSqueezeParams) -> SignalRule {
    SignalRule::new(Conjunction::new(
        "squeeze_breakout",
        vec![
            flag("recent_squeeze"),
            flag("bb_break_up"),
            above("rsi", p.rsi_buy_threshold),
            above("volume_ratio", p.volume_spike),
            above("adx", p.adx_threshold),
            above("macdhist", 0.0),
            gt("close", "ema_fast"),
            below("bb_percent", 0.95),
        ],
    ))
}

fn exit_rule(p: &BollingerSqueezeParams) -> SignalRule {
    SignalRule::new(Conjunction::new("bb_break_down", vec![flag("bb_break_down")])).or(
        Conjunction::new(
            "momentum_lost",
            vec![
                below("rsi", p.rsi_sell_threshold),
                all(
                    "back_inside_bands",
                    vec![above("bb_percent", 0.8), lt("close", "bb_upper")],
                ),
                all(
                    "macd_negative",
                    vec![lt("macd", "macdsignal"), below("macdhist", 0.0)],
                ),
                custom("volume_fading", |row| {
                    Some(row.value("volume_ratio")? < 1.0 && row.shifted("volume_ratio", 1)? > 2.0)
                }),
                lt("close", "ema_fast"),
            ],
        ),
    )
}

fn exit_reasoner() -> ExitReasoner {
    ExitReasoner::new()
        .rule("high_profit_exit", |s| s.profit() > 0.03)
        .rule("squeeze_return_exit", |s| {
            s.profit() > 0.01 && s.flag("bb_squeeze")
        })
        .rule("rsi_extreme_exit", |s| {
            s.profit() > 0.008 && s.value("rsi").is_some_and(|r| r > 75.0)
        })
}

/// Any of: squeeze now or in the two previous rows, true squeeze now or on
/// the previous row. Undefined terms count as not holding.
fn recent_squeeze(bb_squeeze: &[Option<bool>], true_squeeze: &[Option<bool>]) -> Vec<Option<bool>> {
    let held = |col: &[Option<bool>], i: usize, back: usize| {
        i.checked_sub(back).and_then(|j| col[j]) == Some(true)
    };
    (0..bb_squeeze.len())
        .map(|i| {
            Some(
                held(bb_squeeze, i, 0)
                    || held(bb_squeeze, i, 1)
                    || held(bb_squeeze, i, 2)
                    || held(true_squeeze, i, 0)
                    || held(true_squeeze, i, 1),
            )
        })
        .collect()
}

impl Strategy for BollingerSqueeze {
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
        let bb_width = band_width_series(&bb_upper, &bb_lower, &bb_middle);
        let threshold = p.squeeze_threshold;
        let bb_squeeze: Vec<Option<bool>> = bb_width
            .iter()
            .map(|w| (!w.is_nan()).then(|| *w < threshold))
            .collect();
        let bb_percent = percent_b_series(&close, &bb_upper, &bb_lower);
        let bb_break_up = crossed_above_series(&close, &bb_upper);
        let bb_break_down = crossed_below_series(&close, &bb_lower);

        // Keltner channel centred on the Bollinger middle band
        let kc_basis = KeltnerBasis::Sma(p.bb_period);
        let kc_upper = Keltner::upper(kc_basis, 20, 2.0).compute(candles);
        let kc_lower = Keltner::lower(kc_basis, 20, 2.0).compute(candles);
        let inside_upper = compare_series(&bb_upper, &kc_upper, |b, k| b < k);
        let inside_lower = compare_series(&bb_lower, &kc_lower, |b, k| b > k);
        let true_squeeze: Vec<Option<bool>> = inside_upper
            .iter()
            .zip(&inside_lower)
            .map(|(u, l)| Some((*u)? && (*l)?))
            .collect();
        let recent = recent_squeeze(&bb_squeeze, &true_squeeze);

        let volume = Source::Volume.extract(candles);
        let volume_sma = Sma::of(20, Source::Volume).compute(candles);
        let volume_ratio = ratio_series(&volume, &volume_sma);

        let rsi = Rsi::new(p.rsi_period).compute(candles);
        let adx = Adx::new(p.adx_period).compute(candles);
        let macd = Macd::line(12, 26, 9).compute(candles);
        let macdsignal = Macd::signal(12, 26, 9).compute(candles);
        let macdhist = Macd::histogram(12, 26, 9).compute(candles);
        let ema_fast = Ema::new(9).compute(candles);
        let atr = Atr::new(14).compute(candles);

        frame.insert_numeric("bb_upper", bb_upper)?;
        frame.insert_numeric("bb_middle", bb_middle)?;
        frame.insert_numeric("bb_lower", bb_lower)?;
        frame.insert_numeric("bb_width", bb_width)?;
        frame.insert_flag("bb_squeeze", bb_squeeze)?;
        frame.insert_numeric("bb_percent", bb_percent)?;
        frame.insert_flag("bb_break_up", bb_break_up)?;
        frame.insert_flag("bb_break_down", bb_break_down)?;
        frame.insert_numeric("kc_upper", kc_upper)?;
        frame.insert_numeric("kc_lower", kc_lower)?;
        frame.insert_flag("true_squeeze", true_squeeze)?;
        frame.insert_flag("recent_squeeze", recent)?;
        frame.insert_numeric("volume_sma", volume_sma)?;
        frame.insert_numeric("volume_ratio", volume_ratio)?;
        frame.insert_numeric("rsi", rsi)?;
        frame.insert_numeric("adx", adx)?;
        frame.insert_numeric("macd", macd)?;
        frame.insert_numeric("macdsignal", macdsignal)?;
        frame.insert_numeric("macdhist", macdhist)?;
        frame.insert_numeric("ema_fast", ema_fast)?;
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
