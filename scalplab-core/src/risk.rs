//! Static risk configuration: stop-loss floor, ROI schedule, trailing stop.
//!
//! These values are handed to the framework unchanged; the helpers here only
//! answer lookups (which ROI step applies, whether trailing is active).

use std::collections::BTreeMap;

use chrono::Duration;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::Timeframe;

/// Errors raised while building static risk config.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskError {
    #[error("ROI step key '{0}' is not a whole number of minutes")]
    InvalidRoiKey(String),

    #[error("ROI schedule is empty")]
    EmptyRoi,

    #[error("stop loss must be negative, got {0}")]
    NonNegativeStoploss(f64),
}

/// One ROI step: after `minutes` of holding, exit once profit exceeds `roi`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiStep {
    pub minutes: u32,
    pub roi: f64,
}

/// Minimal-ROI schedule ordered by minute threshold.
///
/// Serializes as a `{ "minutes": roi }` map, the shape the framework reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>")]
pub struct RoiSchedule {
    steps: Vec<RoiStep>,
}

impl RoiSchedule {
    pub fn new(steps: &[(u32, f64)]) -> Self {
        let mut steps: Vec<RoiStep> = steps
            .iter()
            .map(|&(minutes, roi)| RoiStep { minutes, roi })
            .collect();
        steps.sort_by_key(|s| s.minutes);
        steps.dedup_by_key(|s| s.minutes);
        Self { steps }
    }

    pub fn steps(&self) -> &[RoiStep] {
        &self.steps
    }

    /// ROI target for a trade held `elapsed`: the step with the largest minute
    /// threshold not exceeding the elapsed whole minutes.
    pub fn threshold_at(&self, elapsed: Duration) -> Option<f64> {
        let minutes = elapsed.num_minutes();
        self.steps
            .iter()
            .rev()
            .find(|s| i64::from(s.minutes) <= minutes)
            .map(|s| s.roi)
    }

    /// Whether `profit` beats the ROI target at `elapsed`.
    pub fn is_reached(&self, elapsed: Duration, profit: f64) -> bool {
        self.threshold_at(elapsed).is_some_and(|roi| profit > roi)
    }
}

impl TryFrom<BTreeMap<String, f64>> for RoiSchedule {
    type Error = RiskError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let steps = map
            .into_iter()
            .map(|(k, roi)| {
                k.trim()
                    .parse::<u32>()
                    .map(|m| (m, roi))
                    .map_err(|_| RiskError::InvalidRoiKey(k))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if steps.is_empty() {
            return Err(RiskError::EmptyRoi);
        }
        Ok(Self::new(&steps))
    }
}

impl Serialize for RoiSchedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.steps.len()))?;
        for step in &self.steps {
            map.serialize_entry(&step.minutes.to_string(), &step.roi)?;
        }
        map.end()
    }
}

/// Trailing-stop settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    pub enabled: bool,
    /// Trailing distance once active (fraction below the high-water rate).
    pub positive: f64,
    /// Profit needed before `positive` takes over.
    pub positive_offset: f64,
    /// Trail only after the offset has been reached.
    pub only_offset_is_reached: bool,
}

impl TrailingStop {
    pub fn new(positive: f64, positive_offset: f64) -> Self {
        Self {
            enabled: true,
            positive,
            positive_offset,
            only_offset_is_reached: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            positive: 0.0,
            positive_offset: 0.0,
            only_offset_is_reached: false,
        }
    }

    /// Whether the positive trailing distance applies at `profit`.
    pub fn is_active(&self, profit: f64) -> bool {
        self.enabled && (!self.only_offset_is_reached || profit > self.positive_offset)
    }

    /// Trailing stop rate for a long trade that has peaked at `high_water`.
    pub fn stop_rate(&self, high_water: f64, profit: f64) -> Option<f64> {
        self.is_active(profit)
            .then(|| high_water * (1.0 - self.positive))
    }
}

/// Stops may tighten, never loosen: for longs the stop rate only rises.
pub fn ratchet(current: Option<f64>, proposed: f64) -> f64 {
    match current {
        Some(c) => c.max(proposed),
        None => proposed,
    }
}

/// Static risk block every strategy declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticRisk {
    pub timeframe: Timeframe,
    /// Static stop loss (negative fraction); also the dynamic-stop floor.
    pub stoploss: f64,
    pub minimal_roi: RoiSchedule,
    pub trailing: TrailingStop,
    pub startup_candle_count: usize,
    pub use_exit_signal: bool,
    pub exit_profit_only: bool,
    pub ignore_roi_if_entry_signal: bool,
    pub leverage: f64,
}

impl StaticRisk {
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.stoploss >= 0.0 {
            return Err(RiskError::NonNegativeStoploss(self.stoploss));
        }
        if self.minimal_roi.steps.is_empty() {
            return Err(RiskError::EmptyRoi);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roi() -> RoiSchedule {
        RoiSchedule::new(&[(0, 0.03), (3, 0.02), (5, 0.015), (10, 0.01), (15, 0.005)])
    }

    #[test]
    fn roi_picks_largest_threshold_not_exceeding_elapsed() {
        let roi = roi();
        assert_eq!(roi.threshold_at(Duration::seconds(30)), Some(0.03));
        assert_eq!(roi.threshold_at(Duration::minutes(3)), Some(0.02));
        assert_eq!(roi.threshold_at(Duration::minutes(9)), Some(0.015));
        assert_eq!(roi.threshold_at(Duration::minutes(600)), Some(0.005));
        assert_eq!(roi.threshold_at(Duration::minutes(-1)), None);
    }

    #[test]
    fn roi_reached_is_strict() {
        let roi = roi();
        assert!(!roi.is_reached(Duration::minutes(4), 0.02));
        assert!(roi.is_reached(Duration::minutes(4), 0.021));
    }

    #[test]
    fn roi_serializes_as_minute_map_in_order() {
        let json = serde_json::to_string(&roi()).unwrap();
        assert_eq!(
            json,
            r#"{"0":0.03,"3":0.02,"5":0.015,"10":0.01,"15":0.005}"#
        );
        let back: RoiSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, roi());
    }

    #[test]
    fn roi_rejects_bad_keys() {
        let bad: Result<RoiSchedule, _> = serde_json::from_str(r#"{"soon": 0.1}"#);
        assert!(bad.is_err());
        let empty: Result<RoiSchedule, _> = serde_json::from_str("{}");
        assert!(empty.is_err());
    }

    #[test]
    fn trailing_waits_for_offset() {
        let t = TrailingStop::new(0.005, 0.01);
        assert!(!t.is_active(0.01));
        assert!(t.is_active(0.011));
        assert_eq!(t.stop_rate(100.0, 0.0), None);
        let stop = t.stop_rate(100.0, 0.02).unwrap();
        assert!((stop - 99.5).abs() < 1e-9);
        assert!(!TrailingStop::disabled().is_active(1.0));
    }

    #[test]
    fn validate_rejects_bad_risk() {
        let mut risk = StaticRisk {
            timeframe: Timeframe::M1,
            stoploss: -0.02,
            minimal_roi: roi(),
            trailing: TrailingStop::new(0.005, 0.01),
            startup_candle_count: 30,
            use_exit_signal: true,
            exit_profit_only: false,
            ignore_roi_if_entry_signal: false,
            leverage: 10.0,
        };
        assert_eq!(risk.validate(), Ok(()));
        risk.minimal_roi = RoiSchedule::new(&[]);
        assert_eq!(risk.validate(), Err(RiskError::EmptyRoi));
        risk.stoploss = 0.01;
        assert_eq!(risk.validate(), Err(RiskError::NonNegativeStoploss(0.01)));
    }

    #[test]
    fn ratchet_never_loosens() {
        assert_eq!(ratchet(None, 95.0), 95.0);
        assert_eq!(ratchet(Some(95.0), 100.0), 100.0);
        assert_eq!(ratchet(Some(100.0), 90.0), 100.0);
    }
}
