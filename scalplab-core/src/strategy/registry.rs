//! Name-based strategy construction.

use std::collections::BTreeMap;

use crate::params::ParamValue;

use super::{
    bollinger_squeeze, ema_scalping, macd_ema, rsi_bb, BollingerSqueeze, EmaScalping, MacdEma,
    RsiBb, Strategy, StrategyError,
};

/// Every shipped strategy, in listing order.
pub const STRATEGY_NAMES: &[&str] = &[
    ema_scalping::NAME,
    bollinger_squeeze::NAME,
    macd_ema::NAME,
    rsi_bb::NAME,
];

/// Build a strategy by name, applying parameter overrides on top of its
/// declared defaults. Overrides are validated against the declared ranges.
pub fn create_strategy(
    name: &str,
    overrides: &BTreeMap<String, ParamValue>,
) -> Result<Box<dyn Strategy>, StrategyError> {
    let strategy: Box<dyn Strategy> = match name {
        ema_scalping::NAME => {
            let mut set = ema_scalping::EmaScalpingParams::declare();
            set.apply_overrides(overrides)?;
            Box::new(EmaScalping::with_params(set)?)
        }
        bollinger_squeeze::NAME => {
            let mut set = bollinger_squeeze::BollingerSqueezeParams::declare();
            set.apply_overrides(overrides)?;
            Box::new(BollingerSqueeze::with_params(set)?)
        }
        macd_ema::NAME => {
            let mut set = macd_ema::MacdEmaParams::declare();
            set.apply_overrides(overrides)?;
            Box::new(MacdEma::with_params(set)?)
        }
        rsi_bb::NAME => {
            let mut set = rsi_bb::RsiBbParams::declare();
            set.apply_overrides(overrides)?;
            Box::new(RsiBb::with_params(set)?)
        }
        other => return Err(StrategyError::UnknownStrategy(other.to_string())),
    };
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamError;

    #[test]
    fn every_listed_name_builds() {
        for name in STRATEGY_NAMES {
            let s = create_strategy(name, &BTreeMap::new()).unwrap();
            assert_eq!(s.name(), *name);
            assert_eq!(s.risk().leverage, 10.0);
            assert!(s.risk().validate().is_ok());
        }
    }

    #[test]
    fn unknown_name_lists_choices() {
        let err = create_strategy("grid_bot", &BTreeMap::new()).err().unwrap();
        assert_eq!(err, StrategyError::UnknownStrategy("grid_bot".into()));
        assert_eq!(
            err.to_string(),
            "unknown strategy 'grid_bot' \
             (available: ema_scalping, bollinger_squeeze, macd_ema, rsi_bb)"
        );
    }

    #[test]
    fn overrides_are_range_checked() {
        let mut overrides = BTreeMap::new();
        overrides.insert("ema_fast".to_string(), ParamValue::Int(6));
        let s = create_strategy("ema_scalping", &overrides).unwrap();
        assert_eq!(s.parameters().int("ema_fast").unwrap(), 6);

        overrides.insert("ema_fast".to_string(), ParamValue::Int(20));
        let err = create_strategy("ema_scalping", &overrides).err().unwrap();
        assert!(matches!(
            err,
            StrategyError::Param(ParamError::OutOfRange { .. })
        ));

        let mut unknown = BTreeMap::new();
        unknown.insert("bb_period".to_string(), ParamValue::Int(20));
        let err = create_strategy("ema_scalping", &unknown).err().unwrap();
        assert_eq!(
            err,
            StrategyError::Param(ParamError::Unknown("bb_period".into()))
        );
    }
}
