//! Tunable strategy parameters with declared search ranges.
//!
//! A `ParamSet` is the explicit, ordered declaration of every tunable a
//! strategy exposes to an external optimizer. Values are fixed once the
//! strategy is constructed; overrides are validated against the declared range.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors raised while reading or overriding parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),

    #[error("parameter '{name}' = {value} is outside [{low}, {high}]")]
    OutOfRange {
        name: String,
        value: ParamValue,
        low: ParamValue,
        high: ParamValue,
    },

    #[error("parameter '{name}' expects {expected}, got {value}")]
    WrongKind {
        name: String,
        expected: &'static str,
        value: ParamValue,
    },
}

/// Which side of the strategy a parameter tunes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSpace {
    /// Entry side.
    Buy,
    /// Exit side.
    Sell,
}

impl fmt::Display for ParamSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSpace::Buy => f.write_str("buy"),
            ParamSpace::Sell => f.write_str("sell"),
        }
    }
}

/// Inclusive search range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParamRange {
    Int { low: i64, high: i64 },
    Decimal { low: f64, high: f64, decimals: u32 },
}

/// A concrete parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Decimal(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Int(v) => v as f64,
            ParamValue::Decimal(v) => v,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Decimal(v) => write!(f, "{v}"),
        }
    }
}

impl std::str::FromStr for ParamValue {
    type Err = std::num::ParseFloatError;

    /// Integers parse as `Int`, everything else as `Decimal`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.parse::<i64>() {
            Ok(v) => Ok(ParamValue::Int(v)),
            Err(_) => s.parse::<f64>().map(ParamValue::Decimal),
        }
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// One declared tunable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub space: ParamSpace,
    pub range: ParamRange,
    pub default: ParamValue,
    pub value: ParamValue,
}

impl Parameter {
    pub fn int(name: &str, low: i64, high: i64, default: i64, space: ParamSpace) -> Self {
        assert!(low <= default && default <= high, "default outside range for {name}");
        Self {
            name: name.to_string(),
            space,
            range: ParamRange::Int { low, high },
            default: ParamValue::Int(default),
            value: ParamValue::Int(default),
        }
    }

    /// Decimal parameter with the usual three-decimal precision.
    pub fn decimal(name: &str, low: f64, high: f64, default: f64, space: ParamSpace) -> Self {
        Self::decimal_with_precision(name, low, high, default, 3, space)
    }

    pub fn decimal_with_precision(
        name: &str,
        low: f64,
        high: f64,
        default: f64,
        decimals: u32,
        space: ParamSpace,
    ) -> Self {
        assert!(low <= default && default <= high, "default outside range for {name}");
        Self {
            name: name.to_string(),
            space,
            range: ParamRange::Decimal {
                low,
                high,
                decimals,
            },
            default: ParamValue::Decimal(default),
            value: ParamValue::Decimal(default),
        }
    }

    /// Validate `value` against the declared range and kind.
    ///
    /// Decimals are rounded to the declared precision; an integer is accepted
    /// for a decimal parameter, and a whole-number decimal for an integer one.
    pub fn validate(&self, value: ParamValue) -> Result<ParamValue, ParamError> {
        match self.range {
            ParamRange::Int { low, high } => {
                let v = match value {
                    ParamValue::Int(v) => v,
                    ParamValue::Decimal(d) if d.fract() == 0.0 && d.is_finite() => d as i64,
                    ParamValue::Decimal(_) => {
                        return Err(ParamError::WrongKind {
                            name: self.name.clone(),
                            expected: "an integer",
                            value,
                        })
                    }
                };
                if v < low || v > high {
                    return Err(ParamError::OutOfRange {
                        name: self.name.clone(),
                        value,
                        low: ParamValue::Int(low),
                        high: ParamValue::Int(high),
                    });
                }
                Ok(ParamValue::Int(v))
            }
            ParamRange::Decimal {
                low,
                high,
                decimals,
            } => {
                let v = round_to(value.as_f64(), decimals);
                if !v.is_finite() || v < low || v > high {
                    return Err(ParamError::OutOfRange {
                        name: self.name.clone(),
                        value,
                        low: ParamValue::Decimal(low),
                        high: ParamValue::Decimal(high),
                    });
                }
                Ok(ParamValue::Decimal(v))
            }
        }
    }
}

/// Ordered parameter declarations for one strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet {
    params: Vec<Parameter>,
}

impl ParamSet {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self { params }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&Parameter, ParamError> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ParamError::Unknown(name.to_string()))
    }

    pub fn in_space(&self, space: ParamSpace) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(move |p| p.space == space)
    }

    pub fn int(&self, name: &str) -> Result<i64, ParamError> {
        let p = self.get(name)?;
        match p.value {
            ParamValue::Int(v) => Ok(v),
            ParamValue::Decimal(_) => Err(ParamError::WrongKind {
                name: name.to_string(),
                expected: "an integer",
                value: p.value,
            }),
        }
    }

    /// Integer parameter used as a period or count.
    pub fn usize(&self, name: &str) -> Result<usize, ParamError> {
        let v = self.int(name)?;
        usize::try_from(v).map_err(|_| ParamError::OutOfRange {
            name: name.to_string(),
            value: ParamValue::Int(v),
            low: ParamValue::Int(0),
            high: ParamValue::Int(i64::MAX),
        })
    }

    pub fn decimal(&self, name: &str) -> Result<f64, ParamError> {
        Ok(self.get(name)?.value.as_f64())
    }

    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        let param = self
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| ParamError::Unknown(name.to_string()))?;
        param.value = param.validate(value)?;
        Ok(())
    }

    /// Apply every override or none: the set is left untouched on error.
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, ParamValue>,
    ) -> Result<(), ParamError> {
        let mut next = self.clone();
        for (name, value) in overrides {
            next.set(name, *value)?;
        }
        *self = next;
        Ok(())
    }

    /// Current values keyed by name.
    pub fn values(&self) -> BTreeMap<String, ParamValue> {
        self.params
            .iter()
            .map(|p| (p.name.clone(), p.value))
            .collect()
    }
}
