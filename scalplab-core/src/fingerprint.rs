//! Deterministic identification of parameter sets and candle datasets.
//!
//! - `ParamFingerprint`: BLAKE3 of strategy name + sorted `name=value` pairs.
//! - `DatasetHash`: BLAKE3 of the candle bytes, so two runs over the same
//!   history can be matched without shipping the data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Candle;
use crate::params::ParamValue;

/// Exact identity of a strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamFingerprint(pub String);

impl ParamFingerprint {
    /// `values` is a `BTreeMap`, so the hashed order is canonical.
    pub fn compute(strategy: &str, values: &BTreeMap<String, ParamValue>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(strategy.as_bytes());
        hasher.update(b"\0");
        for (name, value) in values {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.to_string().as_bytes());
            hasher.update(b";");
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 16 hex chars, for logs and file names.
    pub fn short(&self) -> &str {
        &self.0[..16.min(self.0.len())]
    }
}

impl fmt::Display for ParamFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash of a candle series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of(candles: &[Candle]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for c in candles {
            hasher.update(&c.timestamp.and_utc().timestamp_millis().to_le_bytes());
            for v in [c.open, c.high, c.low, c.close, c.volume] {
                hasher.update(&v.to_bits().to_le_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
