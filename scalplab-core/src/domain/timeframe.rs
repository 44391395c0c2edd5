//! Candle interval ("1m", "5m", "1h", "4h", "1d", ...).

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Fixed candle interval, stored in minutes.
///
/// Serializes as the exchange-style string (`"5m"`, `"4h"`) so descriptors and
/// run configs read the same way the framework writes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    minutes: u32,
}

impl Timeframe {
    pub const M1: Timeframe = Timeframe { minutes: 1 };
    pub const M5: Timeframe = Timeframe { minutes: 5 };
    pub const H1: Timeframe = Timeframe { minutes: 60 };
    pub const H4: Timeframe = Timeframe { minutes: 240 };

    pub fn from_minutes(minutes: u32) -> Result<Self, DomainError> {
        if minutes == 0 {
            return Err(DomainError::InvalidTimeframe("0m".into()));
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }
}

impl FromStr for Timeframe {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DomainError::InvalidTimeframe(s.to_string());
        if s.len() < 2 {
            return Err(invalid());
        }
        let (digits, unit) = s.split_at(s.len() - 1);
        let count: u32 = digits.parse().map_err(|_| invalid())?;
        let per_unit = match unit {
            "m" => 1,
            "h" => 60,
            "d" => 60 * 24,
            "w" => 60 * 24 * 7,
            _ => return Err(invalid()),
        };
        count
            .checked_mul(per_unit)
            .filter(|m| *m > 0)
            .map(|minutes| Self { minutes })
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DAY: u32 = 60 * 24;
        const WEEK: u32 = DAY * 7;
        let m = self.minutes;
        if m % WEEK == 0 {
            write!(f, "{}w", m / WEEK)
        } else if m % DAY == 0 {
            write!(f, "{}d", m / DAY)
        } else if m % 60 == 0 {
            write!(f, "{}h", m / 60)
        } else {
            write!(f, "{m}m")
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_intervals() {
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!("5m".parse::<Timeframe>().unwrap(), Timeframe::M5);
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!("1d".parse::<Timeframe>().unwrap().minutes(), 1440);
    }

    #[test]
    fn display_uses_largest_unit() {
        assert_eq!(Timeframe::H4.to_string(), "4h");
        assert_eq!(Timeframe::from_minutes(90).unwrap().to_string(), "90m");
        assert_eq!(Timeframe::from_minutes(10080).unwrap().to_string(), "1w");
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Timeframe>().is_err());
        assert!("m".parse::<Timeframe>().is_err());
        assert!("0m".parse::<Timeframe>().is_err());
        assert!("5x".parse::<Timeframe>().is_err());
        assert!(Timeframe::from_minutes(0).is_err());
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&Timeframe::M5).unwrap();
        assert_eq!(json, "\"5m\"");
        let back: Timeframe = serde_json::from_str("\"4h\"").unwrap();
        assert_eq!(back, Timeframe::H4);
    }
}
