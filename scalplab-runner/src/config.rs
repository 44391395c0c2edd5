//! Run configuration loaded from TOML.
//!
//! ```toml
//! strategy = "ema_scalping"
//! pairs = ["BTC/USDT", "ETH/USDT"]
//! data_dir = "data"
//! output_dir = "results"
//!
//! [params]
//! ema_fast = 6
//! volume_factor = 1.4
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use scalplab_core::domain::Timeframe;
use scalplab_core::params::ParamValue;

/// Errors reading or parsing a run config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid run config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("run config lists no pairs")]
    NoPairs,
}

/// One offline analysis run: a strategy applied to a set of pairs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub strategy: String,

    pub pairs: Vec<String>,

    /// Directory holding `<pair>-<timeframe>.csv` candle files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Generate this many synthetic candles per pair instead of reading files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<usize>,

    /// Parameter overrides, validated against the strategy's declared ranges.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        if config.pairs.is_empty() {
            return Err(ConfigError::NoPairs);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Candle file for `pair` at `timeframe` under the data directory.
    pub fn data_path(&self, pair: &str, timeframe: Timeframe) -> PathBuf {
        self.data_dir
            .join(format!("{}-{timeframe}.csv", pair_file_stem(pair)))
    }
}

/// File-system friendly pair name: `BTC/USDT` becomes `BTC_USDT`.
pub fn pair_file_stem(pair: &str) -> String {
    pair.replace('/', "_")
}

/// Pair named by a candle file: `data/BTC_USDT-1m.csv` becomes `BTC/USDT`.
pub fn pair_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let pair = match stem.rsplit_once('-') {
        Some((pair, _timeframe)) => pair,
        None => stem,
    };
    (!pair.is_empty()).then(|| pair.replace('_', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = RunConfig::from_toml_str(
            r#"
            strategy = "ema_scalping"
            pairs = ["BTC/USDT", "ETH/USDT"]
            data_dir = "candles"

            [params]
            ema_fast = 6
            volume_factor = 1.4
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy, "ema_scalping");
        assert_eq!(config.pairs.len(), 2);
        assert_eq!(config.data_dir, PathBuf::from("candles"));
        assert_eq!(config.output_dir, PathBuf::from("results"));
        assert_eq!(config.synthetic, None);
        assert_eq!(config.params["ema_fast"], ParamValue::Int(6));
        assert_eq!(config.params["volume_factor"], ParamValue::Decimal(1.4));
    }

    #[test]
    fn rejects_empty_pairs_and_bad_toml() {
        let empty = RunConfig::from_toml_str("strategy = \"rsi_bb\"\npairs = []");
        assert!(matches!(empty, Err(ConfigError::NoPairs)));

        let broken = RunConfig::from_toml_str("strategy = ");
        assert!(matches!(broken, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn data_path_uses_pair_stem_and_timeframe() {
        let config =
            RunConfig::from_toml_str("strategy = \"macd_ema\"\npairs = [\"BTC/USDT\"]").unwrap();
        assert_eq!(
            config.data_path("BTC/USDT", Timeframe::H4),
            PathBuf::from("data").join("BTC_USDT-4h.csv")
        );
    }

    #[test]
    fn pair_recovered_from_file_name() {
        assert_eq!(
            pair_from_path(Path::new("data/BTC_USDT-1m.csv")).as_deref(),
            Some("BTC/USDT")
        );
        assert_eq!(pair_from_path(Path::new("ETH_BTC.csv")).as_deref(), Some("ETH/BTC"));
        assert_eq!(pair_from_path(Path::new("-5m.csv")), None);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RunConfig::from_file(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.toml"));
    }
}
