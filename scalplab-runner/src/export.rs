//! Export of analysis artifacts: per-pair signal CSVs and `summary.json`.
//!
//! Persisted summaries carry a `schema_version` field. Newer versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use scalplab_core::components::frame::CandleFrame;
use scalplab_core::strategy::{ENTER_LONG, ENTER_TAG, EXIT_LONG, EXIT_TAG};

use crate::config::pair_file_stem;
use crate::runner::{RunSummary, SCHEMA_VERSION};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SIGNAL_COLUMNS: [&str; 4] = [ENTER_LONG, EXIT_LONG, ENTER_TAG, EXIT_TAG];

// ─── Signals CSV ────────────────────────────────────────────────────

/// Render an analyzed frame as CSV.
///
/// Columns: timestamp, open, high, low, close, volume, every derived column
/// in name order, then enter_long, exit_long, enter_tag, exit_tag. Undefined
/// cells are empty.
pub fn signals_csv(frame: &CandleFrame) -> Result<String> {
    let derived: Vec<&str> = frame
        .column_names()
        .filter(|name| !SIGNAL_COLUMNS.contains(name))
        .collect();
    let trailing: Vec<&str> = SIGNAL_COLUMNS
        .iter()
        .copied()
        .filter(|name| frame.column(name).is_some())
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["timestamp", "open", "high", "low", "close", "volume"];
    header.extend(&derived);
    header.extend(&trailing);
    wtr.write_record(&header)?;

    let columns: Vec<_> = derived
        .iter()
        .chain(&trailing)
        .filter_map(|name| frame.column(name))
        .collect();

    for (i, c) in frame.candles().iter().enumerate() {
        let mut record = vec![
            c.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ];
        record.extend(columns.iter().map(|col| col.render(i)));
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Write `<pair>-<timeframe>-signals.csv` into `output_dir`.
pub fn write_signals(frame: &CandleFrame, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(format!(
        "{}-{}-signals.csv",
        pair_file_stem(frame.pair()),
        frame.timeframe()
    ));
    let csv = signals_csv(frame)?;
    std::fs::write(&path, csv).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

// ─── Summary JSON ───────────────────────────────────────────────────

pub fn export_summary_json(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize RunSummary to JSON")
}

/// Deserialize a summary, rejecting unknown schema versions.
pub fn import_summary_json(json: &str) -> Result<RunSummary> {
    let summary: RunSummary =
        serde_json::from_str(json).context("failed to deserialize RunSummary from JSON")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

pub fn write_summary(summary: &RunSummary, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join("summary.json");
    let json = export_summary_json(summary)?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn load_summary(dir: &Path) -> Result<RunSummary> {
    let path = dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_summary_json(&json)
}
