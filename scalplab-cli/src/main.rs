//! ScalpLab CLI: inspect, analyze and query scalping strategies offline.
//!
//! Commands:
//! - `list`: registered strategy names
//! - `describe`: strategy descriptor as JSON or TOML
//! - `analyze`: run a strategy over candle files, a run config, or synthetic data
//! - `advise`: evaluate the trade callbacks at one instant

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use scalplab_core::components::frame::CandleFrame;
use scalplab_core::params::ParamValue;
use scalplab_core::strategy::{analyze, create_strategy, Strategy, STRATEGY_NAMES};
use scalplab_runner::data_loader::parse_timestamp;
use scalplab_runner::{
    advise, load_frame, pair_from_path, run_config, run_frames, synthetic_frame, AdviceRequest,
    RunConfig, RunSummary,
};

#[derive(Parser)]
#[command(
    name = "scalplab",
    about = "ScalpLab CLI: scalping strategy analysis for leveraged futures"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Toml,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered strategies.
    List,
    /// Print a strategy descriptor: risk config, parameters, rules, callbacks.
    Describe {
        strategy: String,

        #[arg(long, value_enum, default_value = "json")]
        format: Format,

        /// Parameter override, e.g. --param ema_fast=6 (repeatable).
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,
    },
    /// Analyze candles and write signal CSVs plus summary.json.
    Analyze {
        /// Path to a TOML run config.
        #[arg(long, conflicts_with_all = ["strategy", "candles", "synthetic"])]
        config: Option<PathBuf>,

        /// Strategy name (required without --config).
        #[arg(long)]
        strategy: Option<String>,

        /// Candle CSV files named <pair>-<timeframe>.csv.
        #[arg(long, num_args = 1.., conflicts_with = "synthetic")]
        candles: Vec<PathBuf>,

        /// Generate this many synthetic candles per pair instead.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Pairs for synthetic data.
        #[arg(long = "pair", default_value = "BTC/USDT")]
        pairs: Vec<String>,

        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,

        /// Output directory (ignored with --config).
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Evaluate stop-loss, custom exit, ROI, trailing and leverage for one trade.
    Advise {
        #[arg(long)]
        strategy: String,

        /// Candle CSV for the trade's pair.
        #[arg(long)]
        candles: PathBuf,

        /// Pair name. Defaults to the one in the candle file name.
        #[arg(long)]
        pair: Option<String>,

        /// Trade open time (RFC 3339, "YYYY-MM-DD HH:MM:SS" or epoch millis).
        #[arg(long, value_parser = parse_time)]
        open_time: NaiveDateTime,

        #[arg(long, value_parser = parse_time)]
        current_time: NaiveDateTime,

        /// Current rate.
        #[arg(long)]
        rate: f64,

        /// Current profit fraction (0.01 = 1%).
        #[arg(long, allow_negative_numbers = true)]
        profit: f64,

        /// Open rate. Defaults to the rate implied by --rate and --profit.
        #[arg(long)]
        open_rate: Option<f64>,

        /// Stop rate already in force.
        #[arg(long)]
        previous_stop: Option<f64>,

        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            for name in STRATEGY_NAMES {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Describe {
            strategy,
            format,
            params,
        } => run_describe(&strategy, format, params),
        Commands::Analyze {
            config,
            strategy,
            candles,
            synthetic,
            pairs,
            params,
            output_dir,
        } => {
            let summary = match config {
                Some(path) => run_config(&RunConfig::from_file(&path)?)?.0,
                None => run_analyze(strategy, candles, synthetic, pairs, params, output_dir)?,
            };
            print_summary(&summary);
            Ok(())
        }
        Commands::Advise {
            strategy,
            candles,
            pair,
            open_time,
            current_time,
            rate,
            profit,
            open_rate,
            previous_stop,
            params,
        } => {
            let strategy = build_strategy(&strategy, params)?;
            let pair = match pair.or_else(|| pair_from_path(&candles)) {
                Some(p) => p,
                None => bail!("cannot infer pair from {}; pass --pair", candles.display()),
            };
            let mut frame = load_frame(&candles, &pair, strategy.risk().timeframe)?;
            analyze(strategy.as_ref(), &mut frame)?;

            let request = AdviceRequest {
                open_time,
                open_rate: open_rate.unwrap_or(rate / (1.0 + profit)),
                current_time,
                current_rate: rate,
                current_profit: Some(profit),
                previous_stop_rate: previous_stop,
            };
            let advice = advise(strategy.as_ref(), &frame, &request);
            println!("{}", serde_json::to_string_pretty(&advice)?);
            Ok(())
        }
    }
}

fn build_strategy(name: &str, params: Vec<(String, ParamValue)>) -> Result<Box<dyn Strategy>> {
    let overrides: BTreeMap<String, ParamValue> = params.into_iter().collect();
    create_strategy(name, &overrides).with_context(|| format!("cannot build strategy '{name}'"))
}

fn run_describe(name: &str, format: Format, params: Vec<(String, ParamValue)>) -> Result<()> {
    let descriptor = build_strategy(name, params)?.descriptor();
    let text = match format {
        Format::Json => serde_json::to_string_pretty(&descriptor)?,
        Format::Toml => toml::to_string_pretty(&descriptor)?,
    };
    println!("{text}");
    Ok(())
}

fn run_analyze(
    strategy: Option<String>,
    candles: Vec<PathBuf>,
    synthetic: Option<usize>,
    pairs: Vec<String>,
    params: Vec<(String, ParamValue)>,
    output_dir: PathBuf,
) -> Result<RunSummary> {
    let Some(name) = strategy else {
        bail!("one of --config or --strategy is required");
    };
    let strategy = build_strategy(&name, params)?;
    let timeframe = strategy.risk().timeframe;

    let frames: Vec<CandleFrame> = match synthetic {
        Some(count) => pairs
            .iter()
            .map(|pair| synthetic_frame(pair, timeframe, count))
            .collect::<Result<_, _>>()?,
        None => {
            if candles.is_empty() {
                bail!("--strategy needs --candles or --synthetic");
            }
            candles
                .iter()
                .map(|path| -> Result<CandleFrame> {
                    let pair = pair_from_path(path).with_context(|| {
                        format!("cannot infer pair from {}", path.display())
                    })?;
                    Ok(load_frame(path, &pair, timeframe)?)
                })
                .collect::<Result<_>>()?
        }
    };

    run_frames(strategy.as_ref(), frames, &output_dir)
}

fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let value = value
        .parse::<ParamValue>()
        .map_err(|e| format!("bad value for {name}: {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn parse_time(raw: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(raw).ok_or_else(|| format!("unrecognised timestamp '{raw}'"))
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("=== Analysis Summary ===");
    println!("Strategy:       {}", summary.strategy);
    println!("Fingerprint:    {}", summary.param_fingerprint);
    println!();
    println!(
        "{:<14} {:>4} {:>8} {:>8} {:>6}",
        "Pair", "TF", "Rows", "Entries", "Exits"
    );
    for p in &summary.pairs {
        println!(
            "{:<14} {:>4} {:>8} {:>8} {:>6}",
            p.pair, p.timeframe, p.rows, p.entries, p.exits
        );
        if !p.warmed_up {
            println!("WARNING: {} has fewer candles than the warm-up length", p.pair);
        }
    }
    println!();
}
