//! ReplayLab CLI: run backtests and browse stored results.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file
//! - `list`: show the registered strategies and risk rules
//! - `show`: print one stored result by id
//! - `history`: list stored results in a run-time window, most recent first

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use replaylab_core::components::Params;

use replaylab_runner::{
    generate_synthetic_candles, load_candles_csv, save_artifacts, BacktestConfig, BacktestResult,
    JsonlResultStore, ResultStore, Runner, Window,
};

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI: candle-by-candle strategy backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// CSV market data (timestamp,price,volume,open,high,low,close).
        #[arg(long, conflicts_with = "synthetic")]
        data: Option<PathBuf>,

        /// Generate this many synthetic candles spread over the config window.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Append the result to this JSON-lines store.
        #[arg(long)]
        store: Option<PathBuf>,

        /// Write result.json and trades.csv under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the full result as JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List registered strategies and risk rules.
    List,
    /// Print a stored result.
    Show {
        /// JSON-lines result store.
        #[arg(long, default_value = "results.jsonl")]
        store: PathBuf,

        /// Result id (a unique prefix is enough).
        id: String,

        /// Print the full result as JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List stored results by run time, most recent first.
    History {
        /// JSON-lines result store.
        #[arg(long, default_value = "results.jsonl")]
        store: PathBuf,

        /// Earliest run time (YYYY-MM-DD or RFC 3339). Unbounded by default.
        #[arg(long)]
        from: Option<String>,

        /// Latest run time (YYYY-MM-DD or RFC 3339). Defaults to now.
        #[arg(long)]
        to: Option<String>,
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
        Commands::Run {
            config,
            data,
            synthetic,
            store,
            output_dir,
            json,
        } => run_backtest_cmd(
            &config,
            data.as_deref(),
            synthetic,
            store.as_deref(),
            output_dir.as_deref(),
            json,
        ),
        Commands::List => run_list(),
        Commands::Show { store, id, json } => run_show(&store, &id, json),
        Commands::History { store, from, to } => run_history(&store, from, to),
    }
}

fn run_backtest_cmd(
    config_path: &Path,
    data: Option<&Path>,
    synthetic: Option<usize>,
    store: Option<&Path>,
    output_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut config = BacktestConfig::from_file(config_path)?;
    tracing::debug!(path = %config_path.display(), "loaded config");

    if let Some(path) = data {
        let window = Window {
            start: config.start,
            end: config.end,
        };
        let candles = load_candles_csv(path, Some(window))?;
        config = config.with_market_data(candles);
    } else if let Some(count) = synthetic {
        let step = synthetic_step(config.start, config.end, count)?;
        let label = format!("{}:{}", config.strategy.name, config.start.to_rfc3339());
        let candles = generate_synthetic_candles(&label, config.start, step, count);
        config = config.with_market_data(candles);
    } else if config.market_data.is_empty() {
        bail!("no market data: pass --data <csv>, --synthetic <n>, or embed [[market_data]] in the config");
    }

    let result = Runner::with_defaults().run(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    if let Some(path) = store {
        let store = JsonlResultStore::new(path);
        let id = store.save(&result)?;
        println!("Saved result {id} to {}", path.display());
    }

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }

    Ok(())
}

fn run_list() -> Result<()> {
    let runner = Runner::with_defaults();
    println!("Strategies:");
    for name in runner.strategies().names() {
        println!("  {name}");
    }
    println!("Risk rules:");
    for name in runner.risks().names() {
        println!("  {name}");
    }
    Ok(())
}

fn run_show(store_path: &Path, id: &str, json: bool) -> Result<()> {
    let store = JsonlResultStore::new(store_path);
    let matches: Vec<_> = store
        .read_all()?
        .into_iter()
        .filter(|e| e.id.starts_with(id))
        .collect();

    let entry = match matches.as_slice() {
        [] => bail!("no result with id '{id}' in {}", store_path.display()),
        [one] => one,
        many => bail!("id prefix '{id}' is ambiguous ({} matches)", many.len()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entry.result)?);
    } else {
        println!("Id:             {}", entry.id);
        print_summary(&entry.result);
        print_trades(&entry.result);
    }
    Ok(())
}

fn run_history(store_path: &Path, from: Option<String>, to: Option<String>) -> Result<()> {
    let from = match from {
        Some(s) => parse_time(&s)?,
        None => DateTime::<Utc>::MIN_UTC,
    };
    let to = match to {
        Some(s) => parse_time(&s)?,
        None => Utc::now(),
    };
    if from > to {
        bail!("--from ({from}) is after --to ({to})");
    }

    let store = JsonlResultStore::new(store_path);
    let results = store.find_by_date_range(from, to)?;
    if results.is_empty() {
        println!("No results between {from} and {to}");
        return Ok(());
    }

    println!(
        "{:<20} {:<18} {:<20} {:>7} {:>9} {:>10} {:>9}",
        "Run", "Strategy", "Risk", "Trades", "Win %", "Return %", "MaxDD %"
    );
    println!("{}", "-".repeat(99));
    for r in &results {
        println!(
            "{:<20} {:<18} {:<20} {:>7} {:>9.1} {:>10.2} {:>9.2}",
            r.run_timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.strategy.name,
            r.risk.name,
            r.total_trades(),
            r.win_rate_pct(),
            r.total_return_pct(),
            r.max_drawdown_pct(),
        );
    }
    Ok(())
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
/// Spacing that spreads `count` synthetic candles over `[start, end)`.
fn synthetic_step(start: DateTime<Utc>, end: DateTime<Utc>, count: usize) -> Result<Duration> {
    if count == 0 {
        bail!("--synthetic needs at least one candle");
    }
    let Ok(divisor) = i32::try_from(count) else {
        bail!("--synthetic {count} is too large (max {})", i32::MAX);
    };
    Ok((end - start) / divisor)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    let dt = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid time '{s}': expected YYYY-MM-DD or RFC 3339"))?;
    Ok(dt.with_timezone(&Utc))
}

fn format_params(params: &Params) -> String {
    if params.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!(" ({})", parts.join(", "))
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!(
        "Strategy:       {}{}",
        result.strategy.name,
        format_params(&result.strategy.params)
    );
    println!(
        "Risk rule:      {}{}",
        result.risk.name,
        format_params(&result.risk.params)
    );
    println!("Period:         {} to {}", result.start, result.end);
    println!("Candles:        {}", result.candle_count);
    println!("Signals:        {}", result.signal_count);
    println!("Trades:         {}", result.total_trades());
    if result.forced_liquidation {
        println!("                (last position closed at end of data)");
    }
    println!();
    println!("--- Performance ---");
    println!("Initial:        {:.2}", result.initial_balance);
    println!("Final:          {:.2}", result.final_balance);
    println!("Total Return:   {:.2}%", result.total_return_pct());
    println!("Max Drawdown:   {:.2}%", result.max_drawdown_pct());
    println!(
        "Win Rate:       {:.1}% ({} of {})",
        result.win_rate_pct(),
        result.winning_trades(),
        result.total_trades()
    );
    println!("Profit Factor:  {:.2}", result.metrics.profit_factor);
    println!("Fees:           {:.2}", result.metrics.total_fees);
    println!("Run at:         {}", result.run_timestamp);
}

fn print_trades(result: &BacktestResult) {
    if result.trades.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<26} {:<6} {:<6} {:>12} {:>12} {:>12} {:<12}",
        "Time", "Action", "Side", "Price", "PnL", "Balance", "Reason"
    );
    for t in &result.trades {
        let action = if t.is_open() { "OPEN" } else { "CLOSE" };
        let reason = t.exit_reason.map(|r| r.to_string()).unwrap_or_default();
        println!(
            "{:<26} {:<6} {:<6} {:>12.4} {:>12.2} {:>12.2} {:<12}",
            t.timestamp.to_rfc3339(),
            action,
            t.direction.to_string(),
            t.price,
            t.net_pnl(),
            t.balance,
            reason
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_dates_and_rfc3339() {
        assert_eq!(
            parse_time("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("2024-03-01T12:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap()
        );
        assert!(parse_time("March 1st").is_err());
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "replaylab",
            "run",
            "--config",
            "bt.toml",
            "--synthetic",
            "500",
            "--store",
            "r.jsonl",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                synthetic, store, ..
            } => {
                assert_eq!(synthetic, Some(500));
                assert_eq!(store, Some(PathBuf::from("r.jsonl")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn data_and_synthetic_conflict() {
        let parsed = Cli::try_parse_from([
            "replaylab",
            "run",
            "--config",
            "bt.toml",
            "--data",
            "d.csv",
            "--synthetic",
            "10",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn synthetic_step_spreads_over_window() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(10);
        assert_eq!(synthetic_step(start, end, 10).unwrap(), Duration::days(1));
        assert!(synthetic_step(start, end, 0).is_err());
    }

    #[test]
    fn synthetic_count_beyond_i32_is_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(10);
        // Both would wrap when cast: to 0 and to a negative divisor.
        assert!(synthetic_step(start, end, 1 << 32).is_err());
        assert!(synthetic_step(start, end, (1 << 31) + 5).is_err());
        assert!(synthetic_step(start, end, i32::MAX as usize).is_ok());
    }

    #[test]
    fn format_params_is_ordered() {
        let mut params = Params::new();
        params.insert("upper".to_string(), 105.0);
        params.insert("lower".to_string(), 95.0);
        assert_eq!(format_params(&params), " (lower=95, upper=105)");
    }
}
