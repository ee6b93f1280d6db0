//! Artifact export: JSON and CSV files for a finished run.
//!
//! JSON carries a `schema_version`; results from a newer schema are rejected
//! on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use replaylab_core::domain::Trade;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::store::result_id;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade ledger as CSV, one row per OPEN/CLOSE event.
///
/// Columns: timestamp, action, direction, price, size, balance, pnl, fee,
/// net_pnl, risk_amount, exit_reason
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "timestamp",
        "action",
        "direction",
        "price",
        "size",
        "balance",
        "pnl",
        "fee",
        "net_pnl",
        "risk_amount",
        "exit_reason",
    ])?;

    for t in trades {
        let action = if t.is_open() { "OPEN" } else { "CLOSE" };
        let reason = t
            .exit_reason
            .map(|r| r.to_string())
            .unwrap_or_default();
        wtr.write_record([
            &t.timestamp.to_rfc3339(),
            action,
            &t.direction.to_string(),
            &format!("{:.6}", t.price),
            &format!("{:.6}", t.size),
            &format!("{:.2}", t.balance),
            &format!("{:.2}", t.pnl),
            &format!("{:.2}", t.fee),
            &format!("{:.2}", t.net_pnl()),
            &format!("{:.2}", t.risk_amount),
            &reason,
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for a single run.
///
/// Creates `{strategy}_{id prefix}/` under `output_dir` containing:
/// - `result.json`: the full `BacktestResult`
/// - `trades.csv`: the trade ledger
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let id = result_id(result).context("failed to hash result")?;
    let dirname = format!("{}_{}", result.strategy.name, &id[..12]);
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_json(result)?;
    std::fs::write(run_dir.join("result.json"), &json)?;

    let trades_csv = export_trades_csv(&result.trades)?;
    std::fs::write(run_dir.join("trades.csv"), &trades_csv)?;

    tracing::info!(dir = %run_dir.display(), "saved artifacts");
    Ok(run_dir)
}
