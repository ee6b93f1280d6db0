//! Market data loading: CSV files and deterministic synthetic candles.
//!
//! CSV columns: `timestamp,price,volume,open,high,low,close`, with RFC 3339
//! timestamps. Rows must already be in chronological order.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use replaylab_core::domain::Candle;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("candle {index} at {timestamp} is earlier than the one before it")]
    OutOfOrder {
        index: usize,
        timestamp: DateTime<Utc>,
    },
    #[error("no candles between {start} and {end}")]
    EmptyWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Inclusive time window used to restrict loaded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Load candles from a CSV file, optionally restricted to `window`.
pub fn load_candles_csv(path: &Path, window: Option<Window>) -> Result<Vec<Candle>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let candles = read_candles_csv(file, window)?;
    tracing::info!(
        path = %path.display(),
        candles = candles.len(),
        "loaded market data"
    );
    Ok(candles)
}

/// Parse candles from any CSV reader.
pub fn read_candles_csv<R: Read>(reader: R, window: Option<Window>) -> Result<Vec<Candle>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candles: Vec<Candle> = Vec::new();

    for (index, row) in rdr.deserialize::<Candle>().enumerate() {
        let candle = row?;
        if let Some(prev) = candles.last() {
            if candle.timestamp < prev.timestamp {
                return Err(LoadError::OutOfOrder {
                    index,
                    timestamp: candle.timestamp,
                });
            }
        }
        candles.push(candle);
    }

    match window {
        Some(w) => {
            let before = candles.len();
            candles.retain(|c| w.contains(c.timestamp));
            if candles.is_empty() && before > 0 {
                return Err(LoadError::EmptyWindow {
                    start: w.start,
                    end: w.end,
                });
            }
            Ok(candles)
        }
        None => Ok(candles),
    }
}

/// Generate `count` synthetic candles, one per `step`, starting at `start`.
///
/// A random walk from 100.0 seeded by the blake3 hash of `label`: the same
/// label always yields the same series. Clearly fake; for demos and tests.
pub fn generate_synthetic_candles(
    label: &str,
    start: DateTime<Utc>,
    step: Duration,
    count: usize,
) -> Vec<Candle> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(label.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut candles = Vec::with_capacity(count);
    let mut price = 100.0_f64;
    let mut ts = start;

    for _ in 0..count {
        let ret: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = (price * (1.0 + ret)).max(0.01);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000.0..5_000_000.0);

        candles.push(Candle {
            timestamp: ts,
            price: close,
            volume,
            open,
            high,
            low,
            close,
        });

        price = close;
        ts += step;
    }

    candles
}
