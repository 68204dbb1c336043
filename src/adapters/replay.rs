//! Replay Feed
//!
//! Historical price pairs from a JSON-lines file, one object per line:
//!
//! ```text
//! {"timestamp":"2024-03-01T00:00:00Z","price_a":61234.5,"price_b":3401.2}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. A malformed line is
//! reported as a parse error for that cycle; the next call moves on.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use crate::domain::PricePair;
use crate::ports::{MarketDataError, PriceFeed};

pub struct ReplayFeed {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl ReplayFeed {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MarketDataError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| {
            MarketDataError::SourceError(format!("cannot open {}: {}", path.display(), e))
        })?;

        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    /// Lines consumed so far
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

#[async_trait]
impl PriceFeed for ReplayFeed {
    fn describe(&self) -> String {
        format!("replay of {}", self.path.display())
    }

    async fn next_pair(&mut self) -> Result<Option<PricePair>, MarketDataError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| MarketDataError::SourceError(e.to_string()))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return serde_json::from_str::<PricePair>(trimmed)
                .map(Some)
                .map_err(|e| MarketDataError::ParseError(format!("line {}: {}", self.line_no, e)));
        }
    }
}
