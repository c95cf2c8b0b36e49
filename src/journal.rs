// =============================================================================
// Trade Journal — append-only CSV record of accepted signals
// =============================================================================
//
// One line per accepted (TAKE) signal. The journal never overwrites or
// deduplicates; suppressing repeated freezes of the same signal is the
// lifecycle manager's job upstream.
// =============================================================================

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::types::Direction;

/// One accepted signal, as journalled.
#[derive(Debug, Clone, Serialize)]
pub struct JournalRecord {
    pub timestamp: String,
    pub symbol: String,
    pub ltf: String,
    pub htf: String,
    pub direction: Direction,
    pub entry: f64,
    pub sl: f64,
    pub tp: f64,
    pub rr: f64,
}

impl JournalRecord {
    fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}\n",
            self.timestamp,
            self.symbol,
            self.ltf,
            self.htf,
            self.direction,
            self.entry,
            self.sl,
            self.tp,
            self.rr
        )
    }
}

/// Append-only CSV journal at a fixed path.
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Creates the file on first write.
    pub fn append(&self, record: &JournalRecord) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open trade journal {}", self.path.display()))?;

        file.write_all(record.to_csv_line().as_bytes())
            .with_context(|| format!("failed to append to trade journal {}", self.path.display()))?;

        info!(
            symbol = %record.symbol,
            direction = %record.direction,
            entry = record.entry,
            sl = record.sl,
            tp = record.tp,
            rr = record.rr,
            "trade journalled"
        );
        Ok(())
    }

    /// The most recent `count` raw journal lines (newest last). An absent
    /// file reads as an empty journal.
    pub fn recent(&self, count: usize) -> Result<Vec<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read trade journal {}", self.path.display())
                })
            }
        };

        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let start = lines.len().saturating_sub(count);
        Ok(lines[start..].to_vec())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn temp_journal() -> TradeJournal {
        let path = std::env::temp_dir().join(format!("journal-{}.csv", uuid::Uuid::new_v4()));
        TradeJournal::new(path)
    }

    fn sample_record() -> JournalRecord {
        JournalRecord {
            timestamp: "2026-01-02 03:04:05".to_string(),
            symbol: "BTCUSDT".to_string(),
            ltf: "3m".to_string(),
            htf: "15m".to_string(),
            direction: Direction::Long,
            entry: 50_000.0,
            sl: 49_750.0,
            tp: 50_500.0,
            rr: 2.0,
        }
    }

    #[test]
    fn append_writes_one_csv_line() {
        let journal = temp_journal();
        journal.append(&sample_record()).unwrap();

        let lines = journal.recent(10).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "2026-01-02 03:04:05,BTCUSDT,3m,15m,LONG,50000,49750,50500,2"
        );

        let _ = std::fs::remove_file(journal.path());
    }

    #[test]
    fn append_never_overwrites() {
        let journal = temp_journal();
        journal.append(&sample_record()).unwrap();
        let mut second = sample_record();
        second.direction = Direction::Short;
        journal.append(&second).unwrap();

        let lines = journal.recent(10).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("SHORT"));

        let _ = std::fs::remove_file(journal.path());
    }

    #[test]
    fn recent_on_missing_file_is_empty() {
        let journal = temp_journal();
        assert!(journal.recent(10).unwrap().is_empty());
    }

    #[test]
    fn recent_caps_at_count() {
        let journal = temp_journal();
        for _ in 0..5 {
            journal.append(&sample_record()).unwrap();
        }
        assert_eq!(journal.recent(3).unwrap().len(), 3);

        let _ = std::fs::remove_file(journal.path());
    }
}
