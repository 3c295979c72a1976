//! Settled-transfer statistics log.
//!
//! One line per transfer that reached a verdict:
//!
//! ```text
//! 3f1c…9a;0:02:30
//! 8be0…41;removed
//! 77aa…0c;timeout
//! ```
//!
//! Confirmed transfers record how long confirmation took as `H:MM:SS`.
//! The file is only ever appended to, one flushed line at a time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::HistoryError;
use crate::transaction::confirmation::ConfirmationOutcome;
use crate::transaction::types::TransactionId;

/// `H:MM:SS`, hours unbounded. Sub-second precision is dropped.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// The outcome column of a stats line.
pub fn outcome_field(outcome: &ConfirmationOutcome) -> String {
    match outcome {
        ConfirmationOutcome::Confirmed { elapsed } => format_elapsed(*elapsed),
        ConfirmationOutcome::Removed => "removed".to_string(),
        ConfirmationOutcome::TimedOut => "timeout".to_string(),
    }
}

/// A full stats line, without the trailing newline.
pub fn stats_line(id: &TransactionId, outcome: &ConfirmationOutcome) -> String {
    format!("{};{}", id, outcome_field(outcome))
}

/// Append-only writer for the statistics file.
#[derive(Debug)]
pub struct StatsLog {
    path: PathBuf,
    // Serializes appends from concurrent dispense tasks.
    write_lock: Mutex<()>,
}

impl StatsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one line, creating the file if needed.
    pub async fn append(
        &self,
        id: &TransactionId,
        outcome: &ConfirmationOutcome,
    ) -> Result<(), HistoryError> {
        let line = format!("{}\n", stats_line(id, outcome));
        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        debug!(path = %self.path.display(), tx_id = %id, "stats line appended");
        Ok(())
    }
}
