use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::workflow::RunSummary;

const RULE_WIDTH: usize = 50;

/// Append-only outcome log. Truncated and re-headered once at run start; one
/// line per contact terminal outcome plus one summary block at end of run.
pub struct FeedbackLog {
    path: PathBuf,
}

impl FeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Truncates the file and writes the run header.
    pub fn start(&self) -> Result<()> {
        let header = format!(
            "WhatsApp automation started at {}\n{}\n\n",
            timestamp(),
            "-".repeat(RULE_WIDTH)
        );
        fs::write(&self.path, header)
            .with_context(|| format!("Failed to initialize feedback log {}", self.path.display()))
    }

    /// One line per contact outcome: `[index/total] name -- phone : status`.
    pub fn record(
        &self,
        index: usize,
        total: usize,
        name: &str,
        phone: &str,
        status: &str,
    ) -> Result<()> {
        self.append(&format!("[{index}/{total}] {name} -- {phone} : {status}\n"))
    }

    /// Synthetic entry for run-fatal failures (e.g. the browser never
    /// launched) so the log always explains why nothing was sent.
    pub fn record_system_error(&self, total: usize, message: &str) -> Result<()> {
        self.record(0, total, "SYSTEM", "ERROR", message)
    }

    /// End-of-run summary block.
    pub fn summary(&self, summary: &RunSummary) -> Result<()> {
        let rule = "-".repeat(RULE_WIDTH);
        let mut block = format!("\n{rule}\n");

        if summary.stopped {
            block.push_str(&format!("Automation forcefully stopped at {}\n", timestamp()));
        } else {
            block.push_str(&format!("Automation finished at {}\n", timestamp()));
        }

        block.push_str(&format!("Total contacts: {}\n", summary.total));
        block.push_str(&format!("Successfully sent: {}\n", summary.successes));
        block.push_str(&format!("Failed: {}\n", summary.failures));

        if summary.stopped {
            block.push_str(&format!("Remaining contacts: {}\n", summary.remaining()));
        }

        block.push_str(&format!("{rule}\n"));
        self.append(&block)
    }

    fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open feedback log {}", self.path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("Failed to append to feedback log {}", self.path.display()))
    }
}

fn timestamp() -> String {
    time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .format(&time::format_description::parse(
            "[year]-[month]-[day] [hour]:[minute]:[second]",
        )
        .expect("valid format"))
        .unwrap_or_else(|_| "unknown".to_string())
}
