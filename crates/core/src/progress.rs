use std::fs::{self, File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordStatus {
    Failed(String),
    Skipped(String),
    Accepted(usize),
    NoVariants,
}

impl WordStatus {
    fn label(&self) -> String {
        match self {
            WordStatus::Failed(_) => "✗ (API error)".to_string(),
            WordStatus::Skipped(reason) => format!("⊘ (skipped: {reason})"),
            WordStatus::Accepted(1) => "✓ (1 variant)".to_string(),
            WordStatus::Accepted(n) => format!("✓ ({n} variants)"),
            WordStatus::NoVariants => "✗ (no variants)".to_string(),
        }
    }
}

/// Throughput snapshot written every few words.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub done: usize,
    pub total: usize,
    pub words_per_min: f64,
    pub eta_min: f64,
}

impl Throughput {
    pub fn compute(done: usize, total: usize, attempts: usize, elapsed: Duration) -> Self {
        let minutes = elapsed.as_secs_f64() / 60.0;
        let words_per_min = if minutes > 0.0 {
            attempts as f64 / minutes
        } else {
            0.0
        };
        let remaining = total.saturating_sub(done);
        let eta_min = if words_per_min > 0.0 {
            remaining as f64 / words_per_min
        } else {
            0.0
        };
        Self {
            done,
            total,
            words_per_min,
            eta_min,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (100.0 * self.done as f64 / self.total as f64).min(100.0)
        }
    }
}

/// Human-readable per-worker log. Advisory only; nothing parses it.
pub struct ProgressLog {
    out: Box<dyn Write + Send>,
}

impl ProgressLog {
    /// Appends to `path`, creating it (and its directory) if needed.
    pub fn append(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(LineWriter::new(file)))
    }

    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    pub fn sink() -> Self {
        Self::new(io::sink())
    }

    pub fn header(
        &mut self,
        worker_id: usize,
        total: usize,
        output: &Path,
        delay: Duration,
        resumed: usize,
    ) -> Result<()> {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "German-English Dictionary Builder - Worker {worker_id}")?;
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "Total words: {total}")?;
        writeln!(self.out, "Output: {}", output.display())?;
        writeln!(self.out, "Rate limit: {}ms between requests", delay.as_millis())?;
        if resumed > 0 {
            writeln!(self.out, "RESUMING: {resumed} words already processed")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    pub fn word(&mut self, idx: usize, total: usize, word: &str, status: &WordStatus) -> Result<()> {
        writeln!(
            self.out,
            "[{idx}/{total}] Processing: {word}... {}",
            status.label()
        )?;
        if let WordStatus::Failed(detail) = status {
            writeln!(self.out, "    └─ {detail}")?;
        }
        Ok(())
    }

    pub fn variant_added(&mut self, variant: &str) -> Result<()> {
        writeln!(self.out, "    └─ Added variant: {variant}")?;
        Ok(())
    }

    pub fn throughput(&mut self, snapshot: &Throughput) -> Result<()> {
        writeln!(
            self.out,
            "  Progress: {}/{} ({:.1}%) | Rate: {:.1} words/min | ETA: {:.1} min",
            snapshot.done,
            snapshot.total,
            snapshot.percent(),
            snapshot.words_per_min,
            snapshot.eta_min
        )?;
        Ok(())
    }

    pub fn footer(
        &mut self,
        worker_id: usize,
        entries: usize,
        output: &Path,
        complete: bool,
    ) -> Result<()> {
        let rule = "=".repeat(RULE_WIDTH);
        let outcome = if complete {
            "completed"
        } else {
            "stopped (failures remain)"
        };
        writeln!(self.out)?;
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "Worker {worker_id} {outcome}: {entries} words processed")?;
        writeln!(self.out, "Output saved to: {}", output.display())?;
        writeln!(self.out, "{rule}")?;
        self.out.flush()?;
        Ok(())
    }
}
