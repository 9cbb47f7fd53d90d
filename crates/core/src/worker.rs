use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::Result;
use crate::model::{DictionaryFile, Enrichment};
use crate::progress::{ProgressLog, Throughput, WordStatus};

pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 50;
const SUMMARY_EVERY: usize = 10;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub worker_id: usize,
    pub delay: Duration,
    pub checkpoint_interval: usize,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub attempted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub accepted: usize,
    /// Every assigned word ended up processed and the checkpoint was removed.
    pub complete: bool,
    pub state: Checkpoint,
}

impl WorkerReport {
    pub fn entries(&self) -> usize {
        self.state.dictionary.len()
    }
}

/// Runs one worker over its slice of the word list.
///
/// A word whose enrichment fails is left out of the processed set and is not
/// retried during this run; the next run over the same range picks it up
/// again. Skipped and accepted words are recorded and never queried twice.
pub struct Worker {
    settings: WorkerSettings,
    store: CheckpointStore,
    log: ProgressLog,
}

impl Worker {
    pub fn new(settings: WorkerSettings, store: CheckpointStore, log: ProgressLog) -> Self {
        Self {
            settings,
            store,
            log,
        }
    }

    pub fn run<F>(&mut self, words: &[String], mut enrich: F) -> Result<WorkerReport>
    where
        F: FnMut(&str) -> Result<Enrichment>,
    {
        let worker_id = self.settings.worker_id;
        let interval = self.settings.checkpoint_interval.max(1);
        let total = words.len();
        let mut state = self.store.load(worker_id)?;
        let resumed = state.processed.len();
        self.log.header(
            worker_id,
            total,
            &self.settings.output,
            self.settings.delay,
            resumed,
        )?;
        tracing::info!(
            worker = worker_id,
            words = total,
            resumed,
            output = %self.settings.output.display(),
            "worker starting"
        );

        let started = Instant::now();
        let mut report = WorkerReport::default();
        for (position, word) in words.iter().enumerate() {
            let idx = position + 1;
            if state.is_processed(word) {
                continue;
            }
            let mut added = Vec::new();
            let status = match enrich(word) {
                Err(err) => {
                    tracing::warn!(worker = worker_id, word = %word, error = %err, "enrichment failed");
                    report.failed += 1;
                    WordStatus::Failed(err.to_string())
                }
                Ok(Enrichment::Skipped { reason }) => {
                    state.mark_processed(word);
                    report.skipped += 1;
                    WordStatus::Skipped(reason)
                }
                Ok(Enrichment::Accepted { variants }) => {
                    report.accepted += 1;
                    let count = variants.len();
                    for variant in variants {
                        state.mark_processed(&variant.word);
                        if variant.word != *word {
                            added.push(variant.word.clone());
                        }
                        if let Some(previous) = state.dictionary.upsert(variant) {
                            tracing::debug!(worker = worker_id, key = %previous.word, "entry replaced");
                        }
                    }
                    state.mark_processed(word);
                    if count == 0 {
                        WordStatus::NoVariants
                    } else {
                        WordStatus::Accepted(count)
                    }
                }
            };
            report.attempted += 1;
            self.log.word(idx, total, word, &status)?;
            for variant in &added {
                self.log.variant_added(variant)?;
            }
            if idx % SUMMARY_EVERY == 0 {
                let snapshot = Throughput::compute(
                    state.processed.len(),
                    total,
                    report.attempted,
                    started.elapsed(),
                );
                self.log.throughput(&snapshot)?;
            }
            if report.attempted % interval == 0 {
                self.store.save(worker_id, &state)?;
                tracing::debug!(worker = worker_id, processed = state.processed.len(), "checkpoint saved");
            }
            throttle(self.settings.delay);
        }

        DictionaryFile::write(&self.settings.output, &state.dictionary)?;
        report.complete = words.iter().all(|word| state.is_processed(word));
        if report.complete {
            self.store.remove(worker_id)?;
        } else {
            self.store.save(worker_id, &state)?;
        }
        self.log.footer(
            worker_id,
            state.dictionary.len(),
            &self.settings.output,
            report.complete,
        )?;
        tracing::info!(
            worker = worker_id,
            entries = state.dictionary.len(),
            attempted = report.attempted,
            failed = report.failed,
            skipped = report.skipped,
            complete = report.complete,
            "worker finished"
        );
        report.state = state;
        Ok(report)
    }
}

fn throttle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
