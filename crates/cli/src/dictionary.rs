use std::env;
use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as ProcessCommand, Stdio};

use anyhow::{anyhow, bail, Context, Result};
use danki_core::{
    load_keys, merge_parts, partition, read_words, worker_range, write_merged, CheckpointStore,
    Enrichment, LlmEnricher, Merged, ProgressLog, Worker, WorkerReport, WorkerSettings,
};
use danki_llm::LlmClient;

use crate::config::DankiConfig;
use crate::logging;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPlan {
    pub worker_id: usize,
    pub range: Range<usize>,
    pub api_key: String,
    pub error_log: PathBuf,
}

/// One worker per key, each over its own contiguous slice of the list.
pub fn plan_launch(cfg: &DankiConfig, keys: Vec<String>, total_words: usize) -> Vec<WorkerPlan> {
    let ranges = partition(total_words, keys.len());
    keys.into_iter()
        .zip(ranges)
        .enumerate()
        .map(|(idx, (api_key, range))| WorkerPlan {
            worker_id: idx + 1,
            range,
            api_key,
            error_log: cfg.error_log_path(idx + 1),
        })
        .collect()
}

pub fn launch(cfg: &DankiConfig, config_path: &Path, yes: bool, wait: bool) -> Result<()> {
    let keys = load_keys(&cfg.keys_file, &cfg.key_pattern()?)?;
    let words = read_words(&cfg.word_list, cfg.start, cfg.word_limit())?;
    let plans = plan_launch(cfg, keys, words.len());
    let workers = plans.len();
    logging::stage(
        "launch",
        format!(
            "{} api keys, {} words, ~{} words per worker, provider {} ({})",
            workers,
            words.len(),
            words.len() / workers.max(1),
            cfg.provider,
            cfg.model()?
        ),
    );
    if !yes && !confirm("Start building dictionary? (yes/no): ")? {
        logging::stage("launch", "cancelled");
        return Ok(());
    }
    fs::create_dir_all(&cfg.workdir)
        .with_context(|| format!("failed to create {}", cfg.workdir.display()))?;
    let exe = env::current_exe().context("cannot locate the danki executable")?;
    let mut children: Vec<(usize, Child)> = Vec::with_capacity(workers);
    for plan in &plans {
        let child = spawn_worker(&exe, config_path, plan, workers)?;
        logging::stage(
            "launch",
            format!(
                "worker {} launched (pid {}), words {}..{}, log {}",
                plan.worker_id,
                child.id(),
                plan.range.start,
                plan.range.end,
                cfg.log_path(plan.worker_id).display()
            ),
        );
        children.push((plan.worker_id, child));
    }
    logging::stage(
        "launch",
        format!(
            "checkpoints every {} words; run launch again after an interruption to resume",
            cfg.checkpoint_interval
        ),
    );
    if !wait {
        return Ok(());
    }
    let mut failed = Vec::new();
    for (worker_id, mut child) in children {
        let status = child
            .wait()
            .with_context(|| format!("failed to wait for worker {worker_id}"))?;
        if status.success() {
            tracing::info!(worker = worker_id, "worker exited");
        } else {
            tracing::error!(worker = worker_id, %status, "worker failed");
            failed.push(worker_id);
        }
    }
    if !failed.is_empty() {
        bail!("workers {failed:?} did not finish; see their error logs");
    }
    Ok(())
}

fn spawn_worker(exe: &Path, config_path: &Path, plan: &WorkerPlan, workers: usize) -> Result<Child> {
    let errors = File::create(&plan.error_log)
        .with_context(|| format!("failed to create {}", plan.error_log.display()))?;
    ProcessCommand::new(exe)
        .arg("--config")
        .arg(config_path)
        .arg("build")
        .arg("worker")
        .arg("--worker-id")
        .arg(plan.worker_id.to_string())
        .arg("--workers")
        .arg(workers.to_string())
        .env("DANKI_API_KEY", &plan.api_key)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(errors))
        .spawn()
        .with_context(|| format!("failed to start worker {}", plan.worker_id))
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn run_worker(cfg: &DankiConfig, worker_id: usize, workers: usize, api_key: &str) -> Result<()> {
    let client = LlmClient::new(cfg.provider()?, cfg.model()?, api_key, cfg.client_options())?;
    let enricher = LlmEnricher::new(client)?;
    let report = run_worker_with(cfg, worker_id, workers, |word| enricher.enrich(word))?;
    println!(
        "Worker {worker_id} {}: {} entries ({} attempted, {} skipped, {} failed)",
        if report.complete { "completed" } else { "stopped" },
        report.entries(),
        report.attempted,
        report.skipped,
        report.failed
    );
    Ok(())
}

fn run_worker_with<F>(
    cfg: &DankiConfig,
    worker_id: usize,
    workers: usize,
    enrich: F,
) -> Result<WorkerReport>
where
    F: FnMut(&str) -> danki_core::Result<Enrichment>,
{
    if worker_id == 0 || worker_id > workers {
        bail!("worker id must be between 1 and {workers}, got {worker_id}");
    }
    let all = read_words(&cfg.word_list, cfg.start, cfg.word_limit())?;
    let range = worker_range(all.len(), workers, worker_id)
        .ok_or_else(|| anyhow!("no range for worker {worker_id}"))?;
    let settings = WorkerSettings {
        worker_id,
        delay: cfg.delay(),
        checkpoint_interval: cfg.checkpoint_interval,
        output: cfg.part_path(worker_id),
    };
    let log = ProgressLog::append(&cfg.log_path(worker_id))?;
    let mut worker = Worker::new(settings, CheckpointStore::new(&cfg.workdir), log);
    Ok(worker.run(&all[range], enrich)?)
}

pub fn merge(cfg: &DankiConfig, workers: Option<usize>) -> Result<()> {
    let workers = match workers {
        Some(count) => count,
        None => load_keys(&cfg.keys_file, &cfg.key_pattern()?)?.len(),
    };
    let merged = merge_workers(cfg, workers)?;
    println!("Merging {workers} worker dictionaries...");
    for (idx, count) in merged.per_part.iter().enumerate() {
        println!("  Worker {}: {} entries", idx + 1, count);
    }
    println!("Merged dictionary saved: {}", cfg.merged_path().display());
    println!("   Total unique entries: {}", merged.total());
    println!("   Average per worker: {:.0}", merged.average_per_part());
    Ok(())
}

fn merge_workers(cfg: &DankiConfig, workers: usize) -> Result<Merged> {
    if workers == 0 {
        bail!("nothing to merge: zero workers");
    }
    let paths: Vec<PathBuf> = (1..=workers).map(|id| cfg.part_path(id)).collect();
    let merged = merge_parts(&paths)?;
    for collision in &merged.collisions {
        tracing::warn!(
            key = %collision.key,
            kept = collision.winner,
            dropped = collision.loser,
            "same key produced by two workers; keeping the later one"
        );
    }
    let unfinished = unfinished_workers(cfg, workers);
    if !unfinished.is_empty() {
        logging::stage(
            "merge",
            format!(
                "workers {unfinished:?} still have failed words; their parts are partial, \
                 rerun launch to retry them"
            ),
        );
    }
    write_merged(&cfg.merged_path(), &merged)?;
    Ok(merged)
}

/// A worker keeps its checkpoint only while some of its words failed.
fn unfinished_workers(cfg: &DankiConfig, workers: usize) -> Vec<usize> {
    let store = CheckpointStore::new(&cfg.workdir);
    (1..=workers).filter(|id| store.exists(*id)).collect()
}
