//! The benchmark loop: rounds over servers, each running four timed transfer phases.

use crate::config::BenchmarkConfig;
use crate::servers::probe;
use anyhow::{Context, bail};
use hdrhistogram::Histogram;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Url};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    fn route(self) -> &'static str {
        match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        }
    }
}

/// Timing of one phase: wall-clock time for the whole file list plus per-request latencies of
/// the successful requests.
#[derive(Debug, Clone, Default)]
pub struct PhaseResult {
    pub elapsed: Duration,
    pub latencies: Vec<Duration>,
    pub failures: usize,
}

/// Per-server series of phase durations in milliseconds, in configured server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Series {
    entries: Vec<(String, Vec<u64>)>,
}

impl Series {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entries: names.into_iter().map(|name| (name.to_string(), Vec::new())).collect(),
        }
    }

    pub fn push(&mut self, server: &str, millis: u64) {
        match self.entries.iter_mut().find(|(name, _)| name == server) {
            Some((_, values)) => values.push(millis),
            None => self.entries.push((server.to_string(), vec![millis])),
        }
    }

    /// Rounds recorded for the first server; this sizes the CSV header.
    pub fn rounds(&self) -> usize {
        self.entries.first().map(|(_, values)| values.len()).unwrap_or(0)
    }

    pub fn entries(&self) -> &[(String, Vec<u64>)] {
        &self.entries
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, Default)]
pub struct Results {
    pub upload: Series,
    pub download: Series,
    pub upload_parallel: Series,
    pub download_parallel: Series,
    /// Requests that got a non-success response or failed in a concurrent phase
    pub failures: usize,
}

/// p50/p90/p99/max in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub count: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub max: u64,
}

pub fn summarize(latencies: &[Duration]) -> anyhow::Result<Option<LatencySummary>> {
    if latencies.is_empty() {
        return Ok(None);
    }

    let mut histogram = Histogram::<u64>::new(3)?;
    for latency in latencies {
        histogram.record(latency.as_millis() as u64)?;
    }

    Ok(Some(LatencySummary {
        count: histogram.len(),
        p50: histogram.value_at_percentile(50.0),
        p90: histogram.value_at_percentile(90.0),
        p99: histogram.value_at_percentile(99.0),
        max: histogram.max(),
    }))
}

fn endpoint(base: &Url, direction: Direction, path: &Path) -> anyhow::Result<Url> {
    let name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?
        .to_string_lossy();

    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("{} cannot be a base url", base))?
        .pop_if_empty()
        .push(direction.route())
        .push(&name);
    Ok(url)
}

/// Error from a single transfer. Local I/O problems are kept apart from transport failures.
#[derive(Debug, thiserror::Error)]
enum TransferError {
    #[error("local file error: {0}")]
    Local(#[from] io::Error),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// One request. Returns its latency and whether the server answered with a 2xx.
async fn transfer(client: &Client, url: Url, path: &Path, direction: Direction) -> Result<(Duration, bool), TransferError> {
    let start = Instant::now();

    let mut response = match direction {
        Direction::Upload => {
            let file = tokio::fs::File::open(path).await?;
            let len = file.metadata().await?.len();
            client
                .post(url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(CONTENT_LENGTH, len)
                .body(Body::wrap_stream(ReaderStream::new(file)))
                .send()
                .await?
        }
        Direction::Download => client.get(url).send().await?,
    };

    let status = response.status();
    // Drain the body so the connection can be reused
    while response.chunk().await?.is_some() {}

    Ok((start.elapsed(), status.is_success()))
}

/// Transfer every file one after another. Any transport or local error aborts the phase.
pub async fn run_sequential(client: &Client, base: &Url, files: &[PathBuf], direction: Direction) -> anyhow::Result<PhaseResult> {
    let mut result = PhaseResult::default();
    let start = Instant::now();

    for path in files {
        let url = endpoint(base, direction, path)?;
        let (latency, success) = transfer(client, url.clone(), path, direction)
            .await
            .with_context(|| format!("{:?} of {} to {} failed", direction, path.display(), url))?;

        if success {
            result.latencies.push(latency);
        } else {
            warn!(file = %path.display(), %url, "Server answered with a non-success status");
            result.failures += 1;
        }
    }

    result.elapsed = start.elapsed();
    Ok(result)
}

/// Transfer the files from `concurrency` worker tasks (one per file when 0). Failures are logged
/// and counted, never fatal.
pub async fn run_concurrent(client: &Client, base: &Url, files: &[PathBuf], direction: Direction, concurrency: usize) -> PhaseResult {
    let total = files.len();
    if total == 0 {
        return PhaseResult::default();
    }

    let workers_count = if concurrency == 0 { total } else { concurrency.min(total) };
    let files_per_worker = total / workers_count;
    let remaining_files = total % workers_count;

    let (tx, mut rx) = mpsc::channel::<Option<Duration>>(total);
    let start = Instant::now();

    let mut workers = Vec::with_capacity(workers_count);
    let mut offset = 0;
    for i in 0..workers_count {
        let count = files_per_worker + if i < remaining_files { 1 } else { 0 };
        let chunk: Vec<PathBuf> = files[offset..offset + count].to_vec();
        offset += count;

        let client = client.clone();
        let base = base.clone();
        let tx = tx.clone();

        workers.push(tokio::spawn(async move {
            for path in chunk {
                let outcome = match endpoint(&base, direction, &path) {
                    Ok(url) => match transfer(&client, url, &path, direction).await {
                        Ok((latency, true)) => Some(latency),
                        Ok((_, false)) => {
                            warn!(file = %path.display(), "Server answered with a non-success status");
                            None
                        }
                        Err(e) => {
                            warn!(file = %path.display(), error = %e, "Concurrent {:?} failed", direction);
                            None
                        }
                    },
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "Could not build request url");
                        None
                    }
                };
                if tx.send(outcome).await.is_err() {
                    error!("Failed to send outcome to channel");
                }
            }
        }));
    }

    drop(tx);

    for worker in workers {
        if let Err(e) = worker.await {
            error!("Worker task failed: {}", e);
        }
    }

    let elapsed = start.elapsed();
    let mut result = PhaseResult {
        elapsed,
        ..Default::default()
    };

    while let Some(outcome) = rx.recv().await {
        match outcome {
            Some(latency) => result.latencies.push(latency),
            None => result.failures += 1,
        }
    }
    // Files whose worker panicked never reported
    result.failures += total - result.latencies.len() - result.failures;

    result
}

/// Remove and recreate the server's upload directory.
pub async fn clear_uploads(dir: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Failed to clear {}", dir.display())),
    }
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))
}

fn log_phase(server: &str, phase: &str, files: usize, result: &PhaseResult) -> anyhow::Result<()> {
    match summarize(&result.latencies)? {
        Some(summary) => info!(
            server,
            phase,
            files,
            elapsed_ms = result.elapsed.as_millis() as u64,
            failures = result.failures,
            p50_ms = summary.p50,
            p90_ms = summary.p90,
            p99_ms = summary.p99,
            max_ms = summary.max,
            "Phase complete"
        ),
        None => warn!(
            server,
            phase,
            files,
            elapsed_ms = result.elapsed.as_millis() as u64,
            failures = result.failures,
            "Phase complete without a single successful request"
        ),
    }
    Ok(())
}

/// Run all rounds against all configured servers.
pub async fn run_rounds(config: &BenchmarkConfig, client: &Client) -> anyhow::Result<Results> {
    let files = config.files();
    if let Some(missing) = files.iter().find(|path| !path.is_file()) {
        bail!(
            "Benchmark data file {} does not exist; generate it with `cargo run -p xtask -- generate-data`",
            missing.display()
        );
    }

    let bases = config
        .servers
        .iter()
        .map(|server| server.base_url())
        .collect::<anyhow::Result<Vec<_>>>()?;

    let names = || config.servers.iter().map(|server| server.name.as_str());
    let mut results = Results {
        upload: Series::new(names()),
        download: Series::new(names()),
        upload_parallel: Series::new(names()),
        download_parallel: Series::new(names()),
        failures: 0,
    };

    for round in 1..=config.rounds {
        let current = &files[..config.files_in_round(round, files.len())];
        debug!(round, files = current.len(), "Starting round");

        for (server, base) in config.servers.iter().zip(&bases) {
            if let Some(dir) = &config.uploads_dir {
                clear_uploads(dir).await?;
            }

            if let Err(e) = probe(client, server, &config.health_path).await {
                warn!(server = %server.name, error = %e, "Skipping server as it is not available");
                continue;
            }

            let upload = run_sequential(client, base, current, Direction::Upload)
                .await
                .with_context(|| format!("Error during upload to server {}", server.name))?;
            let download = run_sequential(client, base, current, Direction::Download)
                .await
                .with_context(|| format!("Error during download from server {}", server.name))?;
            let upload_parallel = run_concurrent(client, base, current, Direction::Upload, config.concurrency).await;
            let download_parallel = run_concurrent(client, base, current, Direction::Download, config.concurrency).await;

            for (phase, series, result) in [
                ("upload", &mut results.upload, &upload),
                ("download", &mut results.download, &download),
                ("upload (parallel)", &mut results.upload_parallel, &upload_parallel),
                ("download (parallel)", &mut results.download_parallel, &download_parallel),
            ] {
                log_phase(&server.name, phase, current.len(), result)?;
                series.push(&server.name, result.elapsed.as_millis() as u64);
                results.failures += result.failures;
            }
        }

        let progress = (round as f64 / config.rounds as f64 * 10000.0).round() / 100.0;
        info!("Test round {} completed ({:.2}%)", round, progress);
    }

    Ok(results)
}
