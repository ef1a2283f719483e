//! Benchmark configuration.
//!
//! Loaded from a YAML file (default `benchmark.yaml`, override with `-f` or `BENCHMARK_CONFIG`)
//! with `BENCHMARK_`-prefixed environment overrides, `__` separating nested keys:
//!
//! ```bash
//! BENCHMARK_ROUNDS=10
//! BENCHMARK_FILES_PER_ROUND=50
//! BENCHMARK_STARTUP_DELAY=2s
//! ```
//!
//! The prefix differs from the server's `FILEDROP_` on purpose: spawned servers inherit the
//! driver's environment and reject keys they do not know.

use anyhow::{Context, bail};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the large text file appended after the JSON records.
pub const LARGE_FILE_NAME: &str = "large_text_file.txt";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to benchmark configuration file
    #[arg(short = 'f', long, env = "BENCHMARK_CONFIG", default_value = "benchmark.yaml")]
    pub config: String,
}

/// One server under test.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Label used in logs and as the CSV row name
    pub name: String,
    /// Base URL, e.g. `http://localhost:9001`
    pub url: String,
    /// Program and arguments to spawn the server; unset means it is already running
    #[serde(default)]
    pub command: Option<Vec<String>>,
    /// Extra environment variables for the spawned process
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ServerConfig {
    pub fn base_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse(&self.url).with_context(|| format!("server '{}' has an invalid url", self.name))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            bail!("server '{}' url must be an http(s) base url, got {}", self.name, self.url);
        }
        Ok(url)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchmarkConfig {
    /// Servers in the order they are exercised each round
    pub servers: Vec<ServerConfig>,
    /// Directory holding `file_<n>.json` and the large text file
    pub data_dir: PathBuf,
    /// Number of JSON records to use, `file_1.json` through `file_<record_count>.json`
    pub record_count: usize,
    /// Append the large text file to the file list
    pub include_large_file: bool,
    pub rounds: usize,
    /// Round `r` uses the first `files_per_round * r` files
    pub files_per_round: usize,
    /// Workers in the concurrent phases; 0 means one in-flight request per file
    pub concurrency: usize,
    /// Server upload directory to wipe before each server's turn
    pub uploads_dir: Option<PathBuf>,
    /// Where `results.csv` and `results_mn.csv` are written
    pub results_dir: PathBuf,
    /// Health probe path appended to each server url
    pub health_path: String,
    /// Wait after spawning a server before probing it
    #[serde(with = "humantime_serde")]
    pub startup_delay: Duration,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            data_dir: PathBuf::from("data"),
            record_count: 1000,
            include_large_file: true,
            rounds: 100,
            files_per_round: 1000,
            concurrency: 0,
            uploads_dir: None,
            results_dir: PathBuf::from("results"),
            health_path: "/healthz".to_string(),
            startup_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10 * 60),
        }
    }
}

impl BenchmarkConfig {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(format!("{:#}", e)))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("BENCHMARK_").split("__").ignore(&["config"]))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rounds == 0 {
            bail!("Config validation: rounds must be greater than 0");
        }
        if self.files_per_round == 0 {
            bail!("Config validation: files_per_round must be greater than 0");
        }
        if self.servers.is_empty() {
            bail!("Config validation: at least one server must be configured");
        }
        if self.files().is_empty() {
            bail!("Config validation: record_count is 0 and include_large_file is false, nothing to transfer");
        }

        let mut names = HashSet::new();
        for server in &self.servers {
            if !names.insert(server.name.as_str()) {
                bail!("Config validation: duplicate server name '{}'", server.name);
            }
            server.base_url()?;
            if matches!(&server.command, Some(command) if command.is_empty()) {
                bail!("Config validation: server '{}' has an empty command", server.name);
            }
        }

        Ok(())
    }

    /// Every file the benchmark transfers, in order.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = (1..=self.record_count)
            .map(|n| self.data_dir.join(format!("file_{}.json", n)))
            .collect();
        if self.include_large_file {
            files.push(self.data_dir.join(LARGE_FILE_NAME));
        }
        files
    }

    /// Number of files used in `round` (1-based).
    pub fn files_in_round(&self, round: usize, total: usize) -> usize {
        self.files_per_round.saturating_mul(round).min(total)
    }
}
