//! Round-based upload/download benchmark for filedrop and any server exposing the same
//! `/upload/{name}` and `/download/{name}` routes.
//!
//! Each round grows the file list by `files_per_round` and, for every configured server, times a
//! sequential upload, a sequential download, a concurrent upload and a concurrent download. The
//! per-round durations end up in `results.csv` (sequential) and `results_mn.csv` (concurrent).

pub mod config;
pub mod report;
pub mod rounds;
pub mod servers;

pub use config::{Args, BenchmarkConfig, ServerConfig};
pub use rounds::{Results, run_rounds};
