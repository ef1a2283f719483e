//! Development tasks for filedrop
//!
//! ## Commands
//!
//! - `xtask generate-data` - Write the benchmark data set: `file_<n>.json` records plus
//!   `large_text_file.txt`

mod generate;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use generate::GenerateOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development tasks for filedrop")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate random JSON records and a large text file for the benchmark
    GenerateData(GenerateDataArgs),
}

#[derive(Args)]
struct GenerateDataArgs {
    /// Directory to write the files into (created if missing)
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,

    /// Number of JSON record files
    #[arg(long, default_value_t = 100_000)]
    records: usize,

    /// Minimum size of the large text file in bytes
    #[arg(long, default_value_t = 1024 * 1024 * 1024)]
    large_file_bytes: u64,

    /// Characters per line of the large text file, excluding the newline
    #[arg(long, default_value_t = 10024)]
    line_length: usize,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateData(args) => {
            println!("Generating benchmark data...");
            println!("  Output directory: {}", args.out_dir.display());
            println!("  Records: {}", args.records);
            println!("  Large file threshold: {} bytes", args.large_file_bytes);

            let summary = generate::generate(&GenerateOptions {
                out_dir: args.out_dir.clone(),
                records: args.records,
                large_file_bytes: args.large_file_bytes,
                line_length: args.line_length,
                seed: args.seed,
            })?;

            println!(
                "Wrote {} records and {} ({} bytes) to {}",
                summary.records,
                summary.large_file.display(),
                summary.large_file_bytes,
                args.out_dir.display()
            );
        }
    }

    Ok(())
}
