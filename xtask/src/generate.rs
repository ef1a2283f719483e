//! Benchmark data: small random JSON records plus one large random text file.

use anyhow::{Context, Result};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const LARGE_FILE_NAME: &str = "large_text_file.txt";

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TEXT: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 ";

/// One generated JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// In `1..=1000`
    pub id: u32,
    /// 10 ASCII letters
    pub name: String,
    /// In `[0, 1)`
    pub value: f64,
    /// 20 ASCII letters or digits
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub out_dir: PathBuf,
    pub records: usize,
    pub large_file_bytes: u64,
    pub line_length: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GenerateSummary {
    pub records: usize,
    pub large_file: PathBuf,
    pub large_file_bytes: u64,
}

fn random_string<R: Rng>(rng: &mut R, charset: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| charset.choose(rng).copied().unwrap_or(b'a') as char)
        .collect()
}

pub fn generate_record<R: Rng>(rng: &mut R) -> Record {
    Record {
        id: rng.gen_range(1..=1000),
        name: random_string(rng, LETTERS, 10),
        value: rng.r#gen::<f64>(),
        description: random_string(rng, ALPHANUMERIC, 20),
    }
}

/// Write `file_1.json` ..= `file_<count>.json` into `dir`, each holding one fresh record.
pub fn write_records<R: Rng>(dir: &Path, count: usize, rng: &mut R) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(count);

    for n in 1..=count {
        let path = dir.join(format!("file_{}.json", n));
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, &generate_record(rng))?;
        writer.flush()?;
        paths.push(path);
    }

    Ok(paths)
}

/// Append random lines of `line_length` characters (plus `\n`) until the file reaches
/// `threshold` bytes. The size is checked before each line, so the result overshoots by less
/// than one line. Returns the final size.
pub fn write_large_text_file<R: Rng>(path: &Path, threshold: u64, line_length: usize, rng: &mut R) -> io::Result<u64> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut size = 0u64;
    let mut line = Vec::with_capacity(line_length + 1);

    while size < threshold {
        line.clear();
        line.extend((0..line_length).map(|_| TEXT.choose(rng).copied().unwrap_or(b' ')));
        line.push(b'\n');

        writer.write_all(&line)?;
        size += line.len() as u64;
    }

    writer.flush()?;
    Ok(size)
}

pub fn generate(options: &GenerateOptions) -> Result<GenerateSummary> {
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("Failed to create {}", options.out_dir.display()))?;

    let records = write_records(&options.out_dir, options.records, &mut rng)
        .with_context(|| format!("Failed to write records into {}", options.out_dir.display()))?;

    let large_file = options.out_dir.join(LARGE_FILE_NAME);
    let large_file_bytes = write_large_text_file(&large_file, options.large_file_bytes, options.line_length, &mut rng)
        .with_context(|| format!("Failed to write {}", large_file.display()))?;

    Ok(GenerateSummary {
        records: records.len(),
        large_file,
        large_file_bytes,
    })
}
