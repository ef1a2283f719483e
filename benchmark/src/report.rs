//! CSV output of the collected series.

use crate::rounds::{Results, Series};
use anyhow::Context;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SEQUENTIAL_FILE: &str = "results.csv";
pub const CONCURRENT_FILE: &str = "results_mn.csv";

/// Header row `<label>,1,..,<n>` then one `<server>,<ms>,..` row per server.
pub fn write_section<W: Write>(writer: &mut csv::Writer<W>, label: &str, series: &Series) -> anyhow::Result<()> {
    let mut header = vec![label.to_string()];
    header.extend((1..=series.rounds()).map(|round| round.to_string()));
    writer.write_record(&header)?;

    for (server, values) in series.entries() {
        let mut row = vec![server.clone()];
        row.extend(values.iter().map(|ms| ms.to_string()));
        writer.write_record(&row)?;
    }

    Ok(())
}

fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        // Servers skipped in some rounds have shorter rows
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out)
}

fn finish<W: Write>(writer: csv::Writer<W>) -> anyhow::Result<W> {
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))
}

/// Two sections separated by a blank line.
pub fn write_sections<W: Write>(out: W, first: (&str, &Series), second: (&str, &Series)) -> anyhow::Result<W> {
    let mut writer = csv_writer(out);
    write_section(&mut writer, first.0, first.1)?;

    // csv writes an empty record as `""`, so the separator goes to the inner writer
    let mut out = finish(writer)?;
    out.write_all(b"\n")?;

    let mut writer = csv_writer(out);
    write_section(&mut writer, second.0, second.1)?;
    finish(writer)
}

/// Write `results.csv` and `results_mn.csv` into `dir`, creating it if needed.
pub fn write_results(dir: &Path, results: &Results) -> anyhow::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let sequential = dir.join(SEQUENTIAL_FILE);
    let file = File::create(&sequential).with_context(|| format!("Failed to create {}", sequential.display()))?;
    write_sections(file, ("Server up", &results.upload), ("Server dw", &results.download))
        .with_context(|| format!("Failed to write {}", sequential.display()))?;

    let concurrent = dir.join(CONCURRENT_FILE);
    let file = File::create(&concurrent).with_context(|| format!("Failed to create {}", concurrent.display()))?;
    write_sections(
        file,
        ("Server up (parallel)", &results.upload_parallel),
        ("Server dw (parallel)", &results.download_parallel),
    )
    .with_context(|| format!("Failed to write {}", concurrent.display()))?;

    Ok((sequential, concurrent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(rows: &[(&str, &[u64])]) -> Series {
        let mut series = Series::new(rows.iter().map(|(name, _)| *name));
        for (name, values) in rows {
            for value in *values {
                series.push(name, *value);
            }
        }
        series
    }

    #[test]
    fn test_sections_layout() {
        let up = series(&[("axum", &[12, 30, 41]), ("actix", &[10, 28, 40])]);
        let down = series(&[("axum", &[5, 9, 13]), ("actix", &[4, 8])]);

        let out = write_sections(Vec::new(), ("Server up", &up), ("Server dw", &down)).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "Server up,1,2,3\n\
             axum,12,30,41\n\
             actix,10,28,40\n\
             \n\
             Server dw,1,2,3\n\
             axum,5,9,13\n\
             actix,4,8\n"
        );
    }

    #[test]
    fn test_header_follows_first_server() {
        // First server skipped every round: the header has no round columns
        let up = series(&[("down", &[]), ("axum", &[7])]);
        let out = write_sections(Vec::new(), ("Server up", &up), ("Server dw", &Series::default())).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Server up\ndown\naxum,7\n\nServer dw\n");
    }

    #[test]
    fn test_write_results_creates_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let results_dir = dir.path().join("results");

        let results = Results {
            upload: series(&[("axum", &[1])]),
            download: series(&[("axum", &[2])]),
            upload_parallel: series(&[("axum", &[3])]),
            download_parallel: series(&[("axum", &[4])]),
            failures: 0,
        };

        let (sequential, concurrent) = write_results(&results_dir, &results).unwrap();

        assert_eq!(
            std::fs::read_to_string(sequential).unwrap(),
            "Server up,1\naxum,1\n\nServer dw,1\naxum,2\n"
        );
        assert_eq!(
            std::fs::read_to_string(concurrent).unwrap(),
            "Server up (parallel),1\naxum,3\n\nServer dw (parallel),1\naxum,4\n"
        );
    }
}
