// src/load/file.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};
use tracing::info;

use super::{write_records, Sink};
use crate::config::{FileFormat, PERIOD_PLACEHOLDER};
use crate::process::TradeBatch;

/// Substitute `{period}` in `template` with `tag`.
pub fn resolve_path(template: &Path, tag: &str) -> PathBuf {
    let raw = template.to_string_lossy();
    if raw.contains(PERIOD_PLACEHOLDER) {
        PathBuf::from(raw.replace(PERIOD_PLACEHOLDER, tag))
    } else {
        template.to_path_buf()
    }
}

/// Write to `.<name>.tmp` next to `path`, then rename over it.
fn write_atomically<F>(path: &Path, write: F) -> Result<u64>
where
    F: FnOnce(File) -> Result<u64>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let file_name = path
        .file_name()
        .with_context(|| format!("{:?} has no file name", path))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    let file = File::create(&tmp).with_context(|| format!("creating {:?}", tmp))?;
    let rows = write(file)?;
    fs::rename(&tmp, path).with_context(|| format!("renaming {:?} to {:?}", tmp, path))?;
    Ok(rows)
}

/// Header line plus one record per row, overwriting `path`.
pub fn write_delimited(batch: &TradeBatch, path: &Path, delimiter: u8) -> Result<u64> {
    write_atomically(path, |file| {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(BufWriter::new(file));
        wtr.write_record(batch.column_names())?;
        let rows = write_records(&mut wtr, batch)?;
        wtr.flush()?;
        Ok(rows)
    })
    .with_context(|| format!("writing {:?}", path))
}

/// The same table as Snappy-compressed Parquet, overwriting `path`.
pub fn write_parquet(batch: &TradeBatch, path: &Path) -> Result<u64> {
    write_atomically(path, |file| {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
            .context("creating Arrow writer")?;
        writer
            .write(batch.record_batch())
            .context("writing record batch")?;
        writer.close().context("closing Parquet writer")?;
        Ok(batch.num_rows() as u64)
    })
    .with_context(|| format!("writing {:?}", path))
}

/// Read a file produced by [`write_delimited`] back into a table.
pub fn read_delimited(path: &Path, delimiter: u8) -> Result<TradeBatch> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {:?}", path))?;
    let names: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for record in rdr.records() {
        let record = record.with_context(|| format!("reading {:?}", path))?;
        for (col, value) in columns.iter_mut().zip(record.iter()) {
            col.push(value.to_string());
        }
    }
    TradeBatch::from_columns(&names, columns)
}

/// Writes each batch to a file; `{period}` in the path is replaced by the batch tag.
pub struct FileSink {
    path: PathBuf,
    delimiter: u8,
    format: FileFormat,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, delimiter: u8, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            delimiter,
            format,
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn load(&mut self, batch: &TradeBatch, tag: &str) -> Result<u64> {
        let path = resolve_path(&self.path, tag);
        let rows = match self.format {
            FileFormat::Delimited => write_delimited(batch, &path, self.delimiter)?,
            FileFormat::Parquet => write_parquet(batch, &path)?,
        };
        info!(tag, path = %path.display(), rows, "file written");
        Ok(rows)
    }
}
