// src/load/mod.rs

use anyhow::Result;
use arrow::array::Array;
use async_trait::async_trait;
use std::io::Write;

pub mod file;
pub mod postgres;

pub use file::{read_delimited, resolve_path, write_delimited, write_parquet, FileSink};
pub use postgres::{bulk_load, copy_statement, csv_payload, stream_copy, CopyStream, PostgresSink};

use crate::process::TradeBatch;

/// A destination for normalized batches.
#[async_trait]
pub trait Sink: Send {
    /// Deliver `batch` in full or not at all. `tag` names the batch: the period
    /// in per-period runs, the covered range otherwise. Returns rows written.
    async fn load(&mut self, batch: &TradeBatch, tag: &str) -> Result<u64>;
}

/// Write every row of `batch` as a CSV record, no header.
pub(crate) fn write_records<W: Write>(wtr: &mut csv::Writer<W>, batch: &TradeBatch) -> Result<u64> {
    let columns = batch.string_columns()?;
    for row in 0..batch.num_rows() {
        wtr.write_record(
            columns
                .iter()
                .map(|col| if col.is_null(row) { "" } else { col.value(row) }),
        )?;
    }
    Ok(batch.num_rows() as u64)
}
