// src/load/postgres.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnection, PgCopyIn},
    Connection,
};
use tracing::{debug, info, warn};

use super::{write_records, Sink};
use crate::process::TradeBatch;

/// Size of each write into the COPY stream.
pub const COPY_CHUNK_BYTES: usize = 8 * 1024;

/// Quote a possibly schema-qualified table name, one identifier per dot-separated part.
pub fn quote_table_name(table: &str) -> String {
    table
        .split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

pub fn copy_statement(table: &str) -> String {
    format!(
        "COPY {} FROM STDIN WITH (FORMAT CSV)",
        quote_table_name(table)
    )
}

/// Headerless CSV of the whole batch, in column order.
pub fn csv_payload(batch: &TradeBatch) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    write_records(&mut wtr, batch)?;
    wtr.into_inner().context("flushing CSV payload")
}

/// The receiving end of a `COPY ... FROM STDIN`.
#[async_trait]
pub trait CopyStream: Send + Sized {
    async fn send(&mut self, chunk: &[u8]) -> Result<()>;
    /// Rows accepted by the server.
    async fn finish(self) -> Result<u64>;
    async fn abort(self, reason: &str) -> Result<()>;
}

#[async_trait]
impl<'c> CopyStream for PgCopyIn<&'c mut PgConnection> {
    async fn send(&mut self, chunk: &[u8]) -> Result<()> {
        PgCopyIn::send(self, chunk).await?;
        Ok(())
    }

    async fn finish(self) -> Result<u64> {
        Ok(PgCopyIn::finish(self).await?)
    }

    async fn abort(self, reason: &str) -> Result<()> {
        Ok(PgCopyIn::abort(self, reason).await?)
    }
}

/// Send `payload` in `COPY_CHUNK_BYTES` pieces, then finish. A failed write
/// aborts the copy and `finish` is never reached.
pub async fn stream_copy<C: CopyStream>(mut copy: C, payload: &[u8]) -> Result<u64> {
    for chunk in payload.chunks(COPY_CHUNK_BYTES) {
        if let Err(e) = copy.send(chunk).await {
            if let Err(abort_err) = copy.abort("client write failed").await {
                debug!(error = %abort_err, "abort after failed write");
            }
            return Err(e).context("streaming COPY payload");
        }
    }
    copy.finish().await.context("COPY rejected")
}

/// COPY `batch` into `table` inside one transaction. Nothing is committed
/// unless every row is accepted.
pub async fn bulk_load(conn: &mut PgConnection, table: &str, batch: &TradeBatch) -> Result<u64> {
    let payload = csv_payload(batch)?;
    let statement = copy_statement(table);

    let mut tx = conn.begin().await.context("starting transaction")?;
    let copy = tx
        .copy_in_raw(&statement)
        .await
        .with_context(|| format!("starting `{}`", statement))?;
    // an early return drops `tx`, which rolls back
    let rows = stream_copy(copy, &payload).await?;
    tx.commit().await.context("committing COPY")?;
    Ok(rows)
}

/// Bulk loads into a pre-created table, one connection per `load` call.
pub struct PostgresSink {
    url: String,
    table: String,
}

impl PostgresSink {
    pub fn new(url: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            table: table.into(),
        }
    }
}

#[async_trait]
impl Sink for PostgresSink {
    async fn load(&mut self, batch: &TradeBatch, tag: &str) -> Result<u64> {
        if batch.is_empty() {
            debug!(tag, table = %self.table, "empty batch, nothing to copy");
            return Ok(0);
        }

        let mut conn = PgConnection::connect(&self.url)
            .await
            .context("connecting to PostgreSQL")?;
        let result = bulk_load(&mut conn, &self.table, batch).await;
        if let Err(e) = conn.close().await {
            warn!(error = %e, "closing PostgreSQL connection");
        }

        let rows = result.with_context(|| format!("loading {} into {}", tag, self.table))?;
        info!(tag, table = %self.table, rows, "copied");
        Ok(rows)
    }
}
