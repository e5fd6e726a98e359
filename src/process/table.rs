// src/process/table.rs

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, AsArray, StringArray},
    compute::concat_batches,
    datatypes::SchemaRef,
    record_batch::RecordBatch,
};
use std::sync::Arc;

use crate::schema::build_arrow_schema;

/// An in-memory trade table: an Arrow batch whose columns are all non-null `Utf8`.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeBatch {
    batch: RecordBatch,
}

impl TradeBatch {
    /// Build from column-major data; every column must have the same length.
    pub fn from_columns<S: AsRef<str>>(names: &[S], columns: Vec<Vec<String>>) -> Result<Self> {
        let schema = build_arrow_schema(names);
        let arrays: Vec<ArrayRef> = columns
            .into_iter()
            .map(|values| Arc::new(StringArray::from(values)) as ArrayRef)
            .collect();
        let batch = RecordBatch::try_new(schema, arrays).context("building trade batch")?;
        Ok(Self { batch })
    }

    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            batch: RecordBatch::new_empty(schema),
        }
    }

    /// Stack `batches` in order. All must share `schema`.
    pub fn concat(schema: &SchemaRef, batches: &[TradeBatch]) -> Result<Self> {
        let batch = concat_batches(schema, batches.iter().map(|b| &b.batch))
            .context("concatenating trade batches")?;
        Ok(Self { batch })
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&StringArray> {
        let idx = self.batch.schema().index_of(name).ok()?;
        self.batch.column(idx).as_string_opt::<i32>()
    }

    /// All columns in schema order.
    pub fn string_columns(&self) -> Result<Vec<&StringArray>> {
        self.batch
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| {
                col.as_string_opt::<i32>()
                    .ok_or_else(|| anyhow!("column {} is {:?}, expected Utf8", i, col.data_type()))
            })
            .collect()
    }

    /// Cells of row `row`, in column order. Nulls read as empty strings.
    pub fn row(&self, row: usize) -> Result<Vec<&str>> {
        Ok(self
            .string_columns()?
            .into_iter()
            .map(|col| if col.is_null(row) { "" } else { col.value(row) })
            .collect())
    }
}
