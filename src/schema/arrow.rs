// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, SchemaRef};
use std::sync::Arc;

/// Arrow schema for a normalized trade table: every column is non-null `Utf8`,
/// mirroring the API which returns all cells as text.
pub fn build_arrow_schema<S: AsRef<str>>(columns: &[S]) -> SchemaRef {
    let fields: Vec<ArrowField> = columns
        .iter()
        .map(|name| ArrowField::new(name.as_ref(), DataType::Utf8, false))
        .collect();
    Arc::new(ArrowSchema::new(fields))
}
