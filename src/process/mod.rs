// src/process/mod.rs

use anyhow::{bail, Context, Result};
use std::collections::HashSet;

pub mod table;

pub use table::TradeBatch;

use crate::period::Period;
use crate::schema::{build_arrow_schema, DirectionSchemas, RawRecord, TradeDirection};

/// Natural key of a row: `{year}_{month}_{country}_{commodity}_{direction}`.
pub fn row_identifier(
    year: &str,
    month: &str,
    country_code: &str,
    commodity_code: &str,
    direction: TradeDirection,
) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        year, month, country_code, commodity_code, direction
    )
}

/// Reshape the raw rows of the three directions into one table:
///
/// 1) drop the two trailing echo columns of every row,
/// 2) tag each row with its direction,
/// 3) take the general-import column names for all three (positional rename),
/// 4) split `time` into `year` and `month`,
/// 5) append the row identifier,
/// 6) stack general imports, consumption imports and exports, in that order.
pub fn normalize(
    imports_general: Vec<RawRecord>,
    imports_consumption: Vec<RawRecord>,
    exports: Vec<RawRecord>,
    schemas: &DirectionSchemas,
) -> Result<TradeBatch> {
    let columns = schemas.output_columns();
    let schema = build_arrow_schema(&columns);

    let tables = [
        (TradeDirection::ImportsGeneral, imports_general),
        (TradeDirection::ImportsConsumption, imports_consumption),
        (TradeDirection::Exports, exports),
    ]
    .into_iter()
    .map(|(direction, rows)| {
        direction_table(direction, rows, schemas, &columns)
            .with_context(|| format!("reshaping {} rows", direction))
    })
    .collect::<Result<Vec<_>>>()?;

    TradeBatch::concat(&schema, &tables)
}

fn direction_table(
    direction: TradeDirection,
    rows: Vec<RawRecord>,
    schemas: &DirectionSchemas,
    columns: &[String],
) -> Result<TradeBatch> {
    let arity = schemas.get(direction).response_arity();
    let n_fields = schemas.field_names().len();
    let commodity_idx = schemas.commodity_index();
    let country_idx = schemas.country_index();

    let mut data: Vec<Vec<String>> = vec![Vec::with_capacity(rows.len()); columns.len()];

    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != arity {
            bail!("row {} has {} cells, expected {}", i, row.len(), arity);
        }
        // `time` sits right after the requested fields
        let time = &row[n_fields];
        let period: Period = time
            .parse()
            .with_context(|| format!("row {} has time `{}`", i, time))?;
        let (year, month) = period.year_month_strings();
        let id = row_identifier(
            &year,
            &month,
            &row[country_idx],
            &row[commodity_idx],
            direction,
        );

        for (col, value) in data.iter_mut().zip(row.into_iter().take(n_fields)) {
            col.push(value);
        }
        data[n_fields].push(direction.as_str().to_string());
        data[n_fields + 1].push(year);
        data[n_fields + 2].push(month);
        data[n_fields + 3].push(id);
    }

    TradeBatch::from_columns(columns, data)
}

/// Identifiers that occur more than once in `batch`, in first-repeat order.
pub fn duplicate_identifiers(batch: &TradeBatch) -> Vec<String> {
    let Some(ids) = batch.column("id") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut dupes = Vec::new();
    for id in ids.iter().flatten() {
        if !seen.insert(id) && !dupes.iter().any(|d| d == id) {
            dupes.push(id.to_string());
        }
    }
    dupes
}
