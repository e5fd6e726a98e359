// src/schema/fields.rs

use serde::{Deserialize, Serialize};

use super::types::TradeDirection;
use crate::config::ConfigError;

/// Column holding the partner country code; identical for both endpoints.
pub const COUNTRY_CODE_FIELD: &str = "CTY_CODE";

/// Columns the API appends after the requested fields: the `time` predicate,
/// an echo of the commodity predicate and the summary level. Only `time` is kept.
pub const TRAILING_COLUMNS: [&str; 3] = ["time", "hs_extra", "agg_extra"];

/// Derived columns appended by the reshaper, in output order.
pub const DERIVED_COLUMNS: [&str; 4] = ["direction", "year", "month", "id"];

/// A field list as written in configuration: either `"A,B,C"` or a YAML sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    Csv(String),
    List(Vec<String>),
}

impl FieldList {
    pub fn into_names(self) -> Vec<String> {
        let names: Vec<String> = match self {
            FieldList::Csv(s) => s.split(',').map(str::to_string).collect(),
            FieldList::List(v) => v,
        };
        names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// Ordered field declaration for one direction, with the columns the row
/// identifier is built from located up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    direction: TradeDirection,
    names: Vec<String>,
    commodity_idx: usize,
    country_idx: usize,
}

impl FieldSchema {
    pub fn new(direction: TradeDirection, names: Vec<String>) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Err(ConfigError::EmptyFieldList(direction));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ConfigError::DuplicateColumn {
                    direction,
                    column: name.clone(),
                });
            }
        }

        let commodity_field = direction.endpoint().commodity_param();
        let position = |column: &str| {
            names
                .iter()
                .position(|n| n == column)
                .ok_or_else(|| ConfigError::MissingColumn {
                    direction,
                    column: column.to_string(),
                })
        };
        let commodity_idx = position(commodity_field)?;
        let country_idx = position(COUNTRY_CODE_FIELD)?;

        Ok(Self {
            direction,
            names,
            commodity_idx,
            country_idx,
        })
    }

    pub fn direction(&self) -> TradeDirection {
        self.direction
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn commodity_index(&self) -> usize {
        self.commodity_idx
    }

    pub fn country_index(&self) -> usize {
        self.country_idx
    }

    /// Value of the `get` query parameter.
    pub fn get_param(&self) -> String {
        self.names.join(",")
    }

    /// Number of cells every response row must carry.
    pub fn response_arity(&self) -> usize {
        self.names.len() + TRAILING_COLUMNS.len()
    }
}

/// The three per-direction schemas, checked to line up positionally so the
/// consumption and export tables can take the general-import column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionSchemas {
    imports_general: FieldSchema,
    imports_consumption: FieldSchema,
    exports: FieldSchema,
}

impl DirectionSchemas {
    pub fn new(
        imports_general: FieldSchema,
        imports_consumption: FieldSchema,
        exports: FieldSchema,
    ) -> Result<Self, ConfigError> {
        let base = &imports_general;
        for other in [&imports_consumption, &exports] {
            if other.len() != base.len() {
                return Err(ConfigError::ArityMismatch {
                    direction: other.direction(),
                    expected: base.len(),
                    found: other.len(),
                });
            }
            if other.commodity_index() != base.commodity_index() {
                return Err(ConfigError::MisalignedColumn {
                    direction: other.direction(),
                    column: other.direction().endpoint().commodity_param().to_string(),
                    expected: base.commodity_index(),
                    found: other.commodity_index(),
                });
            }
            if other.country_index() != base.country_index() {
                return Err(ConfigError::MisalignedColumn {
                    direction: other.direction(),
                    column: COUNTRY_CODE_FIELD.to_string(),
                    expected: base.country_index(),
                    found: other.country_index(),
                });
            }
        }
        Ok(Self {
            imports_general,
            imports_consumption,
            exports,
        })
    }

    pub fn get(&self, direction: TradeDirection) -> &FieldSchema {
        match direction {
            TradeDirection::ImportsGeneral => &self.imports_general,
            TradeDirection::ImportsConsumption => &self.imports_consumption,
            TradeDirection::Exports => &self.exports,
        }
    }

    /// Field names every reshaped table carries, before the derived columns.
    pub fn field_names(&self) -> &[String] {
        self.imports_general.names()
    }

    pub fn commodity_index(&self) -> usize {
        self.imports_general.commodity_index()
    }

    pub fn country_index(&self) -> usize {
        self.imports_general.country_index()
    }

    /// Final column order of a normalized table.
    pub fn output_columns(&self) -> Vec<String> {
        self.field_names()
            .iter()
            .cloned()
            .chain(DERIVED_COLUMNS.iter().map(|c| c.to_string()))
            .collect()
    }
}
