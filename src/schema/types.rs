// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::config::ConfigError;

/// Length of the detailed HS classification codes the API is queried with.
pub const COMMODITY_CODE_LEN: usize = 10;

/// Which trade flow a row describes. Closed set; the literals are written to
/// the `direction` column and into row identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    ImportsGeneral,
    ImportsConsumption,
    Exports,
}

/// The two API endpoints. Both import directions share the imports endpoint and
/// differ only in which value/quantity fields are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Imports,
    Exports,
}

impl TradeDirection {
    /// Reshaping and concatenation order.
    pub const ALL: [TradeDirection; 3] = [
        TradeDirection::ImportsGeneral,
        TradeDirection::ImportsConsumption,
        TradeDirection::Exports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::ImportsGeneral => "imports_general",
            TradeDirection::ImportsConsumption => "imports_consumption",
            TradeDirection::Exports => "exports",
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            TradeDirection::ImportsGeneral | TradeDirection::ImportsConsumption => {
                Endpoint::Imports
            }
            TradeDirection::Exports => Endpoint::Exports,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Endpoint {
    /// Path segment under `intltrade/`.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Imports => "imports",
            Endpoint::Exports => "exports",
        }
    }

    /// Name of both the commodity query predicate and the commodity field.
    pub fn commodity_param(&self) -> &'static str {
        match self {
            Endpoint::Imports => "I_COMMODITY",
            Endpoint::Exports => "E_COMMODITY",
        }
    }
}

/// A 10-digit HS commodity code, kept as text so leading zeros survive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommodityCode(String);

impl CommodityCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommodityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommodityCode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == COMMODITY_CODE_LEN && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(ConfigError::InvalidCommodityCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for CommodityCode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CommodityCode> for String {
    fn from(c: CommodityCode) -> Self {
        c.0
    }
}

/// One data row as returned by the API, positionally aligned to the requested fields
/// followed by the trailing echo columns.
pub type RawRecord = Vec<String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commodity_codes_must_be_ten_digits() {
        assert!("7602000030".parse::<CommodityCode>().is_ok());
        assert!("0123456789".parse::<CommodityCode>().is_ok());
        assert!("760200003".parse::<CommodityCode>().is_err());
        assert!("76020000300".parse::<CommodityCode>().is_err());
        assert!("76020000x0".parse::<CommodityCode>().is_err());
    }

    #[test]
    fn import_directions_share_an_endpoint() {
        assert_eq!(TradeDirection::ImportsGeneral.endpoint(), Endpoint::Imports);
        assert_eq!(TradeDirection::ImportsConsumption.endpoint(), Endpoint::Imports);
        assert_eq!(TradeDirection::Exports.endpoint().commodity_param(), "E_COMMODITY");
    }

    #[test]
    fn direction_literals() {
        let names: Vec<&str> = TradeDirection::ALL.iter().map(|d| d.as_str()).collect();
        assert_eq!(names, ["imports_general", "imports_consumption", "exports"]);
    }
}
