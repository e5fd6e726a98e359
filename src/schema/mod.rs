pub mod arrow;
pub mod fields;
pub mod types;

pub use self::arrow::build_arrow_schema;
pub use fields::{DirectionSchemas, FieldList, FieldSchema, COUNTRY_CODE_FIELD};
pub use types::{CommodityCode, Endpoint, RawRecord, TradeDirection};
