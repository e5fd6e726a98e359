// src/fetch/query.rs

use serde_json::Value;
use std::fmt;
use url::Url;

use super::policy::FetchFailure;
use crate::period::Period;
use crate::schema::{CommodityCode, FieldSchema, RawRecord, TradeDirection};

/// Identifies one API request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub period: Period,
    pub code: CommodityCode,
    pub direction: TradeDirection,
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.period, self.code, self.direction)
    }
}

/// `{base}/{imports|exports}/hs?get=..&time=..[&key=..]&{I|E}_COMMODITY=..&SUMMARY_LVL=DET`
pub fn build_url(
    base: &Url,
    key: &QueryKey,
    schema: &FieldSchema,
    api_key: Option<&str>,
) -> Result<Url, url::ParseError> {
    let endpoint = key.direction.endpoint();
    let mut url = base.join(&format!("{}/hs", endpoint.path()))?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("get", &schema.get_param());
        q.append_pair("time", &key.period.to_string());
        if let Some(api_key) = api_key {
            q.append_pair("key", api_key);
        }
        q.append_pair(endpoint.commodity_param(), key.code.as_str());
        q.append_pair("SUMMARY_LVL", "DET");
    }
    Ok(url)
}

/// Parse a `[[header...], [row...], ...]` body, drop the header and check every
/// row carries `arity` cells.
pub fn parse_response(body: &str, arity: usize) -> Result<Vec<RawRecord>, FetchFailure> {
    let table: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| FetchFailure::Decode(e.to_string()))?;

    let mut rows = table.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| FetchFailure::Shape("response has no header row".to_string()))?;
    if header.len() != arity {
        return Err(FetchFailure::Shape(format!(
            "header has {} columns, expected {}",
            header.len(),
            arity
        )));
    }

    rows.enumerate()
        .map(|(i, row)| {
            if row.len() != arity {
                return Err(FetchFailure::Shape(format!(
                    "row {} has {} cells, expected {}",
                    i + 1,
                    row.len(),
                    arity
                )));
            }
            Ok(row.into_iter().map(cell_to_string).collect())
        })
        .collect()
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldList;

    fn key(direction: TradeDirection) -> QueryKey {
        QueryKey {
            period: "2024-10".parse().unwrap(),
            code: "7602000030".parse().unwrap(),
            direction,
        }
    }

    fn schema(direction: TradeDirection, csv: &str) -> FieldSchema {
        FieldSchema::new(direction, FieldList::Csv(csv.into()).into_names()).unwrap()
    }

    #[test]
    fn builds_import_url_with_key() {
        let base = Url::parse("https://api.census.gov/data/timeseries/intltrade/").unwrap();
        let s = schema(TradeDirection::ImportsGeneral, "I_COMMODITY,CTY_CODE");
        let url = build_url(&base, &key(TradeDirection::ImportsGeneral), &s, Some("k")).unwrap();
        assert_eq!(url.path(), "/data/timeseries/intltrade/imports/hs");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("get".into(), "I_COMMODITY,CTY_CODE".into()),
                ("time".into(), "2024-10".into()),
                ("key".into(), "k".into()),
                ("I_COMMODITY".into(), "7602000030".into()),
                ("SUMMARY_LVL".into(), "DET".into()),
            ]
        );
    }

    #[test]
    fn builds_export_url_without_key() {
        let base = Url::parse("https://api.census.gov/data/timeseries/intltrade/").unwrap();
        let s = schema(TradeDirection::Exports, "E_COMMODITY,CTY_CODE");
        let url = build_url(&base, &key(TradeDirection::Exports), &s, None).unwrap();
        assert_eq!(url.path(), "/data/timeseries/intltrade/exports/hs");
        assert!(url.query_pairs().all(|(k, _)| k != "key"));
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "E_COMMODITY" && v == "7602000030"));
    }

    #[test]
    fn strips_header_and_stringifies_cells() {
        let body = r#"[["I_COMMODITY","CTY_CODE","time","I_COMMODITY","SUMMARY_LVL"],
                       ["7602000030","1220","2024-10","7602000030","DET"],
                       ["7602000030",5700,"2024-10",null,"DET"]]"#;
        let rows = parse_response(body, 5).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ["7602000030", "1220", "2024-10", "7602000030", "DET"]);
        assert_eq!(rows[1][1], "5700");
        assert_eq!(rows[1][3], "");
    }

    #[test]
    fn header_only_response_has_no_rows() {
        let rows = parse_response(r#"[["A","B","time","x","y"]]"#, 5).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn malformed_bodies_are_classified() {
        assert!(matches!(parse_response("<html>", 5), Err(FetchFailure::Decode(_))));
        assert!(matches!(parse_response("[]", 5), Err(FetchFailure::Shape(_))));
        assert!(matches!(
            parse_response(r#"[["A","B"],["1","2"]]"#, 5),
            Err(FetchFailure::Shape(_))
        ));
        assert!(matches!(
            parse_response(r#"[["A","B","time","x","y"],["1","2"]]"#, 5),
            Err(FetchFailure::Shape(_))
        ));
    }
}
