//! Option series listing: the traded contracts of one expiry keyed by strike and kind.
//!
//! The listing comes in the exchange's ISS table shape:
//!
//! ```json
//! {"securities": {"columns": ["secid", "strike", "option_type", "is_traded"],
//!                 "data": [["Si100000BC4", 100000, "C", 1]]}}
//! ```
//!
//! Each row is zipped with `columns` into a field map. Rows that are not traded are
//! skipped. The full field map is kept on the entry so snapshots can expose it.
use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ChainError;
use crate::option_kind::OptionKind;

/// Trait providing parsing of a series listing.
pub trait SeriesParser: Sized {
    /// Parses the ISS securities document from `reader`.
    ///
    /// Returns an error if the document is not valid JSON or a traded row lacks
    /// `secid`, `strike` or `option_type`.
    fn parse_from_reader<R: Read>(reader: R) -> Result<Self, ChainError>;
}

/// A single listed option contract.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    /// Exchange instrument code used in subscribe requests.
    pub code: String,
    /// Strike price.
    pub strike: i64,
    /// Call or put.
    pub kind: OptionKind,
    /// Every column of the listing row.
    pub fields: Map<String, Value>,
}

impl SeriesEntry {
    /// Creates an entry without listing fields.
    pub fn new(code: impl Into<String>, strike: i64, kind: OptionKind) -> Self {
        Self {
            code: code.into(),
            strike,
            kind,
            fields: Map::new(),
        }
    }
}

/// Catalogue of listed contracts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSeries {
    entries: BTreeMap<(i64, OptionKind), SeriesEntry>,
}

impl OptionSeries {
    /// Builds a catalogue from entries; a later entry for the same strike and kind wins.
    pub fn from_entries(entries: impl IntoIterator<Item = SeriesEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| ((entry.strike, entry.kind), entry))
                .collect(),
        }
    }

    /// Listed contract for `strike` and `kind`, if any.
    pub fn get(&self, strike: i64, kind: OptionKind) -> Option<&SeriesEntry> {
        self.entries.get(&(strike, kind))
    }

    /// All entries ordered by strike, calls before puts.
    pub fn iter(&self) -> impl Iterator<Item = &SeriesEntry> {
        self.entries.values()
    }

    /// Number of listed contracts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is listed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Deserialize)]
struct IssDocument {
    securities: IssTable,
}

#[derive(Deserialize)]
struct IssTable {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
}

impl SeriesParser for OptionSeries {
    fn parse_from_reader<R: Read>(reader: R) -> Result<Self, ChainError> {
        let document: IssDocument = serde_json::from_reader(reader)?;
        let columns = document.securities.columns;
        let mut entries = Vec::new();

        for row in document.securities.data {
            let fields: Map<String, Value> = columns.iter().cloned().zip(row).collect();
            if !is_traded(&fields) {
                continue;
            }
            entries.push(entry_from_fields(fields)?);
        }
        Ok(Self::from_entries(entries))
    }
}

fn is_traded(fields: &Map<String, Value>) -> bool {
    match fields.get("is_traded") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

fn entry_from_fields(fields: Map<String, Value>) -> Result<SeriesEntry, ChainError> {
    let code = fields
        .get("secid")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::ParseSeries("row without secid".to_string()))?
        .to_string();
    let strike = fields
        .get("strike")
        .and_then(Value::as_f64)
        .ok_or_else(|| ChainError::ParseSeries(format!("{code}: missing numeric strike")))?;
    let kind = fields
        .get("option_type")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::ParseSeries(format!("{code}: missing option_type")))?
        .parse::<OptionKind>()
        .map_err(|e| ChainError::ParseSeries(format!("{code}: {e}")))?;

    Ok(SeriesEntry {
        code,
        strike: strike.round() as i64,
        kind,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "securities": {
            "columns": ["secid", "strike", "option_type", "is_traded", "lasttradedate"],
            "data": [
                ["Si95000BC4", 95000.0, "C", 1, "2024-03-21"],
                ["Si95000BO4", 95000.0, "P", 1, "2024-03-21"],
                ["Si96000BC4", 96000.0, "C", 0, "2024-03-21"]
            ]
        }
    }"#;

    #[test]
    fn parses_traded_rows_only() {
        let series = OptionSeries::parse_from_reader(LISTING.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);

        let call = series.get(95000, OptionKind::Call).unwrap();
        assert_eq!(call.code, "Si95000BC4");
        assert_eq!(call.fields["lasttradedate"], "2024-03-21");
        assert_eq!(series.get(95000, OptionKind::Put).unwrap().code, "Si95000BO4");
        assert!(series.get(96000, OptionKind::Call).is_none());
    }

    #[test]
    fn rejects_traded_row_without_option_type() {
        let listing = r#"{"securities": {"columns": ["secid", "strike", "is_traded"],
                          "data": [["Si95000BC4", 95000, 1]]}}"#;
        let err = OptionSeries::parse_from_reader(listing.as_bytes()).unwrap_err();
        assert!(matches!(err, ChainError::ParseSeries(_)));
    }

    #[test]
    fn rejects_non_json_listing() {
        let err = OptionSeries::parse_from_reader("<html>".as_bytes()).unwrap_err();
        assert!(matches!(err, ChainError::SerdeJson(_)));
    }
}
