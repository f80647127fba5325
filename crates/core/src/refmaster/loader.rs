//! Reference master loading from CSV or JSON.
//!
//! Malformed rows are collected as [`RowError`]s and skipped; well-formed
//! rows still load. A file that cannot be read, cannot be parsed at all,
//! or yields no usable row is an [`Error::ReferenceData`].

use std::collections::HashSet;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;

use super::model::{EquityReference, ReferenceTable, RowError};
use crate::errors::{Error, Result};

/// Raw row as found in the file, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawEquity {
    symbol: Option<String>,
    isin: Option<String>,
    cusip: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    cik: Option<String>,
    currency: Option<String>,
    exchange: Option<String>,
    name: Option<String>,
    country: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
    pricing_source: Option<String>,
}

/// Accepts CIKs written as JSON numbers as well as strings.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawEquity {
    fn into_reference(self, row: usize) -> std::result::Result<EquityReference, RowError> {
        let required = |value: Option<String>, field: &str| {
            clean(value).ok_or_else(|| RowError {
                row,
                field: field.to_string(),
                message: "required field is missing or empty".to_string(),
            })
        };

        let symbol = required(self.symbol, "symbol")?.to_uppercase();
        let isin = required(self.isin, "isin")?.to_uppercase();
        let cusip = required(self.cusip, "cusip")?.to_uppercase();
        let currency = required(self.currency, "currency")?.to_uppercase();
        let exchange = required(self.exchange, "exchange")?.to_uppercase();
        let pricing_source = required(self.pricing_source, "pricing_source")?;

        if isin.len() != 12 || !isin.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RowError {
                row,
                field: "isin".to_string(),
                message: format!("expected 12 alphanumeric characters, got '{}'", isin),
            });
        }
        if cusip.len() != 9 || !cusip.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RowError {
                row,
                field: "cusip".to_string(),
                message: format!("expected 9 alphanumeric characters, got '{}'", cusip),
            });
        }
        let cik = clean(self.cik);
        if let Some(cik) = &cik {
            if !cik.chars().all(|c| c.is_ascii_digit()) || cik.len() > 10 {
                return Err(RowError {
                    row,
                    field: "cik".to_string(),
                    message: format!("expected up to 10 digits, got '{}'", cik),
                });
            }
        }

        Ok(EquityReference {
            symbol,
            isin,
            cusip,
            cik,
            currency,
            exchange,
            name: clean(self.name),
            country: clean(self.country).map(|c| c.to_uppercase()),
            sector: clean(self.sector),
            industry: clean(self.industry),
            pricing_source,
        })
    }
}

/// Validates raw rows, dropping duplicates of an already loaded symbol.
fn collect(rows: Vec<std::result::Result<RawEquity, RowError>>) -> ReferenceTable {
    let mut table = ReferenceTable::default();
    let mut seen = HashSet::new();
    for (index, raw) in rows.into_iter().enumerate() {
        let row = index + 1;
        match raw.and_then(|r| r.into_reference(row)) {
            Ok(equity) if !seen.insert(equity.symbol.clone()) => table.rejected.push(RowError {
                row,
                field: "symbol".to_string(),
                message: format!("duplicate symbol '{}'", equity.symbol),
            }),
            Ok(equity) => table.equities.push(equity),
            Err(err) => table.rejected.push(err),
        }
    }
    table
}

/// Parses CSV text with a header row.
pub fn parse_csv(text: &str) -> Result<ReferenceTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    // Reading the header up front separates a malformed file from bad rows.
    reader
        .headers()
        .map_err(|e| Error::ReferenceData(format!("unreadable CSV header: {}", e)))?;

    let rows = reader
        .deserialize::<RawEquity>()
        .enumerate()
        .map(|(index, record)| {
            record.map_err(|e| RowError {
                row: index + 1,
                field: "*".to_string(),
                message: e.to_string(),
            })
        })
        .collect();
    Ok(collect(rows))
}

/// Parses JSON text: `{"equities": [...]}` or a bare list.
pub fn parse_json(text: &str) -> Result<ReferenceTable> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| Error::ReferenceData(format!("invalid JSON: {}", e)))?;
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("equities") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::ReferenceData(
                    "expected a list or an object with an 'equities' list".to_string(),
                ))
            }
        },
        _ => {
            return Err(Error::ReferenceData(
                "expected a list or an object with an 'equities' list".to_string(),
            ))
        }
    };

    let rows = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<RawEquity>(item).map_err(|e| RowError {
                row: index + 1,
                field: "*".to_string(),
                message: e.to_string(),
            })
        })
        .collect();
    Ok(collect(rows))
}

/// Loads a reference table from a `.csv` or `.json` file.
pub fn load_reference_table(path: &Path) -> Result<ReferenceTable> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::ReferenceData(format!("{}: {}", path.display(), e)))?;
    let table = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => parse_csv(&text)?,
        _ => parse_json(&text)?,
    };

    for err in &table.rejected {
        warn!("Reference master {}: skipped {}", path.display(), err);
    }
    if table.equities.is_empty() {
        return Err(Error::ReferenceData(format!(
            "{}: no valid rows ({} rejected)",
            path.display(),
            table.rejected.len()
        )));
    }
    info!(
        "Loaded {} equities from {} ({} rejected)",
        table.equities.len(),
        path.display(),
        table.rejected.len()
    );
    Ok(table)
}
