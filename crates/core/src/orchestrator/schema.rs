//! Structural validation of scenario documents.
//!
//! Runs on the raw JSON value before any typed parsing so that every
//! offending path can be reported at once. Trades are checked for field
//! types only: a missing trade field is a `missing_field` issue later, not a
//! schema violation. Marks need `ticker`, `internal_mark` and `as_of_date`.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::errors::{Error, Result, SchemaViolation};
use crate::questions::Intent;

#[derive(Clone, Copy)]
enum Kind {
    Text,
    Number,
    Date,
}

impl Kind {
    fn describe(&self) -> &'static str {
        match self {
            Kind::Text => "expected a string",
            Kind::Number => "expected a number",
            Kind::Date => "expected a YYYY-MM-DD date",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Kind::Text => value.is_string(),
            Kind::Number => value.as_f64().is_some_and(f64::is_finite),
            Kind::Date => value
                .as_str()
                .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        }
    }
}

const TRADE_FIELDS: &[(&str, Kind)] = &[
    ("trade_id", Kind::Text),
    ("ticker", Kind::Text),
    ("quantity", Kind::Number),
    ("price", Kind::Number),
    ("currency", Kind::Text),
    ("counterparty", Kind::Text),
    ("trade_dt", Kind::Date),
    ("settle_dt", Kind::Date),
    ("side", Kind::Text),
    ("notes", Kind::Text),
];

const MARK_REQUIRED: &[(&str, Kind)] = &[
    ("ticker", Kind::Text),
    ("internal_mark", Kind::Number),
    ("as_of_date", Kind::Date),
];

const MARK_OPTIONAL: &[(&str, Kind)] = &[
    ("source", Kind::Text),
    ("notes", Kind::Text),
    ("position_id", Kind::Text),
    ("portfolio_id", Kind::Text),
    ("instrument_type", Kind::Text),
    ("currency", Kind::Text),
];

const QUESTION_FIELDS: &[(&str, Kind)] = &[("ticker", Kind::Text), ("as_of", Kind::Date)];

/// Checks `document` against the scenario shape, listing every violation.
pub fn validate_scenario_value(document: &Value) -> Result<()> {
    let violations = collect_violations(document);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::Schema { violations })
    }
}

/// Every violated path in `document`; empty when it conforms.
pub fn collect_violations(document: &Value) -> Vec<SchemaViolation> {
    let mut out = Vec::new();
    let Some(root) = document.as_object() else {
        out.push(SchemaViolation::new("$", "expected an object"));
        return out;
    };

    for key in ["name", "description"] {
        match root.get(key) {
            Some(Value::String(_)) => {}
            Some(_) => out.push(SchemaViolation::new(key, "expected a string")),
            None => out.push(SchemaViolation::new(key, "missing")),
        }
    }
    if let Some(metadata) = root.get("metadata") {
        if !metadata.is_object() {
            out.push(SchemaViolation::new("metadata", "expected an object"));
        }
    }

    if let Some(trades) = list(root, "trades", &mut out) {
        for (i, trade) in trades.iter().enumerate() {
            let path = format!("trades[{}]", i);
            if let Some(fields) = object(trade, &path, &mut out) {
                check_fields(fields, &path, TRADE_FIELDS, false, &mut out);
            }
        }
    }

    if let Some(marks) = list(root, "marks", &mut out) {
        for (i, mark) in marks.iter().enumerate() {
            let path = format!("marks[{}]", i);
            if let Some(fields) = object(mark, &path, &mut out) {
                check_fields(fields, &path, MARK_REQUIRED, true, &mut out);
                check_fields(fields, &path, MARK_OPTIONAL, false, &mut out);
            }
        }
    }

    if let Some(questions) = list(root, "questions", &mut out) {
        for (i, question) in questions.iter().enumerate() {
            let path = format!("questions[{}]", i);
            check_question(question, &path, &mut out);
        }
    }
    out
}

fn list<'a>(root: &'a Map<String, Value>, key: &str, out: &mut Vec<SchemaViolation>) -> Option<&'a Vec<Value>> {
    match root.get(key) {
        Some(Value::Array(items)) => Some(items),
        Some(_) => {
            out.push(SchemaViolation::new(key, "expected a list"));
            None
        }
        None => {
            out.push(SchemaViolation::new(key, "missing"));
            None
        }
    }
}

fn object<'a>(value: &'a Value, path: &str, out: &mut Vec<SchemaViolation>) -> Option<&'a Map<String, Value>> {
    let fields = value.as_object();
    if fields.is_none() {
        out.push(SchemaViolation::new(path, "expected an object"));
    }
    fields
}

/// Null counts as absent.
fn check_fields(
    fields: &Map<String, Value>,
    path: &str,
    shape: &[(&str, Kind)],
    required: bool,
    out: &mut Vec<SchemaViolation>,
) {
    for (name, kind) in shape {
        match fields.get(*name).filter(|v| !v.is_null()) {
            Some(value) if !kind.accepts(value) => {
                out.push(SchemaViolation::new(format!("{}.{}", path, name), kind.describe()))
            }
            None if required => {
                out.push(SchemaViolation::new(format!("{}.{}", path, name), "missing"))
            }
            _ => {}
        }
    }
}

fn check_question(question: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    if question.is_string() {
        return;
    }
    let Some(fields) = object(question, path, out) else {
        return;
    };
    check_fields(fields, path, &[("question", Kind::Text)], true, out);
    check_fields(fields, path, QUESTION_FIELDS, false, out);
    if let Some(intent) = fields.get("intent").filter(|v| !v.is_null()) {
        if serde_json::from_value::<Intent>(intent.clone()).is_err() {
            out.push(SchemaViolation::new(format!("{}.intent", path), "unknown intent"));
        }
    }
}
