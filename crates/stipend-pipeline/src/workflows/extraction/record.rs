use super::scoring::ScoreBreakdown;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Canonical field names the pipeline stages act on.
pub mod fields {
    pub const NEED_LEVEL: &str = "need_level";
    pub const PAID_INTERNSHIP: &str = "paid_internship";
    pub const INTERNSHIP_TYPE: &str = "internship_type";
    pub const LOCATION: &str = "location";
    pub const HOURS: &str = "hours";
    pub const MONTH: &str = "month";
    pub const SCORE: &str = "score";
    pub const SCORE_BREAKDOWN: &str = "score_breakdown";
}

/// One roster row keyed by canonical field name. Absent values are `Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Stringified value of a field, `None` when missing or null.
    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field).and_then(value_text)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// A record after scoring, serialized flat with `score` and `score_breakdown`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: Record,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
}

impl ScoredRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record.get(field)
    }
}

impl Serialize for ScoredRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (field, value) in self.record.iter() {
            map.serialize_entry(field, value)?;
        }
        map.serialize_entry(fields::SCORE, &self.score)?;
        map.serialize_entry(fields::SCORE_BREAKDOWN, &self.score_breakdown)?;
        map.end()
    }
}

pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}
