use super::record::Record;
use super::schema::{FieldValidation, ValidValues};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;

/// Non-fatal finding about the values of one field across the whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueWarning {
    pub kind: WarningKind,
    pub field: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Value outside the schema's allow-list.
    Invalid,
    /// Value with no weight in the scoring scale; it scored 0.
    Unscored,
}

impl fmt::Display for ValueWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            WarningKind::Invalid => "Invalid",
            WarningKind::Unscored => "Unscored",
        };
        write!(
            f,
            "{} {} values: [{}]",
            label,
            self.field,
            self.values.join(", ")
        )
    }
}

/// Distinct values in first-seen order.
#[derive(Debug, Default)]
pub(crate) struct DistinctValues {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl DistinctValues {
    pub(crate) fn push(&mut self, value: String) {
        if self.seen.insert(value.clone()) {
            self.ordered.push(value);
        }
    }

    pub(crate) fn into_warning(self, kind: WarningKind, field: &str) -> Option<ValueWarning> {
        if self.ordered.is_empty() {
            None
        } else {
            Some(ValueWarning {
                kind,
                field: field.to_string(),
                values: self.ordered,
            })
        }
    }
}

/// Checks each validated field against its allow-list, case- and
/// whitespace-insensitively. Emits at most one warning per field and never
/// touches the records.
pub fn validate_fields(
    records: &[Record],
    validations: &IndexMap<String, FieldValidation>,
) -> Vec<ValueWarning> {
    let Some(first) = records.first() else {
        return Vec::new();
    };

    let mut warnings = Vec::new();
    for (field, validation) in validations.iter() {
        if !first.contains(field) {
            continue;
        }
        let allowed: HashSet<String> = match &validation.valid_values {
            ValidValues::Any => continue,
            ValidValues::OneOf(values) => values
                .iter()
                .map(|value| value.trim().to_lowercase())
                .collect(),
        };

        let mut invalid = DistinctValues::default();
        for record in records {
            let Some(text) = record.text(field) else {
                continue;
            };
            let value = text.trim().to_lowercase();
            if !allowed.contains(&value) {
                invalid.push(value);
            }
        }

        warnings.extend(invalid.into_warning(WarningKind::Invalid, field));
    }

    warnings
}
