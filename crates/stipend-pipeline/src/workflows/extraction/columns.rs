use super::record::Record;
use super::schema::SchemaConfig;
use super::source::RawTable;
use serde_json::Value;
use std::collections::HashMap;

/// Header comparison key: invisible marks removed, whitespace collapsed,
/// lower-cased.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Canonical column selected from the raw table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    pub canonical: String,
    pub header: String,
    pub index: usize,
}

/// Matches the schema's expected headers against the raw headers.
///
/// Returns the bindings in schema order, or the canonical names of every
/// expected column the table lacks.
pub fn bind_columns(
    headers: &[String],
    schema: &SchemaConfig,
) -> Result<Vec<ColumnBinding>, Vec<String>> {
    let mut present: HashMap<String, usize> = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        present.entry(normalize_header(header)).or_insert(index);
    }

    let renames: HashMap<String, &str> = schema
        .renamed_columns
        .iter()
        .map(|(raw, canonical)| (normalize_header(raw), canonical.as_str()))
        .collect();

    let mut bindings = Vec::with_capacity(schema.columns.len());
    let mut missing = Vec::new();

    for (declared, raw_header) in schema.columns.iter() {
        let expected = normalize_header(raw_header);
        let canonical = renames
            .get(&expected)
            .copied()
            .unwrap_or(declared.as_str())
            .to_string();

        match present.get(&expected) {
            Some(&index) => bindings.push(ColumnBinding {
                canonical,
                header: headers[index].clone(),
                index,
            }),
            None => missing.push(canonical),
        }
    }

    if missing.is_empty() {
        Ok(bindings)
    } else {
        Err(missing)
    }
}

/// Projects every raw row onto the canonical columns. Extra columns are
/// dropped; missing or blank cells become `Null`.
pub fn normalize_rows(table: &RawTable, bindings: &[ColumnBinding]) -> Vec<Record> {
    table
        .rows()
        .iter()
        .map(|row| {
            let mut record = Record::new();
            for binding in bindings {
                let value = match row.get(binding.index) {
                    None | Some(Value::Null) => Value::Null,
                    Some(Value::String(text)) if text.trim().is_empty() => Value::Null,
                    Some(other) => other.clone(),
                };
                record.set(binding.canonical.clone(), value);
            }
            record
        })
        .collect()
}
