use super::rules::{default_rule, FieldRule};
use super::scale::ScoringScale;
use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

const BUILTIN_SCHEMA: &str = include_str!("../../../config/csv_config.json");

/// Where the schema definition is read from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchemaSource {
    /// The definition bundled with the crate.
    #[default]
    Builtin,
    File(PathBuf),
}

impl SchemaSource {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(Self::File).unwrap_or_default()
    }
}

/// Versioned description of the roster CSV: expected headers, renames,
/// per-field validation rules and the default scoring scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Canonical field name to the header expected in the raw file.
    pub columns: IndexMap<String, String>,
    /// Raw header to canonical field name.
    pub renamed_columns: IndexMap<String, String>,
    pub validations: IndexMap<String, FieldValidation>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub normalization: IndexMap<String, FieldRule>,
    pub default_scale: ScoringScale,
}

fn default_version() -> String {
    "2025".to_string()
}

impl SchemaConfig {
    pub fn load(source: &SchemaSource) -> Result<Self, SchemaError> {
        match source {
            SchemaSource::Builtin => Self::from_json(BUILTIN_SCHEMA),
            SchemaSource::File(path) => Self::from_path(path),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SchemaError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SchemaError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let schema: SchemaConfig =
            serde_json::from_str(text).map_err(|err| SchemaError::Malformed {
                reason: err.to_string(),
            })?;

        if schema.columns.is_empty() {
            return Err(SchemaError::Malformed {
                reason: "`columns` must declare at least one column".to_string(),
            });
        }

        Ok(schema)
    }

    /// Normalization rule for a canonical field, schema overrides first.
    pub fn rule_for(&self, field: &str) -> FieldRule {
        self.normalization
            .get(field)
            .cloned()
            .unwrap_or_else(|| default_rule(field))
    }
}

/// Validation rule for one canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValidation {
    pub valid_values: ValidValues,
}

/// Either the literal `"any"` or an allow-list of values.
///
/// A single string other than `"any"` is treated as a one-element list and
/// numeric entries are compared by their textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidValues {
    Any,
    OneOf(Vec<String>),
}

impl<'de> Deserialize<'de> for ValidValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(text) if text.trim().eq_ignore_ascii_case("any") => Ok(Self::Any),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text),
                    Value::Number(number) => Ok(number.to_string()),
                    Value::Bool(flag) => Ok(flag.to_string()),
                    other => Err(<D::Error as de::Error>::custom(format!(
                        "valid_values entries must be scalars, found {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::OneOf),
            Value::String(text) => Ok(Self::OneOf(vec![text])),
            Value::Number(number) => Ok(Self::OneOf(vec![number.to_string()])),
            other => Err(<D::Error as de::Error>::custom(format!(
                "valid_values must be \"any\" or a list, found {other}"
            ))),
        }
    }
}

impl Serialize for ValidValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValidValues::Any => serializer.serialize_str("any"),
            ValidValues::OneOf(values) => values.serialize(serializer),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema config not found at {}", path.display())]
    NotFound { path: PathBuf },
    #[error("schema config is malformed: {reason}")]
    Malformed { reason: String },
    #[error("failed to read schema config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
