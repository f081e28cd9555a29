use super::record::fields;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Declarative normalization applied to a categorical value before it is
/// looked up in the scoring scale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRule {
    pub lowercase: bool,
    pub strip_whitespace: bool,
    pub strip_chars: String,
    pub synonyms: IndexMap<String, String>,
}

impl FieldRule {
    pub fn apply(&self, raw: &str) -> String {
        let mut value = if self.lowercase {
            raw.to_lowercase()
        } else {
            raw.to_string()
        };

        if self.strip_whitespace || !self.strip_chars.is_empty() {
            value.retain(|ch| {
                !(self.strip_whitespace && ch.is_whitespace()) && !self.strip_chars.contains(ch)
            });
        }

        match self.synonyms.get(&value) {
            Some(canonical) => canonical.clone(),
            None => value,
        }
    }
}

/// Built-in rule for a canonical field; fields without scoring semantics get
/// the identity rule.
pub fn default_rule(field: &str) -> FieldRule {
    match field {
        fields::NEED_LEVEL => FieldRule {
            lowercase: true,
            strip_whitespace: true,
            strip_chars: String::new(),
            synonyms: [
                ("veryhighneed", "veryHighNeed"),
                ("highneed", "highNeed"),
                ("moderateneed", "moderateNeed"),
                ("lowneed", "lowNeed"),
                ("noneed", "noNeed"),
            ]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect(),
        },
        fields::PAID_INTERNSHIP => FieldRule {
            lowercase: true,
            ..FieldRule::default()
        },
        fields::INTERNSHIP_TYPE => FieldRule {
            lowercase: true,
            strip_whitespace: false,
            strip_chars: "-".to_string(),
            synonyms: [
                ("inperson", "inPerson"),
                ("hybrid", "hybrid"),
                ("virtual", "virtual"),
            ]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect(),
        },
        _ => FieldRule::default(),
    }
}
