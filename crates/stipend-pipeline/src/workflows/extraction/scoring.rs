use super::location::UNKNOWN_LOCATION;
use super::record::{fields, Record, ScoredRecord};
use super::scale::ScoringScale;
use super::schema::SchemaConfig;
use super::validation::{DistinctValues, ValueWarning, WarningKind};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Scoring categories, one per scored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    NeedLevel,
    PaidInternship,
    InternshipType,
    Location,
}

impl ScoreFactor {
    pub const ALL: [ScoreFactor; 4] = [
        ScoreFactor::NeedLevel,
        ScoreFactor::PaidInternship,
        ScoreFactor::InternshipType,
        ScoreFactor::Location,
    ];

    /// Canonical record field the factor reads.
    pub fn field(self) -> &'static str {
        match self {
            ScoreFactor::NeedLevel => fields::NEED_LEVEL,
            ScoreFactor::PaidInternship => fields::PAID_INTERNSHIP,
            ScoreFactor::InternshipType => fields::INTERNSHIP_TYPE,
            ScoreFactor::Location => fields::LOCATION,
        }
    }
}

/// Per-factor contributions for one record. Factors whose field was absent
/// or null are not present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreBreakdown(BTreeMap<ScoreFactor, f64>);

impl ScoreBreakdown {
    pub fn get(&self, factor: ScoreFactor) -> Option<f64> {
        self.0.get(&factor).copied()
    }

    pub fn insert(&mut self, factor: ScoreFactor, value: f64) {
        self.0.insert(factor, value);
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScoreFactor, f64)> + '_ {
        self.0.iter().map(|(factor, value)| (*factor, *value))
    }
}

/// Scores every record against `scale`.
///
/// Unknown keys contribute 0. Non-null values that miss a non-empty weight
/// table are reported once per field as [`WarningKind::Unscored`]; the
/// location fallback is never reported.
pub fn score_records(
    records: Vec<Record>,
    scale: &ScoringScale,
    schema: &SchemaConfig,
) -> (Vec<ScoredRecord>, Vec<ValueWarning>) {
    let rules: Vec<_> = ScoreFactor::ALL
        .iter()
        .map(|factor| (*factor, schema.rule_for(factor.field())))
        .collect();
    let mut unscored: BTreeMap<ScoreFactor, DistinctValues> = BTreeMap::new();

    let scored = records
        .into_iter()
        .map(|record| {
            let mut breakdown = ScoreBreakdown::default();
            for (factor, rule) in &rules {
                let Some(raw) = record.text(factor.field()) else {
                    continue;
                };
                let key = rule.apply(&raw);
                let (weight, table_in_use) = match factor {
                    ScoreFactor::NeedLevel => lookup(&scale.fafsa_scale, &key),
                    ScoreFactor::PaidInternship => lookup(&scale.paid, &key),
                    ScoreFactor::InternshipType => lookup(&scale.internship_type, &key),
                    ScoreFactor::Location => (
                        scale.cost_of_living_weight(&key),
                        !scale.cost_of_living.is_empty(),
                    ),
                };

                if weight.is_none() && table_in_use && key != UNKNOWN_LOCATION {
                    unscored.entry(*factor).or_default().push(raw);
                }
                breakdown.insert(*factor, weight.unwrap_or(0.0));
            }

            ScoredRecord {
                score: breakdown.total(),
                score_breakdown: breakdown,
                record,
            }
        })
        .collect();

    let warnings = unscored
        .into_iter()
        .filter_map(|(factor, values)| values.into_warning(WarningKind::Unscored, factor.field()))
        .collect();

    (scored, warnings)
}

fn lookup(table: &IndexMap<String, f64>, key: &str) -> (Option<f64>, bool) {
    (table.get(key).copied(), !table.is_empty())
}
