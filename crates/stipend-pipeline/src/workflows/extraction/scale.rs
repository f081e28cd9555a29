use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Nested weight table converting categorical values into score contributions.
///
/// Keys follow the camelCase names used by the scale editor; the snake_case
/// spellings are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringScale {
    #[serde(default, alias = "fafsa_scale")]
    pub fafsa_scale: IndexMap<String, f64>,
    #[serde(default)]
    pub paid: IndexMap<String, f64>,
    #[serde(default, alias = "internship_type")]
    pub internship_type: IndexMap<String, f64>,
    /// Tier name to region weights, searched in declaration order.
    #[serde(default, alias = "cost_of_living")]
    pub cost_of_living: IndexMap<String, IndexMap<String, f64>>,
}

impl ScoringScale {
    pub fn cost_of_living_weight(&self, region: &str) -> Option<f64> {
        self.cost_of_living
            .values()
            .find_map(|tier| tier.get(region).copied())
    }
}
