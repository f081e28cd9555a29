use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// External capability that turns free-text location into a region key
/// understood by the cost-of-living tiers.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve(&self, raw: &str) -> Result<String, ResolveError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("location resolution timed out after {0:?}")]
    Timeout(Duration),
    #[error("no region found for '{0}'")]
    Unresolved(String),
    #[error("location resolver unavailable: {0}")]
    Unavailable(String),
}

pub const DISTRICT_OF_COLUMBIA: &str = "DistrictOfColumbia";
pub const INTERNATIONAL: &str = "International";

const STATES: &[(&str, &str)] = &[
    ("alabama", "AL"),
    ("alaska", "AK"),
    ("arizona", "AZ"),
    ("arkansas", "AR"),
    ("california", "CA"),
    ("colorado", "CO"),
    ("connecticut", "CT"),
    ("delaware", "DE"),
    ("florida", "FL"),
    ("georgia", "GA"),
    ("hawaii", "HI"),
    ("idaho", "ID"),
    ("illinois", "IL"),
    ("indiana", "IN"),
    ("iowa", "IA"),
    ("kansas", "KS"),
    ("kentucky", "KY"),
    ("louisiana", "LA"),
    ("maine", "ME"),
    ("maryland", "MD"),
    ("massachusetts", "MA"),
    ("michigan", "MI"),
    ("minnesota", "MN"),
    ("mississippi", "MS"),
    ("missouri", "MO"),
    ("montana", "MT"),
    ("nebraska", "NE"),
    ("nevada", "NV"),
    ("new hampshire", "NH"),
    ("new jersey", "NJ"),
    ("new mexico", "NM"),
    ("new york", "NY"),
    ("north carolina", "NC"),
    ("north dakota", "ND"),
    ("ohio", "OH"),
    ("oklahoma", "OK"),
    ("oregon", "OR"),
    ("pennsylvania", "PA"),
    ("rhode island", "RI"),
    ("south carolina", "SC"),
    ("south dakota", "SD"),
    ("tennessee", "TN"),
    ("texas", "TX"),
    ("utah", "UT"),
    ("vermont", "VT"),
    ("virginia", "VA"),
    ("washington", "WA"),
    ("west virginia", "WV"),
    ("wisconsin", "WI"),
    ("wyoming", "WY"),
];

const DC_NAMES: &[&str] = &["district of columbia", "dc", "d c"];
const DC_COMPACT: &[&str] = &["districtofcolumbia", "washingtondc"];
const INTERNATIONAL_NAMES: &[&str] = &["international", "abroad", "outside the us", "overseas"];

/// Offline resolver for US locations.
///
/// Recognizes state names anywhere in the text (longest name first, so
/// "West Virginia" is not read as "Virginia"), USPS codes after a comma
/// ("Austin, TX"), and District of Columbia spellings. Anything else is
/// [`ResolveError::Unresolved`].
#[derive(Debug, Clone)]
pub struct GazetteerResolver {
    names: Vec<(String, String)>,
    codes: HashMap<String, String>,
}

impl Default for GazetteerResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GazetteerResolver {
    pub fn new() -> Self {
        let mut names: Vec<(String, String)> = STATES
            .iter()
            .map(|(name, _)| (name.to_string(), region_key(name)))
            .collect();
        names.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut codes: HashMap<String, String> = STATES
            .iter()
            .map(|(name, code)| (code.to_string(), region_key(name)))
            .collect();
        codes.insert("DC".to_string(), DISTRICT_OF_COLUMBIA.to_string());

        Self { names, codes }
    }

    pub fn lookup(&self, raw: &str) -> Option<String> {
        let words = word_text(raw);
        if words.is_empty() {
            return None;
        }
        let padded = format!(" {words} ");

        if is_district_of_columbia(raw) {
            return Some(DISTRICT_OF_COLUMBIA.to_string());
        }

        for part in raw.split(',').skip(1) {
            let token = part
                .split_whitespace()
                .next()
                .map(|token| token.replace('.', "").to_ascii_uppercase());
            if let Some(region) = token.and_then(|token| self.codes.get(&token)) {
                return Some(region.clone());
            }
        }

        if let Some((_, region)) = self
            .names
            .iter()
            .find(|(name, _)| padded.contains(&format!(" {name} ")))
        {
            return Some(region.clone());
        }

        let bare = raw.trim().replace('.', "").to_ascii_uppercase();
        if let Some(region) = self.codes.get(&bare) {
            return Some(region.clone());
        }

        if INTERNATIONAL_NAMES
            .iter()
            .any(|name| padded.contains(&format!(" {name} ")))
        {
            return Some(INTERNATIONAL.to_string());
        }

        None
    }
}

#[async_trait]
impl LocationResolver for GazetteerResolver {
    async fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
        self.lookup(raw)
            .ok_or_else(|| ResolveError::Unresolved(raw.to_string()))
    }
}

/// Whether `text` names the District of Columbia: "DC", "D.C.",
/// "Washington, DC", "District of Columbia", or the same run together
/// ("WashingtonDC").
pub fn is_district_of_columbia(text: &str) -> bool {
    let words = word_text(text);
    if words.is_empty() {
        return false;
    }
    let padded = format!(" {words} ");
    let compact = words.replace(' ', "");

    DC_NAMES
        .iter()
        .any(|name| padded.contains(&format!(" {name} ")))
        || DC_COMPACT.iter().any(|name| compact.contains(name))
}

/// Lower-case words separated by single spaces, punctuation dropped.
fn word_text(raw: &str) -> String {
    raw.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// "new york" -> "NewYork".
fn region_key(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
