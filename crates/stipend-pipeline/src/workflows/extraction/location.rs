use super::cache::LocationCache;
use super::record::{fields, Record};
use super::resolver::{
    is_district_of_columbia, LocationResolver, ResolveError, DISTRICT_OF_COLUMBIA,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Value substituted when a location cannot be resolved.
pub const UNKNOWN_LOCATION: &str = "Unknown";
pub const DEFAULT_RESOLVER_CONCURRENCY: usize = 5;
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(10);

/// Counters describing one location pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationStats {
    pub distinct: usize,
    pub cache_hits: usize,
    pub resolved: usize,
    pub failed: usize,
}

/// Rewrites each record's `location` to a region key, consulting the shared
/// cache first and fanning uncached strings out to the resolver.
///
/// Failed lookups are cached as their fallback region, so a string that
/// cannot be placed costs one resolver call until the cache is cleared.
#[derive(Clone)]
pub struct LocationNormalizer {
    cache: Arc<LocationCache>,
    resolver: Arc<dyn LocationResolver>,
    concurrency: usize,
    timeout: Duration,
}

impl LocationNormalizer {
    pub fn new(cache: Arc<LocationCache>, resolver: Arc<dyn LocationResolver>) -> Self {
        Self {
            cache,
            resolver,
            concurrency: DEFAULT_RESOLVER_CONCURRENCY,
            timeout: DEFAULT_RESOLVER_TIMEOUT,
        }
    }

    /// Maximum resolver calls in flight; clamped to at least one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<LocationCache> {
        &self.cache
    }

    pub async fn normalize(&self, records: &mut [Record]) -> LocationStats {
        let mut stats = LocationStats::default();
        if !records.iter().any(|record| record.contains(fields::LOCATION)) {
            return stats;
        }

        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        for record in records.iter() {
            if let Some(raw) = record.text(fields::LOCATION) {
                if !raw.trim().is_empty() && seen.insert(raw.clone()) {
                    distinct.push(raw);
                }
            }
        }
        stats.distinct = distinct.len();

        let mut mapping: HashMap<String, String> = HashMap::with_capacity(distinct.len());
        let mut pending = Vec::new();
        for raw in distinct {
            match self.cache.get(&raw) {
                Some(region) => {
                    mapping.insert(raw, region);
                }
                None => pending.push(raw),
            }
        }
        stats.cache_hits = mapping.len();

        if !pending.is_empty() {
            debug!(
                pending = pending.len(),
                cached = stats.cache_hits,
                "resolving uncached locations"
            );
            for (raw, outcome) in self.resolve_pending(pending).await {
                let region = match outcome {
                    Ok(region) => {
                        stats.resolved += 1;
                        fold_district(region)
                    }
                    Err(err) => {
                        warn!(location = %raw, error = %err, "location resolution failed");
                        stats.failed += 1;
                        fallback_region(&raw)
                    }
                };
                self.cache.insert(raw.clone(), region.clone());
                mapping.insert(raw, region);
            }
        }

        for record in records.iter_mut() {
            if !record.contains(fields::LOCATION) {
                continue;
            }
            let region = record
                .text(fields::LOCATION)
                .and_then(|raw| mapping.get(&raw).cloned())
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
            record.set(fields::LOCATION, Value::String(region));
        }

        info!(
            distinct = stats.distinct,
            cache_hits = stats.cache_hits,
            resolved = stats.resolved,
            failed = stats.failed,
            "locations normalized"
        );
        stats
    }

    /// Resolves every pending string with at most `concurrency` calls in
    /// flight. Results arrive in completion order.
    async fn resolve_pending(
        &self,
        pending: Vec<String>,
    ) -> Vec<(String, Result<String, ResolveError>)> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for raw in pending {
            let permits = Arc::clone(&permits);
            let resolver = Arc::clone(&self.resolver);
            let timeout = self.timeout;
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    let err = ResolveError::Unavailable("resolver pool closed".to_string());
                    return (raw, Err(err));
                };
                let outcome = match tokio::time::timeout(timeout, resolver.resolve(&raw)).await {
                    Ok(result) => result.map(|region| region.trim().to_string()),
                    Err(_) => Err(ResolveError::Timeout(timeout)),
                };
                (raw, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!(error = %err, "location resolution task aborted"),
            }
        }
        outcomes
    }
}

/// Every spelling of the District of Columbia collapses to one region key.
fn fold_district(region: String) -> String {
    if is_district_of_columbia(&region) {
        DISTRICT_OF_COLUMBIA.to_string()
    } else {
        region
    }
}

/// Region recorded for a string the resolver could not place.
fn fallback_region(raw: &str) -> String {
    if is_district_of_columbia(raw) {
        DISTRICT_OF_COLUMBIA.to_string()
    } else {
        UNKNOWN_LOCATION.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::extraction::cache::CachePolicy;
    use crate::workflows::extraction::schema::{SchemaConfig, SchemaSource};
    use crate::workflows::extraction::scoring::{score_records, ScoreFactor};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingResolver {
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl LocationResolver for CountingResolver {
        async fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
            self.calls.lock().expect("calls mutex").push(raw.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if raw.contains("fail") {
                Err(ResolveError::Unavailable("boom".to_string()))
            } else {
                Ok(format!("Region:{raw}"))
            }
        }
    }

    fn records(locations: &[Option<&str>]) -> Vec<Record> {
        locations
            .iter()
            .map(|location| {
                let mut record = Record::new();
                record.set(
                    fields::LOCATION,
                    location.map(|value| json!(value)).unwrap_or(Value::Null),
                );
                record
            })
            .collect()
    }

    fn normalizer(resolver: Arc<CountingResolver>) -> LocationNormalizer {
        LocationNormalizer::new(
            Arc::new(LocationCache::new(CachePolicy::Unbounded)),
            resolver,
        )
    }

    #[tokio::test]
    async fn resolves_each_distinct_string_once() {
        let resolver = Arc::new(CountingResolver::default());
        let normalizer = normalizer(Arc::clone(&resolver));
        let mut rows = records(&[Some("Austin"), Some("Austin"), Some("Boston"), None]);

        let stats = normalizer.normalize(&mut rows).await;

        assert_eq!(stats.distinct, 2);
        assert_eq!(resolver.calls.lock().expect("calls").len(), 2);
        assert_eq!(rows[0].get(fields::LOCATION), Some(&json!("Region:Austin")));
        assert_eq!(rows[1].get(fields::LOCATION), Some(&json!("Region:Austin")));
        assert_eq!(rows[3].get(fields::LOCATION), Some(&json!(UNKNOWN_LOCATION)));
        assert_eq!(normalizer.cache().len(), 2);
    }

    #[tokio::test]
    async fn cached_strings_skip_the_resolver() {
        let resolver = Arc::new(CountingResolver::default());
        let normalizer = normalizer(Arc::clone(&resolver));

        normalizer.normalize(&mut records(&[Some("Austin")])).await;
        let stats = normalizer
            .normalize(&mut records(&[Some("Austin"), Some("Denver")]))
            .await;

        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.resolved, 1);
        let calls = resolver.calls.lock().expect("calls").clone();
        assert_eq!(calls, vec!["Austin".to_string(), "Denver".to_string()]);
        assert_eq!(normalizer.cache().len(), 2);
    }

    #[tokio::test]
    async fn failures_fall_back_without_affecting_other_rows() {
        let resolver = Arc::new(CountingResolver::default());
        let normalizer = normalizer(Arc::clone(&resolver));
        let mut rows = records(&[Some("fail here"), Some("Austin")]);

        let stats = normalizer.normalize(&mut rows).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(rows[0].get(fields::LOCATION), Some(&json!(UNKNOWN_LOCATION)));
        assert_eq!(rows[1].get(fields::LOCATION), Some(&json!("Region:Austin")));
        assert_eq!(
            normalizer.cache().get("fail here").as_deref(),
            Some(UNKNOWN_LOCATION)
        );
    }

    #[tokio::test]
    async fn failed_strings_are_not_retried_while_cached() {
        let resolver = Arc::new(CountingResolver::default());
        let normalizer = normalizer(Arc::clone(&resolver));

        for _ in 0..3 {
            let mut rows = records(&[Some("fail again")]);
            normalizer.normalize(&mut rows).await;
            assert_eq!(rows[0].get(fields::LOCATION), Some(&json!(UNKNOWN_LOCATION)));
        }

        assert_eq!(resolver.calls.lock().expect("calls").len(), 1);
        assert_eq!(normalizer.cache().clear(), 1);
        normalizer.normalize(&mut records(&[Some("fail again")])).await;
        assert_eq!(resolver.calls.lock().expect("calls").len(), 2);
    }

    struct EchoResolver;

    #[async_trait]
    impl LocationResolver for EchoResolver {
        async fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
            Ok(raw.replace([' ', ','], ""))
        }
    }

    #[tokio::test]
    async fn district_spellings_fold_to_one_region() {
        let normalizer =
            LocationNormalizer::new(Arc::new(LocationCache::default()), Arc::new(EchoResolver));
        let mut rows = records(&[Some("Washington DC"), Some("Washington, D.C."), Some("Ohio")]);

        normalizer.normalize(&mut rows).await;

        assert_eq!(rows[0].get(fields::LOCATION), Some(&json!(DISTRICT_OF_COLUMBIA)));
        assert_eq!(rows[1].get(fields::LOCATION), Some(&json!(DISTRICT_OF_COLUMBIA)));
        assert_eq!(rows[2].get(fields::LOCATION), Some(&json!("Ohio")));
        assert_eq!(
            normalizer.cache().get("Washington DC").as_deref(),
            Some(DISTRICT_OF_COLUMBIA)
        );

        let schema = SchemaConfig::load(&SchemaSource::Builtin).expect("builtin schema");
        let (scored, _) = score_records(rows, &schema.default_scale, &schema);
        assert_eq!(scored[0].score_breakdown.get(ScoreFactor::Location), Some(3.0));
        assert_eq!(scored[0].score, 3.0);
    }

    struct FailingResolver;

    #[async_trait]
    impl LocationResolver for FailingResolver {
        async fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
            Err(ResolveError::Unresolved(raw.to_string()))
        }
    }

    #[tokio::test]
    async fn failed_district_spellings_still_fold() {
        let normalizer =
            LocationNormalizer::new(Arc::new(LocationCache::default()), Arc::new(FailingResolver));
        let mut rows = records(&[Some("Washington, DC"), Some("Gotham")]);

        let stats = normalizer.normalize(&mut rows).await;

        assert_eq!(stats.failed, 2);
        assert_eq!(rows[0].get(fields::LOCATION), Some(&json!(DISTRICT_OF_COLUMBIA)));
        assert_eq!(rows[1].get(fields::LOCATION), Some(&json!(UNKNOWN_LOCATION)));
    }

    #[tokio::test]
    async fn respects_the_concurrency_limit() {
        let resolver = Arc::new(CountingResolver::default());
        let normalizer = normalizer(Arc::clone(&resolver)).with_concurrency(2);
        let names: Vec<String> = (0..12).map(|index| format!("place-{index}")).collect();
        let mut rows = records(&names.iter().map(|name| Some(name.as_str())).collect::<Vec<_>>());

        normalizer.normalize(&mut rows).await;

        assert_eq!(resolver.calls.lock().expect("calls").len(), 12);
        assert!(resolver.peak.load(Ordering::SeqCst) <= 2);
    }

    struct StalledResolver;

    #[async_trait]
    impl LocationResolver for StalledResolver {
        async fn resolve(&self, _raw: &str) -> Result<String, ResolveError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("Never".to_string())
        }
    }

    #[tokio::test]
    async fn slow_resolutions_time_out_to_unknown() {
        let normalizer = LocationNormalizer::new(Arc::new(LocationCache::default()), Arc::new(StalledResolver))
            .with_timeout(Duration::from_millis(20));
        let mut rows = records(&[Some("Austin")]);

        let stats = normalizer.normalize(&mut rows).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(rows[0].get(fields::LOCATION), Some(&json!(UNKNOWN_LOCATION)));
        assert_eq!(
            normalizer.cache().get("Austin").as_deref(),
            Some(UNKNOWN_LOCATION)
        );
    }

    #[tokio::test]
    async fn records_without_location_are_untouched() {
        let resolver = Arc::new(CountingResolver::default());
        let normalizer = normalizer(Arc::clone(&resolver));
        let mut record = Record::new();
        record.set("name", json!("Ada"));
        let mut rows = vec![record];

        let stats = normalizer.normalize(&mut rows).await;

        assert_eq!(stats, LocationStats::default());
        assert!(!rows[0].contains(fields::LOCATION));
    }
}
