use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use stipend_pipeline::error::ErrorCategory;
use stipend_pipeline::workflows::extraction::{
    ExtractionError, ExtractionPipeline, FileRecordSource, GazetteerResolver, LocationCache,
    LocationNormalizer, LocationResolver, RawTable, ResolveError, SchemaSource, ScoreFactor,
    ScoringScale, UNKNOWN_LOCATION,
};

/// Gazetteer lookups with a per-string call count.
#[derive(Default)]
struct CountingResolver {
    inner: GazetteerResolver,
    calls: Mutex<HashMap<String, usize>>,
}

impl CountingResolver {
    fn calls_for(&self, raw: &str) -> usize {
        self.calls
            .lock()
            .expect("calls mutex")
            .get(raw)
            .copied()
            .unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls mutex").values().sum()
    }
}

#[async_trait]
impl LocationResolver for CountingResolver {
    async fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
        *self
            .calls
            .lock()
            .expect("calls mutex")
            .entry(raw.to_string())
            .or_default() += 1;
        self.inner.resolve(raw).await
    }
}

/// Fails for one string and resolves everything else through the gazetteer.
struct FlakyResolver {
    broken: &'static str,
    inner: GazetteerResolver,
}

#[async_trait]
impl LocationResolver for FlakyResolver {
    async fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
        if raw == self.broken {
            return Err(ResolveError::Unavailable("lookup service down".to_string()));
        }
        self.inner.resolve(raw).await
    }
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn pipeline_with(resolver: Arc<dyn LocationResolver>) -> ExtractionPipeline {
    ExtractionPipeline::new(
        SchemaSource::Builtin,
        Arc::new(FileRecordSource::new(fixtures_dir())),
        LocationNormalizer::new(Arc::new(LocationCache::default()), resolver),
    )
}

fn table_from_csv(text: &str) -> RawTable {
    RawTable::from_csv_reader(text.as_bytes()).expect("csv parses")
}

#[tokio::test]
async fn fixture_roster_is_scored_with_the_default_scale() {
    let pipeline = pipeline_with(Arc::new(CountingResolver::default()));

    let report = pipeline
        .extract("roster_2025.csv", None)
        .await
        .expect("fixture extracts");

    assert_eq!(report.total_records, 6);
    assert_eq!(report.data.len(), report.total_records);
    assert_eq!(
        report.columns,
        vec![
            "name",
            "email",
            "school",
            "need_level",
            "paid_internship",
            "internship_type",
            "location",
            "hours",
            "month",
            "score",
            "score_breakdown"
        ]
    );

    let scores: Vec<f64> = report.data.iter().map(|record| record.score).collect();
    assert_eq!(scores, vec![22.0, 17.0, 5.0, 12.0, 21.0, 17.0]);

    let locations: Vec<_> = report
        .data
        .iter()
        .map(|record| record.get("location").cloned())
        .collect();
    assert_eq!(
        locations,
        vec![
            Some(json!("NewYork")),
            Some(json!("Texas")),
            Some(json!(UNKNOWN_LOCATION)),
            Some(json!("DistrictOfColumbia")),
            Some(json!("NewYork")),
            Some(json!(UNKNOWN_LOCATION)),
        ]
    );

    let first = &report.data[0];
    assert_eq!(first.get("hours"), Some(&json!("30+ Hours")));
    assert_eq!(first.get("month"), Some(&json!("June")));
    assert!(first.get("advisor_notes").is_none());
    assert_eq!(report.data[5].get("email"), Some(&serde_json::Value::Null));
    assert_eq!(report.data[4].get("hours"), Some(&json!("Unknown")));

    assert_eq!(
        report.warnings,
        vec![
            "Invalid paid_internship values: [maybe]".to_string(),
            "Unscored paid_internship values: [maybe]".to_string(),
        ]
    );
}

#[tokio::test]
async fn invalid_values_are_reported_but_rows_are_kept_unchanged() {
    let pipeline = pipeline_with(Arc::new(CountingResolver::default()));
    let report = pipeline
        .extract("roster_2025.csv", None)
        .await
        .expect("fixture extracts");

    let katherine = &report.data[2];
    assert_eq!(katherine.get("paid_internship"), Some(&json!("maybe")));
    assert_eq!(
        katherine.score_breakdown.get(ScoreFactor::PaidInternship),
        Some(0.0)
    );
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("paid_internship") && warning.contains("maybe")));
}

#[tokio::test]
async fn headers_match_regardless_of_case_and_spacing() {
    let pipeline = pipeline_with(Arc::new(CountingResolver::default()));
    let table = table_from_csv(
        "\u{feff} NAME ,email address,School,fafsa need level,IS YOUR INTERNSHIP PAID?,Internship   Type,internship location,Hours Per Week,internship start date\n\
         Ada,ada@example.edu,State U,High Need,Paid,Virtual,Ohio,10,2025-08-04\n",
    );

    let report = pipeline.extract_table(table, None).await.expect("headers match");

    assert_eq!(report.total_records, 1);
    assert_eq!(report.data[0].get("name"), Some(&json!("Ada")));
    assert_eq!(report.data[0].score, 12.0 + 4.0 + 0.0 + 1.0);
}

#[tokio::test]
async fn missing_columns_fail_the_whole_extraction() {
    let pipeline = pipeline_with(Arc::new(CountingResolver::default()));
    let table = table_from_csv(
        "Name,Email Address,School,FAFSA Need Level,Is your internship paid?,Internship Type,Internship Start Date\n\
         Ada,ada@example.edu,State U,High Need,Paid,Virtual,2025-08-04\n",
    );

    let error = pipeline
        .extract_table(table, None)
        .await
        .expect_err("columns are missing");

    match &error {
        ExtractionError::MissingColumns { columns } => {
            assert_eq!(columns, &vec!["location".to_string(), "hours".to_string()]);
        }
        other => panic!("expected missing columns, got {other:?}"),
    }
    assert_eq!(error.category(), ErrorCategory::Client);
}

#[tokio::test]
async fn cached_locations_are_not_resolved_again() {
    let resolver = Arc::new(CountingResolver::default());
    let pipeline = pipeline_with(resolver.clone());

    pipeline
        .extract("roster_2025.csv", None)
        .await
        .expect("first extraction");
    assert_eq!(resolver.total_calls(), 5);
    assert_eq!(resolver.calls_for("New York, NY"), 1);
    assert_eq!(pipeline.cache_snapshot().size, 5);

    pipeline
        .extract("roster_2025.csv", None)
        .await
        .expect("second extraction");
    assert_eq!(resolver.calls_for("New York, NY"), 1);
    assert_eq!(resolver.calls_for("Austin, TX"), 1);
    assert_eq!(resolver.calls_for("Atlantis"), 1);
    assert_eq!(resolver.total_calls(), 5);
    assert_eq!(pipeline.cache_snapshot().size, 5);
    assert_eq!(
        pipeline.cache_snapshot().entries.get("Atlantis").map(String::as_str),
        Some(UNKNOWN_LOCATION)
    );
}

#[tokio::test]
async fn repeated_extractions_are_identical() {
    let pipeline = pipeline_with(Arc::new(CountingResolver::default()));

    let first = pipeline
        .extract("roster_2025.csv", None)
        .await
        .expect("first extraction");
    let second = pipeline
        .extract("roster_2025.csv", None)
        .await
        .expect("second extraction");

    assert_eq!(first, second);
}

#[tokio::test]
async fn clearing_the_cache_forces_re_resolution() {
    let resolver = Arc::new(CountingResolver::default());
    let pipeline = pipeline_with(resolver.clone());
    pipeline
        .extract("roster_2025.csv", None)
        .await
        .expect("first extraction");

    assert_eq!(pipeline.clear_cache(), 5);
    assert_eq!(pipeline.cache_snapshot().size, 0);

    pipeline
        .extract("roster_2025.csv", None)
        .await
        .expect("second extraction");
    assert_eq!(resolver.calls_for("New York, NY"), 2);
    assert_eq!(resolver.calls_for("Atlantis"), 2);
    assert_eq!(pipeline.cache_snapshot().size, 5);
}

#[tokio::test]
async fn one_failed_lookup_does_not_affect_other_rows() {
    let pipeline = pipeline_with(Arc::new(FlakyResolver {
        broken: "Austin, TX",
        inner: GazetteerResolver::new(),
    }));

    let report = pipeline
        .extract("roster_2025.csv", None)
        .await
        .expect("extraction survives resolver failure");

    assert_eq!(report.total_records, 6);
    assert_eq!(report.data[1].get("location"), Some(&json!(UNKNOWN_LOCATION)));
    assert_eq!(report.data[0].get("location"), Some(&json!("NewYork")));
    assert_eq!(report.data[3].get("location"), Some(&json!("DistrictOfColumbia")));
    assert_eq!(
        pipeline.cache_snapshot().entries.get("Austin, TX").map(String::as_str),
        Some(UNKNOWN_LOCATION)
    );
}

#[tokio::test]
async fn need_level_alone_produces_a_single_factor_score() {
    let dir = tempfile::tempdir().expect("temp dir");
    let schema_path = dir.path().join("csv_config.json");
    std::fs::write(
        &schema_path,
        r#"{
            "columns": {"name": "Name", "need_level": "FAFSA Need Level"},
            "renamed_columns": {"Name": "name", "FAFSA Need Level": "need_level"},
            "validations": {"name": {"valid_values": "any"}},
            "default_scale": {}
        }"#,
    )
    .expect("schema written");
    let pipeline = ExtractionPipeline::new(
        SchemaSource::File(schema_path),
        Arc::new(FileRecordSource::new(dir.path())),
        LocationNormalizer::new(
            Arc::new(LocationCache::default()),
            Arc::new(CountingResolver::default()),
        ),
    );
    let scale: ScoringScale =
        serde_json::from_str(r#"{"fafsaScale": {"veryHighNeed": 10}}"#).expect("scale parses");

    let report = pipeline
        .extract_table(
            table_from_csv("Name,FAFSA Need Level\nAda,Very High Need\n"),
            Some(scale),
        )
        .await
        .expect("extracts");

    let record = &report.data[0];
    assert_eq!(record.score, 10.0);
    assert_eq!(
        serde_json::to_value(&record.score_breakdown).expect("serializes"),
        json!({"need_level": 10.0})
    );
}

#[tokio::test]
async fn json_rosters_run_through_the_same_pipeline() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join("roster.json"),
        json!([{
            "Name": "Ada",
            "Email Address": "ada@example.edu",
            "School": "State U",
            "FAFSA Need Level": "Low Need",
            "Is your internship paid?": "Paid",
            "Internship Type": "Hybrid",
            "Internship Location": "Portland, OR",
            "Hours per Week": 32,
            "Internship Start Date": "2025-09-02"
        }])
        .to_string(),
    )
    .expect("json roster written");
    let pipeline = ExtractionPipeline::new(
        SchemaSource::Builtin,
        Arc::new(FileRecordSource::new(dir.path())),
        LocationNormalizer::new(
            Arc::new(LocationCache::default()),
            Arc::new(GazetteerResolver::new()),
        ),
    );

    let report = pipeline.extract("roster.json", None).await.expect("extracts");

    assert_eq!(report.data[0].get("location"), Some(&json!("Oregon")));
    assert_eq!(report.data[0].get("hours"), Some(&json!("30+ Hours")));
    assert_eq!(report.data[0].score, 5.0 + 4.0 + 1.0 + 3.0);
}

#[tokio::test]
async fn concurrent_extractions_share_one_cache() {
    let resolver = Arc::new(CountingResolver::default());
    let pipeline = pipeline_with(resolver.clone());
    let other = pipeline.clone();

    let (left, right) = tokio::join!(
        pipeline.extract("roster_2025.csv", None),
        other.extract("roster_2025.csv", None)
    );

    assert_eq!(left.expect("left"), right.expect("right"));
    assert_eq!(pipeline.cache_snapshot(), other.cache_snapshot());
    assert_eq!(pipeline.cache_snapshot().size, 5);
    assert!(resolver.calls_for("New York, NY") <= 2);
}

#[tokio::test]
async fn unknown_files_are_not_found() {
    let pipeline = pipeline_with(Arc::new(CountingResolver::default()));
    let error = pipeline
        .extract("missing.csv", None)
        .await
        .expect_err("file does not exist");
    assert_eq!(error.category(), ErrorCategory::NotFound);
}
