//! End-to-end tests: CSV on disk → loader → features → filter.

use std::io::Write;
use std::path::Path;

use rusty_tube::data::filter::{self, FilterIssue, Stage, StageStatus};
use rusty_tube::data::loader::{LoadWarning, PUBLISHED};
use rusty_tube::data::{features, DatasetLoader, FilterSpec, LoadError, LoaderConfig, ProgressEvent, Value};

fn write_csv(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).expect("create csv");
    f.write_all(contents.as_bytes()).expect("write csv");
    path
}

/// `rows` synthetic videos with a unique `videoId` and a rotating category.
fn synthetic_csv(dir: &Path, rows: usize) -> std::path::PathBuf {
    let mut text = String::from("videoId,videoViewCount,videoLikeCount,videoCategoryId\n");
    for i in 0..rows {
        let category = [10, 20, 24, 27][i % 4];
        text.push_str(&format!("v{i},{},{},{category}\n", 100 + i * 7, i % 50));
    }
    write_csv(dir, "synthetic.csv", &text)
}

fn load_with_events(
    loader: &DatasetLoader,
    path: &Path,
    sample: Option<usize>,
) -> (Result<rusty_tube::data::Loaded, LoadError>, Vec<ProgressEvent>) {
    let mut events = Vec::new();
    let mut on_progress = |ev: &ProgressEvent| events.push(ev.clone());
    let progress: &mut dyn FnMut(&ProgressEvent) = &mut on_progress;
    let result = loader.load(path, sample, Some(progress));
    (result, events)
}

fn approx(v: &Value, expected: f64) -> bool {
    v.as_f64().is_some_and(|x| (x - expected).abs() < 1e-12)
}

#[test]
fn three_row_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "videos.csv",
        "videoViewCount,videoLikeCount,VideoCommentCount,subscriberCount,videoCategoryId\n\
         1000,50,10,5000,10\n\
         2000,-1.0,5,8000,24\n\
         500,10,2000,3000,1\n",
    );

    let loaded = DatasetLoader::default().load(&path, None, None).unwrap();
    let ds = &loaded.dataset;
    assert_eq!(ds.len(), 3);
    assert!(ds.column("videoLikeCount").unwrap().values[1].is_null());

    let out = features::engineer(ds);
    let like_rate = &out.column("like_rate").unwrap().values;
    assert!(approx(&like_rate[0], 0.05));
    assert!(like_rate[1].is_null());

    // comment_rate is not clamped, unlike like_rate
    let comment_rate = &out.column("comment_rate").unwrap().values;
    assert!(approx(&comment_rate[2], 4.0));

    let names = &out.column("categoryName").unwrap().values;
    assert_eq!(names[0], Value::String("Music".into()));
    assert_eq!(names[1], Value::String("Entertainment".into()));
    assert_eq!(names[2], Value::String("Film & Animation".into()));
}

#[test]
fn missing_file_is_file_not_found_without_progress() {
    let dir = tempfile::tempdir().unwrap();
    let (result, events) = load_with_events(
        &DatasetLoader::default(),
        &dir.path().join("nope.csv"),
        Some(10),
    );
    let err = result.unwrap_err();
    assert!(matches!(err, LoadError::FileNotFound(_)));
    assert!(err.yields_empty());
    assert!(events.iter().all(|e| e.processed_rows == 0));
}

#[test]
fn empty_file_is_empty_or_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let empty = write_csv(dir.path(), "empty.csv", "");
    let header_only = write_csv(dir.path(), "header.csv", "a,b\n");
    for path in [empty, header_only] {
        let err = DatasetLoader::default().load(&path, None, None).unwrap_err();
        assert!(matches!(err, LoadError::EmptyOrMalformed(_)), "{err}");
    }
}

#[test]
fn ragged_rows_are_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "bad.csv", "a,b\n1,2\n3,4,5\n");
    let err = DatasetLoader::default().load(&path, None, None).unwrap_err();
    match err {
        LoadError::ParseError(msg) => assert!(!msg.is_empty()),
        other => panic!("expected ParseError, got {other}"),
    }
}

#[cfg(unix)]
#[test]
fn unreadable_source_is_load_failed_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (result, events) = load_with_events(&DatasetLoader::default(), dir.path(), None);
    let err = result.unwrap_err();
    assert!(matches!(err, LoadError::LoadFailed(_)));
    assert!(!err.yields_empty());
    let last = events.last().expect("error event");
    assert!(last.is_complete);
    assert!(last.error.is_some());
}

#[test]
fn vocabulary_grows_monotonically_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let path = synthetic_csv(dir.path(), 25);
    let loader = DatasetLoader::new(LoaderConfig {
        chunk_size: 2,
        ..LoaderConfig::default()
    });
    let (result, events) = load_with_events(&loader, &path, None);
    let loaded = result.unwrap();

    assert!(events.len() > 2);
    for pair in events.windows(2) {
        assert!(pair[0].categories.len() <= pair[1].categories.len());
        assert!(pair[0].processed_rows <= pair[1].processed_rows);
    }
    let last = events.last().unwrap();
    assert!(last.is_complete);
    assert_eq!(last.total_rows, 25);
    assert_eq!(
        last.categories,
        vec!["Education", "Entertainment", "Gaming", "Music"]
    );
    assert!(events[..events.len() - 1].iter().all(|e| !e.is_complete));
    assert_eq!(loaded.categories, last.categories);
}

#[test]
fn sampling_is_capped_and_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let path = synthetic_csv(dir.path(), 12_000);
    let loader = DatasetLoader::new(LoaderConfig {
        chunk_size: 3_000,
        ..LoaderConfig::default()
    });

    let keys = |ds: &rusty_tube::data::Dataset| -> Vec<String> {
        ds.column("videoId")
            .unwrap()
            .values
            .iter()
            .map(|v| v.to_string())
            .collect()
    };

    let (first, events) = load_with_events(&loader, &path, Some(5_000));
    let first = first.unwrap();
    assert_eq!(first.dataset.len(), 5_000);
    // reading stops at the chunk that crosses the cap: 2 x 3000 rows, then
    // the completion event reports the sampled size
    let progress: Vec<usize> = events.iter().map(|e| e.processed_rows).collect();
    assert_eq!(progress, vec![3_000, 6_000, 5_000]);
    assert!(events.iter().all(|e| e.total_rows == 5_000));

    let second = loader.load(&path, Some(5_000), None).unwrap();
    assert_eq!(keys(&first.dataset), keys(&second.dataset));

    // rows from beyond the chunks that were read never appear
    assert!(keys(&first.dataset)
        .iter()
        .all(|k| k[1..].parse::<usize>().unwrap() < 6_000));
}

#[test]
fn timestamps_that_fail_are_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "ts.csv",
        "videoViewCount,videoPublished\n10,2020-07-01 12:00:00\n20,soon\n",
    );
    let loaded = DatasetLoader::default().load(&path, None, None).unwrap();
    assert!(loaded.warnings.iter().any(|w| matches!(
        w,
        LoadWarning::UnparseableTimestamps { column, count: 1 } if column == PUBLISHED
    )));
    let out = features::engineer(&loaded.dataset);
    assert_eq!(
        out.column("season").unwrap().values,
        vec![Value::String("Summer".into()), Value::Null]
    );
}

#[test]
fn invalid_max_and_fallback_through_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = synthetic_csv(dir.path(), 40);
    let loaded = DatasetLoader::default().load(&path, None, None).unwrap();
    let engineered = features::engineer(&loaded.dataset);

    let spec = FilterSpec {
        min_views: Some(200),
        max_views: Some(150),
        filter_outliers: false,
        ..FilterSpec::default()
    };
    let out = filter::apply(&engineered, &spec);
    let max = out
        .diagnostics
        .iter()
        .find(|d| d.stage == Stage::MaxViews)
        .unwrap();
    assert_eq!(max.status, StageStatus::Skipped);
    assert!(matches!(
        max.issue,
        Some(FilterIssue::InvalidFilterParameter { .. })
    ));
    // 100 + 7i >= 200  <=>  i >= 15
    assert_eq!(out.dataset.len(), 25);

    let too_strict = FilterSpec {
        min_views: Some(1_000_000),
        ..FilterSpec::default()
    };
    let out = filter::apply(&engineered, &too_strict);
    assert!(out.reverted);
    assert_eq!(out.dataset.len(), engineered.len());
    assert!(out
        .issues()
        .any(|i| *i == FilterIssue::EmptyResultAfterFiltering));
}

#[test]
fn loaded_vocabulary_selects_rows_in_the_category_filter() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "ids.csv",
        "videoViewCount,videoCategoryId\n10,10\n20,24\n30,10\n",
    );
    let loaded = DatasetLoader::default().load(&path, None, None).unwrap();
    assert_eq!(loaded.categories, vec!["Entertainment", "Music"]);

    let engineered = features::engineer(&loaded.dataset);
    let spec = FilterSpec {
        categories: loaded.categories[1..].iter().cloned().collect(),
        filter_outliers: false,
        ..FilterSpec::default()
    };
    let out = filter::apply(&engineered, &spec);
    assert!(!out.reverted);
    assert_eq!(out.dataset.len(), 2);
    assert_eq!(
        out.dataset.column("videoViewCount").unwrap().values,
        vec![Value::Integer(10), Value::Integer(30)]
    );
}

#[test]
fn category_filter_uses_engineered_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = synthetic_csv(dir.path(), 40);
    let loaded = DatasetLoader::default().load(&path, None, None).unwrap();
    let engineered = features::engineer(&loaded.dataset);
    let spec = FilterSpec {
        categories: ["Music".to_string(), "Gaming".to_string()].into_iter().collect(),
        filter_outliers: false,
        ..FilterSpec::default()
    };
    let out = filter::apply(&engineered, &spec);
    assert_eq!(out.dataset.len(), 20);
}
