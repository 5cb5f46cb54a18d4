use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::clean;
use super::features::{
    category_label, CATEGORY_ID, CATEGORY_NAME, COMMENTS, DISLIKES, LIKES, SUBSCRIBERS,
    UNKNOWN_CATEGORY, VIEWS,
};
use super::model::{Dataset, Value};

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;
pub const DEFAULT_ROW_ESTIMATE: usize = 100_000;
pub const SAMPLE_SEED: u64 = 42;

pub const PUBLISHED: &str = "videoPublished";
pub const PUBLISH_YEAR: &str = "publishYear";
pub const PUBLISH_MONTH: &str = "publishMonth";
pub const PUBLISH_DATE: &str = "publishDate";

/// Columns every analysis expects; their absence is reported, not fatal.
pub const KEY_COLUMNS: [&str; 4] = [VIEWS, SUBSCRIBERS, LIKES, COMMENTS];

/// Columns that must be numeric; stray text in them is reported and nulled.
pub const NUMERIC_KEY_COLUMNS: [&str; 5] = [VIEWS, SUBSCRIBERS, LIKES, COMMENTS, DISLIKES];

/// Cell contents read as missing, on top of the empty string.
const NULL_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

// ---------------------------------------------------------------------------
// Configuration, events, errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Records per chunk when not sampling.
    pub chunk_size: usize,
    /// Progress denominator used when the row-count pre-scan fails.
    pub fallback_row_estimate: usize,
    /// Seed of the sub-sampling draw.
    pub sample_seed: u64,
    pub delimiter: char,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            fallback_row_estimate: DEFAULT_ROW_ESTIMATE,
            sample_seed: SAMPLE_SEED,
            delimiter: ',',
        }
    }
}

/// Snapshot emitted after every chunk and once on completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub processed_rows: usize,
    pub total_rows: usize,
    /// Category vocabulary seen so far, sorted.
    pub categories: Vec<String>,
    pub is_complete: bool,
    pub error: Option<String>,
}

/// Terminal failures of one load attempt.
///
/// `FileNotFound`, `EmptyOrMalformed` and `ParseError` mean "no data";
/// `LoadFailed` is an unexpected failure with its cause attached.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: '{}'", .0.display())]
    FileNotFound(PathBuf),

    #[error("file is empty or malformed: {0}")]
    EmptyOrMalformed(String),

    #[error("error parsing CSV file: {0}")]
    ParseError(String),

    #[error("data loading failed: {0}")]
    LoadFailed(#[source] csv::Error),
}

impl LoadError {
    /// Whether this outcome is an empty result rather than a hard failure.
    pub fn yields_empty(&self) -> bool {
        !matches!(self, LoadError::LoadFailed(_))
    }
}

/// Recoverable anomalies found while loading.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum LoadWarning {
    #[error("row count pre-scan failed ({reason}); assuming {estimate} rows")]
    RowEstimateFallback { estimate: usize, reason: String },

    #[error("missing key columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column '{column}' contains {count} non-numeric values")]
    NonNumericValues { column: String, count: usize },

    #[error("column '{column}': {count} values could not be parsed as timestamps")]
    UnparseableTimestamps { column: String, count: usize },

    #[error("column '{column}' could not be converted to timestamps; publish date columns omitted")]
    TimestampColumnNotConvertible { column: String },
}

/// A successfully loaded dataset plus what was learned along the way.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub dataset: Dataset,
    /// Final category vocabulary, sorted.
    pub categories: Vec<String>,
    /// Progress denominator that was reported.
    pub total_rows: usize,
    pub warnings: Vec<LoadWarning>,
}

// ---------------------------------------------------------------------------
// Chunked CSV reading
// ---------------------------------------------------------------------------

/// Iterator over fixed-size chunks of parsed rows.
///
/// Dropping it early releases the underlying reader.
pub struct CsvChunks<R> {
    records: csv::StringRecordsIntoIter<R>,
    chunk_size: usize,
}

impl<R: Read> CsvChunks<R> {
    pub fn new(reader: csv::Reader<R>, chunk_size: usize) -> Self {
        CsvChunks {
            records: reader.into_records(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<R: Read> Iterator for CsvChunks<R> {
    type Item = Result<Vec<Vec<Value>>, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut rows = Vec::with_capacity(self.chunk_size.min(4096));
        for result in self.records.by_ref() {
            match result {
                Ok(record) => rows.push(record.iter().map(parse_cell).collect()),
                Err(e) => return Some(Err(e)),
            }
            if rows.len() == self.chunk_size {
                break;
            }
        }
        if rows.is_empty() {
            None
        } else {
            Some(Ok(rows))
        }
    }
}

/// Infer a cell's type from its text.
pub fn parse_cell(s: &str) -> Value {
    if s.is_empty() || NULL_TOKENS.contains(&s) {
        return Value::Null;
    }
    let t = s.trim();
    if let Ok(i) = t.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = t.parse::<f64>() {
        return Value::float_or_null(f);
    }
    match t {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

/// Count data lines (total lines minus the header) without parsing.
pub fn count_data_rows(path: &Path) -> io::Result<usize> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut newlines = 0usize;
    let mut last = b'\n';
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        newlines += buf.iter().filter(|&&b| b == b'\n').count();
        last = buf[buf.len() - 1];
        let n = buf.len();
        reader.consume(n);
    }
    let lines = if last == b'\n' { newlines } else { newlines + 1 };
    Ok(lines.saturating_sub(1))
}

// ---------------------------------------------------------------------------
// DatasetLoader
// ---------------------------------------------------------------------------

/// Progress callback wrapper tracking the reported denominator.
struct Reporter<'a> {
    callback: Option<&'a mut dyn FnMut(&ProgressEvent)>,
    total_rows: usize,
}

impl Reporter<'_> {
    fn emit(&mut self, processed_rows: usize, categories: &BTreeSet<String>, is_complete: bool) {
        if let Some(cb) = self.callback.as_mut() {
            cb(&ProgressEvent {
                processed_rows,
                total_rows: self.total_rows,
                categories: categories.iter().cloned().collect(),
                is_complete,
                error: None,
            });
        }
    }

    fn fail(&mut self, message: String) {
        if let Some(cb) = self.callback.as_mut() {
            cb(&ProgressEvent {
                processed_rows: 0,
                total_rows: self.total_rows,
                categories: Vec::new(),
                is_complete: true,
                error: Some(message),
            });
        }
    }
}

/// Streams a delimited file into a [`Dataset`] with bounded per-step work.
#[derive(Debug, Clone, Default)]
pub struct DatasetLoader {
    config: LoaderConfig,
}

impl DatasetLoader {
    pub fn new(config: LoaderConfig) -> Self {
        DatasetLoader { config }
    }

    /// Load `path`, optionally capped at `sample_size` rows.
    ///
    /// Reads chunk by chunk, drops rows without a category, and reports
    /// progress after every chunk. When a sample is requested, reading stops
    /// once enough rows are in and the rows are then sub-sampled with a fixed
    /// seed. A `sample_size` of zero means no sampling.
    pub fn load(
        &self,
        path: &Path,
        sample_size: Option<usize>,
        progress: Option<&mut dyn FnMut(&ProgressEvent)>,
    ) -> Result<Loaded, LoadError> {
        let sample_size = sample_size.filter(|&s| s > 0);
        let mut reporter = Reporter {
            callback: progress,
            total_rows: 0,
        };

        if !path.exists() {
            log::error!("file not found: '{}'", path.display());
            return Err(LoadError::FileNotFound(path.to_path_buf()));
        }

        let result = self.load_inner(path, sample_size, &mut reporter);
        match &result {
            Ok(loaded) => log::info!(
                "loaded {} rows x {} columns from '{}'",
                loaded.dataset.len(),
                loaded.dataset.columns().len(),
                path.display()
            ),
            Err(e @ LoadError::LoadFailed(_)) => {
                log::error!("{e}");
                reporter.fail(e.to_string());
            }
            Err(e) => log::error!("{e}"),
        }
        result
    }

    fn load_inner(
        &self,
        path: &Path,
        sample_size: Option<usize>,
        reporter: &mut Reporter<'_>,
    ) -> Result<Loaded, LoadError> {
        let mut warnings = Vec::new();

        let estimate = match count_data_rows(path) {
            Ok(n) => n,
            Err(e) => {
                push_warning(
                    &mut warnings,
                    LoadWarning::RowEstimateFallback {
                        estimate: self.config.fallback_row_estimate,
                        reason: e.to_string(),
                    },
                );
                self.config.fallback_row_estimate
            }
        };
        reporter.total_rows = sample_size.map_or(estimate, |s| s.min(estimate));

        if !self.config.delimiter.is_ascii() {
            return Err(LoadError::EmptyOrMalformed(format!(
                "delimiter {:?} is not a single-byte ASCII character",
                self.config.delimiter
            )));
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter as u8)
            .has_headers(true)
            .from_path(path)
            .map_err(|e| classify(e, path))?;

        let headers = dedupe_headers(reader.headers().map_err(|e| classify(e, path))?);
        if headers.is_empty() {
            return Err(LoadError::EmptyOrMalformed(
                "no columns to parse from file".into(),
            ));
        }

        // name takes priority over the raw id
        let category_idx = headers
            .iter()
            .position(|h| h == CATEGORY_NAME)
            .or_else(|| headers.iter().position(|h| h == CATEGORY_ID));

        let chunk_size = match sample_size {
            Some(s) => self.config.chunk_size.min(s),
            None => self.config.chunk_size,
        };

        let mut rows: Vec<Vec<Value>> = Vec::new();
        let mut vocabulary: BTreeSet<String> = BTreeSet::new();
        let mut records_seen = 0usize;

        for chunk in CsvChunks::new(reader, chunk_size) {
            let mut chunk = chunk.map_err(|e| classify(e, path))?;
            records_seen += chunk.len();

            if let Some(idx) = category_idx {
                chunk.retain(|row| row.get(idx).is_some_and(|v| !v.is_null()));
                let from_ids = headers[idx] == CATEGORY_ID;
                vocabulary.extend(chunk.iter().filter_map(|row| category_key(&row[idx], from_ids)));
            }
            rows.append(&mut chunk);

            log::debug!("loaded {} rows ({records_seen} records read)", rows.len());
            reporter.emit(rows.len(), &vocabulary, false);

            if sample_size.is_some_and(|s| rows.len() >= s) {
                break;
            }
        }

        if records_seen == 0 {
            return Err(LoadError::EmptyOrMalformed("file has no data rows".into()));
        }
        if rows.is_empty() {
            log::warn!("every row lacked a category value; dataset is empty");
        }

        let mut dataset = Dataset::from_rows(&headers, rows);
        if let Some(s) = sample_size {
            if dataset.len() > s {
                dataset = sample_rows(&dataset, s, self.config.sample_seed);
            }
        }

        let missing: Vec<String> = KEY_COLUMNS
            .iter()
            .filter(|c| !dataset.has_column(c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            push_warning(&mut warnings, LoadWarning::MissingColumns(missing));
        }

        let dataset = coerce_numeric(dataset, &mut warnings);
        let dataset = derive_publish_time(dataset, &mut warnings);
        let dataset = clean::clean(&dataset);

        reporter.emit(dataset.len(), &vocabulary, true);

        Ok(Loaded {
            dataset,
            categories: vocabulary.into_iter().collect(),
            total_rows: reporter.total_rows,
            warnings,
        })
    }
}

/// Load with the default configuration.
pub fn load(
    path: &Path,
    sample_size: Option<usize>,
    progress: Option<&mut dyn FnMut(&ProgressEvent)>,
) -> Result<Loaded, LoadError> {
    DatasetLoader::default().load(path, sample_size, progress)
}

fn push_warning(warnings: &mut Vec<LoadWarning>, warning: LoadWarning) {
    log::warn!("{warning}");
    warnings.push(warning);
}

fn classify(err: csv::Error, path: &Path) -> LoadError {
    let kind = err.kind();
    if matches!(kind, csv::ErrorKind::Io(e) if e.kind() == io::ErrorKind::NotFound) {
        return LoadError::FileNotFound(path.to_path_buf());
    }
    if matches!(
        kind,
        csv::ErrorKind::Utf8 { .. } | csv::ErrorKind::UnequalLengths { .. }
    ) {
        return LoadError::ParseError(err.to_string());
    }
    LoadError::LoadFailed(err)
}

/// Make header names unique by suffixing repeats with `.1`, `.2`, ...
fn dedupe_headers(record: &csv::StringRecord) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::with_capacity(record.len());
    for h in record.iter() {
        let mut name = h.to_string();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{h}.{n}");
            n += 1;
        }
        seen.insert(name.clone());
        out.push(name);
    }
    if out.len() == 1 && out[0].is_empty() {
        out.clear();
    }
    out
}

/// Vocabulary entry for a category cell. Ids are mapped to the same labels
/// `features::engineer` writes to `categoryName`.
fn category_key(v: &Value, from_ids: bool) -> Option<String> {
    if v.is_null() {
        return None;
    }
    if from_ids {
        let label = v
            .as_whole_i64()
            .and_then(category_label)
            .unwrap_or(UNKNOWN_CATEGORY);
        return Some(label.to_string());
    }
    Some(v.to_string())
}

/// Uniform sample of `n` rows, reproducible for a given seed. Rows keep
/// their file order.
pub fn sample_rows(dataset: &Dataset, n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let amount = n.min(dataset.len());
    let mut indices = rand::seq::index::sample(&mut rng, dataset.len(), amount).into_vec();
    indices.sort_unstable();
    dataset.take_rows(&indices)
}

fn coerce_numeric(mut dataset: Dataset, warnings: &mut Vec<LoadWarning>) -> Dataset {
    for name in NUMERIC_KEY_COLUMNS {
        let Some(col) = dataset.column_mut(name) else {
            continue;
        };
        let mut count = 0usize;
        for v in col.values.iter_mut() {
            if !v.is_null() && !v.is_numeric() {
                *v = Value::Null;
                count += 1;
            }
        }
        if count > 0 {
            push_warning(
                warnings,
                LoadWarning::NonNumericValues {
                    column: name.to_string(),
                    count,
                },
            );
        }
    }
    dataset
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse `videoPublished` and add year, month and date columns.
///
/// Unparseable cells become null. When nothing converts, the column is left
/// untouched and no derived columns are added.
fn derive_publish_time(mut dataset: Dataset, warnings: &mut Vec<LoadWarning>) -> Dataset {
    let Some(col) = dataset.column(PUBLISHED) else {
        return dataset;
    };

    let mut failed = 0usize;
    let mut converted = 0usize;
    let parsed: Vec<Option<NaiveDateTime>> = col
        .values
        .iter()
        .map(|v| {
            let ts = match v {
                Value::Null => return None,
                Value::Timestamp(t) => Some(*t),
                Value::String(s) => parse_timestamp(s),
                _ => None,
            };
            match ts {
                Some(_) => converted += 1,
                None => failed += 1,
            }
            ts
        })
        .collect();

    if converted == 0 && failed > 0 {
        push_warning(
            warnings,
            LoadWarning::TimestampColumnNotConvertible {
                column: PUBLISHED.to_string(),
            },
        );
        return dataset;
    }
    if failed > 0 {
        push_warning(
            warnings,
            LoadWarning::UnparseableTimestamps {
                column: PUBLISHED.to_string(),
                count: failed,
            },
        );
    }

    let map = |f: &dyn Fn(NaiveDateTime) -> Value| -> Vec<Value> {
        parsed.iter().map(|t| t.map_or(Value::Null, f)).collect()
    };
    let timestamps = map(&Value::Timestamp);
    let years = map(&|t| Value::Integer(i64::from(t.year())));
    let months = map(&|t| Value::Integer(i64::from(t.month())));
    let dates = map(&|t| Value::Date(t.date()));

    dataset.set_column(PUBLISHED, timestamps);
    dataset.set_column(PUBLISH_YEAR, years);
    dataset.set_column(PUBLISH_MONTH, months);
    dataset.set_column(PUBLISH_DATE, dates);
    dataset
}
