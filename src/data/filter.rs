use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::features::{CATEGORY_NAME, COMMENTS, LIKES, SUBSCRIBERS, VIEWS};
use super::model::{Dataset, Value};
use super::stats::IqrBounds;

/// Columns screened by the outlier stage.
pub const OUTLIER_COLUMNS: [&str; 4] = [VIEWS, LIKES, COMMENTS, SUBSCRIBERS];

// ---------------------------------------------------------------------------
// FilterSpec – what the user asked for
// ---------------------------------------------------------------------------

/// Declarative filter settings. An empty `categories` set means "all".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub min_views: Option<i64>,
    pub max_views: Option<i64>,
    pub categories: BTreeSet<String>,
    pub filter_outliers: bool,
}

impl Default for FilterSpec {
    fn default() -> Self {
        FilterSpec {
            min_views: None,
            max_views: None,
            categories: BTreeSet::new(),
            filter_outliers: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    MinViews,
    MaxViews,
    Category,
    Outlier,
    Fallback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::MinViews => "min-views",
            Stage::MaxViews => "max-views",
            Stage::Category => "category",
            Stage::Outlier => "outlier",
            Stage::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageStatus {
    Applied,
    /// Requested but bypassed because its inputs were invalid or missing.
    Skipped,
    NotRequested,
    /// The filtered result was discarded in favour of the input.
    Reverted,
}

/// Non-fatal problems; each one is handled by skipping or reverting.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum FilterIssue {
    #[error("invalid {parameter} = {value}: {reason}; filter ignored")]
    InvalidFilterParameter {
        parameter: &'static str,
        value: i64,
        reason: String,
    },

    #[error("column '{0}' is missing; filter ignored")]
    MissingColumn(String),

    #[error("none of the outlier columns are present and numeric; outlier filter ignored")]
    NoOutlierColumns,

    #[error("filters removed every row and were too restrictive; showing unfiltered data")]
    EmptyResultAfterFiltering,
}

/// What one stage did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDiagnostic {
    pub stage: Stage,
    pub status: StageStatus,
    pub rows_before: usize,
    pub rows_after: usize,
    pub issue: Option<FilterIssue>,
}

impl FilterDiagnostic {
    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

impl fmt::Display for FilterDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10} {:?}: {} -> {} rows",
            self.stage.to_string(),
            self.status,
            self.rows_before,
            self.rows_after
        )?;
        if let Some(issue) = &self.issue {
            write!(f, " ({issue})")?;
        }
        Ok(())
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub dataset: Dataset,
    pub diagnostics: Vec<FilterDiagnostic>,
    /// True when the empty result was replaced by the unfiltered input.
    pub reverted: bool,
}

impl FilterOutcome {
    /// Every issue raised during the run, in stage order.
    pub fn issues(&self) -> impl Iterator<Item = &FilterIssue> {
        self.diagnostics.iter().filter_map(|d| d.issue.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Apply min-views, max-views, category and outlier filters in that order.
///
/// Invalid stages are bypassed, never fatal. If the stages leave no rows,
/// the input dataset is returned instead and the run is marked reverted.
pub fn apply(dataset: &Dataset, spec: &FilterSpec) -> FilterOutcome {
    let mut diagnostics = Vec::with_capacity(5);
    let mut current = dataset.clone();

    current = min_views_stage(current, spec, &mut diagnostics);
    current = max_views_stage(current, spec, &mut diagnostics);
    current = category_stage(current, spec, &mut diagnostics);
    current = outlier_stage(current, spec, &mut diagnostics);

    let filtered_away = current.is_empty() && !dataset.is_empty();
    if filtered_away {
        let d = FilterDiagnostic {
            stage: Stage::Fallback,
            status: StageStatus::Reverted,
            rows_before: 0,
            rows_after: dataset.len(),
            issue: Some(FilterIssue::EmptyResultAfterFiltering),
        };
        log::warn!("{d}");
        diagnostics.push(d);
        current = dataset.clone();
    }

    FilterOutcome {
        dataset: current,
        diagnostics,
        reverted: filtered_away,
    }
}

fn record(
    diagnostics: &mut Vec<FilterDiagnostic>,
    stage: Stage,
    status: StageStatus,
    rows_before: usize,
    rows_after: usize,
    issue: Option<FilterIssue>,
) {
    let d = FilterDiagnostic {
        stage,
        status,
        rows_before,
        rows_after,
        issue,
    };
    match (&d.status, &d.issue) {
        (_, Some(_)) => log::warn!("{d}"),
        (StageStatus::NotRequested, None) => log::debug!("{d}"),
        _ => log::info!("{d}"),
    }
    diagnostics.push(d);
}

/// Keep rows whose view count satisfies `keep`; null views never satisfy it.
fn filter_views(dataset: &Dataset, keep: impl Fn(f64) -> bool) -> Option<Dataset> {
    let views = dataset.column(VIEWS)?;
    let mask: Vec<bool> = views
        .values
        .iter()
        .map(|v| v.as_f64().is_some_and(&keep))
        .collect();
    Some(dataset.retain_rows(&mask))
}

fn min_views_stage(ds: Dataset, spec: &FilterSpec, diags: &mut Vec<FilterDiagnostic>) -> Dataset {
    let before = ds.len();
    let Some(min) = spec.min_views else {
        record(diags, Stage::MinViews, StageStatus::NotRequested, before, before, None);
        return ds;
    };
    if min < 0 {
        let issue = FilterIssue::InvalidFilterParameter {
            parameter: "min_views",
            value: min,
            reason: "minimum views cannot be negative".into(),
        };
        record(diags, Stage::MinViews, StageStatus::Skipped, before, before, Some(issue));
        return ds;
    }
    match filter_views(&ds, |v| v >= min as f64) {
        Some(out) => {
            record(diags, Stage::MinViews, StageStatus::Applied, before, out.len(), None);
            out
        }
        None => {
            let issue = FilterIssue::MissingColumn(VIEWS.into());
            record(diags, Stage::MinViews, StageStatus::Skipped, before, before, Some(issue));
            ds
        }
    }
}

fn max_views_stage(ds: Dataset, spec: &FilterSpec, diags: &mut Vec<FilterDiagnostic>) -> Dataset {
    let before = ds.len();
    let Some(max) = spec.max_views else {
        record(diags, Stage::MaxViews, StageStatus::NotRequested, before, before, None);
        return ds;
    };
    let invalid = if max < 0 {
        Some("maximum views cannot be negative".to_string())
    } else {
        spec.min_views
            .filter(|&min| max < min)
            .map(|min| format!("maximum views is below minimum views ({min})"))
    };
    if let Some(reason) = invalid {
        let issue = FilterIssue::InvalidFilterParameter {
            parameter: "max_views",
            value: max,
            reason,
        };
        record(diags, Stage::MaxViews, StageStatus::Skipped, before, before, Some(issue));
        return ds;
    }
    match filter_views(&ds, |v| v <= max as f64) {
        Some(out) => {
            record(diags, Stage::MaxViews, StageStatus::Applied, before, out.len(), None);
            out
        }
        None => {
            let issue = FilterIssue::MissingColumn(VIEWS.into());
            record(diags, Stage::MaxViews, StageStatus::Skipped, before, before, Some(issue));
            ds
        }
    }
}

fn category_stage(ds: Dataset, spec: &FilterSpec, diags: &mut Vec<FilterDiagnostic>) -> Dataset {
    let before = ds.len();
    if spec.categories.is_empty() {
        record(diags, Stage::Category, StageStatus::NotRequested, before, before, None);
        return ds;
    }
    let Some(names) = ds.column(CATEGORY_NAME) else {
        let issue = FilterIssue::MissingColumn(CATEGORY_NAME.into());
        record(diags, Stage::Category, StageStatus::Skipped, before, before, Some(issue));
        return ds;
    };
    let mask: Vec<bool> = names
        .values
        .iter()
        .map(|v| matches!(v, Value::String(s) if spec.categories.contains(s)))
        .collect();
    let out = ds.retain_rows(&mask);
    record(diags, Stage::Category, StageStatus::Applied, before, out.len(), None);
    out
}

/// Tukey bounds for every outlier column that is present and numeric.
pub fn outlier_bounds(dataset: &Dataset) -> Vec<(&'static str, IqrBounds)> {
    OUTLIER_COLUMNS
        .iter()
        .filter_map(|&name| {
            let col = dataset.column(name).filter(|c| c.is_numeric())?;
            IqrBounds::from_values(&col.numeric_values()).map(|b| (name, b))
        })
        .collect()
}

fn outlier_stage(ds: Dataset, spec: &FilterSpec, diags: &mut Vec<FilterDiagnostic>) -> Dataset {
    let before = ds.len();
    if !spec.filter_outliers {
        record(diags, Stage::Outlier, StageStatus::NotRequested, before, before, None);
        return ds;
    }
    let bounds = outlier_bounds(&ds);
    if bounds.is_empty() {
        let issue = FilterIssue::NoOutlierColumns;
        record(diags, Stage::Outlier, StageStatus::Skipped, before, before, Some(issue));
        return ds;
    }
    for (name, b) in &bounds {
        log::debug!("outlier bounds for '{name}': [{}, {}]", b.lower, b.upper);
    }

    // A row must sit inside the fence on every evaluated column; a null
    // cell is not inside it.
    let mut mask = vec![true; before];
    for (name, b) in &bounds {
        if let Some(col) = ds.column(name) {
            for (keep, v) in mask.iter_mut().zip(&col.values) {
                *keep &= v.as_f64().is_some_and(|x| b.contains(x));
            }
        }
    }
    let out = ds.retain_rows(&mask);
    record(diags, Stage::Outlier, StageStatus::Applied, before, out.len(), None);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn dataset(views: &[i64], categories: &[&str]) -> Dataset {
        Dataset::from_columns(vec![
            Column::new(VIEWS, views.iter().map(|&v| Value::Integer(v)).collect()),
            Column::new(
                CATEGORY_NAME,
                categories
                    .iter()
                    .map(|c| Value::String(c.to_string()))
                    .collect(),
            ),
        ])
        .unwrap()
    }

    fn no_outliers() -> FilterSpec {
        FilterSpec {
            filter_outliers: false,
            ..FilterSpec::default()
        }
    }

    fn diag(outcome: &FilterOutcome, stage: Stage) -> &FilterDiagnostic {
        outcome
            .diagnostics
            .iter()
            .find(|d| d.stage == stage)
            .expect("stage diagnostic")
    }

    #[test]
    fn view_bounds_are_inclusive() {
        let ds = dataset(&[100, 500, 1000, 5000], &["a", "a", "a", "a"]);
        let spec = FilterSpec {
            min_views: Some(500),
            max_views: Some(1000),
            ..no_outliers()
        };
        let out = apply(&ds, &spec);
        assert_eq!(out.dataset.len(), 2);
        assert_eq!(diag(&out, Stage::MinViews).rows_removed(), 1);
        assert_eq!(diag(&out, Stage::MaxViews).rows_removed(), 1);
        assert!(!out.reverted);
    }

    #[test]
    fn max_below_min_skips_only_the_max_stage() {
        let ds = dataset(&[100, 1000, 2000, 3000], &["a", "a", "a", "a"]);
        let spec = FilterSpec {
            min_views: Some(1000),
            max_views: Some(500),
            ..no_outliers()
        };
        let out = apply(&ds, &spec);
        assert_eq!(out.dataset.len(), 3);
        let max = diag(&out, Stage::MaxViews);
        assert_eq!(max.status, StageStatus::Skipped);
        assert!(matches!(
            max.issue,
            Some(FilterIssue::InvalidFilterParameter { parameter: "max_views", value: 500, .. })
        ));
    }

    #[test]
    fn negative_min_is_skipped_with_warning() {
        let ds = dataset(&[1, 2], &["a", "b"]);
        let spec = FilterSpec {
            min_views: Some(-5),
            ..no_outliers()
        };
        let out = apply(&ds, &spec);
        assert_eq!(out.dataset.len(), 2);
        assert_eq!(diag(&out, Stage::MinViews).status, StageStatus::Skipped);
        assert_eq!(out.issues().count(), 1);
    }

    #[test]
    fn empty_category_selection_means_all() {
        let ds = dataset(&[1, 2, 3], &["Music", "Gaming", "Music"]);
        let out = apply(&ds, &no_outliers());
        assert_eq!(out.dataset.len(), 3);
        assert_eq!(diag(&out, Stage::Category).status, StageStatus::NotRequested);

        let spec = FilterSpec {
            categories: ["Music".to_string()].into_iter().collect(),
            ..no_outliers()
        };
        let out = apply(&ds, &spec);
        assert_eq!(out.dataset.len(), 2);
    }

    #[test]
    fn empty_result_reverts_to_input() {
        let ds = dataset(&[10, 20, 30], &["a", "b", "c"]);
        let spec = FilterSpec {
            min_views: Some(1_000_000),
            ..no_outliers()
        };
        let out = apply(&ds, &spec);
        assert!(out.reverted);
        assert_eq!(out.dataset, ds);
        assert_eq!(diag(&out, Stage::MinViews).rows_after, 0);
        let fallback = diag(&out, Stage::Fallback);
        assert_eq!(fallback.status, StageStatus::Reverted);
        assert_eq!(fallback.issue, Some(FilterIssue::EmptyResultAfterFiltering));
    }

    #[test]
    fn outlier_filter_is_conjunctive_across_columns() {
        let ds = Dataset::from_columns(vec![
            Column::new(
                VIEWS,
                [10, 11, 12, 13, 14, 1000]
                    .iter()
                    .map(|&v| Value::Integer(v))
                    .collect(),
            ),
            Column::new(
                LIKES,
                [1, 2, 900, 2, 1, 2].iter().map(|&v| Value::Integer(v)).collect(),
            ),
        ])
        .unwrap();
        let out = apply(&ds, &FilterSpec::default());
        // row 2 fails on likes, row 5 fails on views
        assert_eq!(out.dataset.len(), 4);
        assert_eq!(
            out.dataset.column(VIEWS).unwrap().values,
            [10, 11, 13, 14].iter().map(|&v| Value::Integer(v)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn nulls_fall_outside_the_outlier_fence() {
        let ds = Dataset::from_columns(vec![Column::new(
            VIEWS,
            vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Null,
                Value::Integer(3),
            ],
        )])
        .unwrap();
        let out = apply(&ds, &FilterSpec::default());
        assert_eq!(out.dataset.len(), 3);
        assert!(out.dataset.column(VIEWS).unwrap().values.iter().all(|v| !v.is_null()));
        assert_eq!(diag(&out, Stage::Outlier).rows_removed(), 1);
    }

    #[test]
    fn missing_view_column_is_reported() {
        let ds = Dataset::from_columns(vec![Column::new("other", vec![Value::Integer(1)])]).unwrap();
        let spec = FilterSpec {
            min_views: Some(1),
            ..FilterSpec::default()
        };
        let out = apply(&ds, &spec);
        assert_eq!(
            diag(&out, Stage::MinViews).issue,
            Some(FilterIssue::MissingColumn(VIEWS.into()))
        );
        assert_eq!(
            diag(&out, Stage::Outlier).issue,
            Some(FilterIssue::NoOutlierColumns)
        );
    }

    #[test]
    fn input_dataset_is_not_modified() {
        let ds = dataset(&[1, 2, 3], &["a", "b", "c"]);
        let copy = ds.clone();
        let _ = apply(
            &ds,
            &FilterSpec {
                min_views: Some(2),
                ..no_outliers()
            },
        );
        assert_eq!(ds, copy);
    }
}
