use std::fmt;

use serde::Serialize;

use super::model::{DType, Dataset};

// ---------------------------------------------------------------------------
// Scalar statistics
// ---------------------------------------------------------------------------

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Quantile `q` of already sorted values, linear interpolation between
/// closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Sort a copy of `values`, dropping NaN.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    v.sort_by(f64::total_cmp);
    v
}

/// Tukey fence: `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrBounds {
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn from_values(values: &[f64]) -> Option<IqrBounds> {
        let s = sorted(values);
        let q1 = quantile_sorted(&s, 0.25)?;
        let q3 = quantile_sorted(&s, 0.75)?;
        let iqr = q3 - q1;
        Some(IqrBounds {
            lower: q1 - 1.5 * iqr,
            upper: q3 + 1.5 * iqr,
        })
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }
}

// ---------------------------------------------------------------------------
// Numeric summary (describe)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Count, mean, std, min, quartiles and max for every numeric column.
pub fn describe(dataset: &Dataset) -> Vec<NumericSummary> {
    dataset
        .columns()
        .iter()
        .filter(|c| c.is_numeric())
        .map(|c| {
            let values = c.numeric_values();
            let s = sorted(&values);
            NumericSummary {
                column: c.name.clone(),
                count: values.len(),
                mean: mean(&values),
                std: sample_std(&values),
                min: s.first().copied(),
                q25: quantile_sorted(&s, 0.25),
                median: quantile_sorted(&s, 0.5),
                q75: quantile_sorted(&s, 0.75),
                max: s.last().copied(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Data quality report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnQuality {
    pub column: String,
    pub dtype: DType,
    pub distinct: usize,
    pub missing: usize,
    pub missing_pct: f64,
}

/// Dataset-level completeness summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub rows: usize,
    pub columns: usize,
    /// Share of null cells over all cells, in percent.
    pub missing_pct: f64,
    /// Every column with its dtype, distinct and missing counts.
    pub per_column: Vec<ColumnQuality>,
}

impl QualityReport {
    pub fn build(dataset: &Dataset) -> QualityReport {
        let rows = dataset.len();
        let per_column: Vec<ColumnQuality> = dataset
            .columns()
            .iter()
            .map(|c| {
                let missing = c.null_count();
                ColumnQuality {
                    column: c.name.clone(),
                    dtype: c.dtype(),
                    distinct: c.unique_values().len(),
                    missing,
                    missing_pct: percent(missing, rows),
                }
            })
            .collect();
        let total_missing: usize = per_column.iter().map(|c| c.missing).sum();
        QualityReport {
            rows,
            columns: per_column.len(),
            missing_pct: percent(total_missing, rows * per_column.len()),
            per_column,
        }
    }

    /// Columns with at least one missing value.
    pub fn incomplete_columns(&self) -> impl Iterator<Item = &ColumnQuality> {
        self.per_column.iter().filter(|c| c.missing > 0)
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total records:  {}", self.rows)?;
        writeln!(f, "Columns:        {}", self.columns)?;
        writeln!(f, "Missing data:   {:.2}%", self.missing_pct)?;
        for c in &self.per_column {
            writeln!(f, "  {:<28} {:<9} {:>8} distinct", c.column, c.dtype, c.distinct)?;
        }
        if self.incomplete_columns().next().is_some() {
            writeln!(f, "Incomplete columns:")?;
        }
        for c in self.incomplete_columns() {
            writeln!(
                f,
                "  {:<28} {:>8} missing ({:.2}%)",
                c.column, c.missing, c.missing_pct
            )?;
        }
        Ok(())
    }
}
