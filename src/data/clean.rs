//! Sentinel normalisation and z-score standardisation.

use super::model::{Dataset, Value};
use super::stats;

/// Literal values the source dataset uses to encode "missing".
pub const SENTINELS: [f64; 2] = [-2.0, -1.0];

/// Replace sentinel values and infinities with null in every numeric column.
///
/// Applies to all numeric columns, including ones nothing downstream reads.
pub fn clean(dataset: &Dataset) -> Dataset {
    let mut out = dataset.clone();
    for name in dataset.numeric_column_names() {
        if let Some(col) = out.column_mut(&name) {
            let mut replaced = 0usize;
            for v in col.values.iter_mut() {
                if is_missing_marker(v) {
                    *v = Value::Null;
                    replaced += 1;
                }
            }
            if replaced > 0 {
                log::debug!("clean: {replaced} sentinel/infinite values nulled in '{name}'");
            }
        }
    }
    out
}

fn is_missing_marker(v: &Value) -> bool {
    match v.as_f64() {
        Some(x) => x.is_infinite() || SENTINELS.contains(&x),
        None => false,
    }
}

/// Standardise every numeric column to `(x - mean) / std`.
///
/// Columns with zero or undefined standard deviation are left unchanged.
pub fn normalize(dataset: &Dataset) -> Dataset {
    let mut out = dataset.clone();
    for name in dataset.numeric_column_names() {
        let Some(col) = out.column_mut(&name) else {
            continue;
        };
        let values = col.numeric_values();
        let (Some(mean), Some(std)) = (stats::mean(&values), stats::sample_std(&values)) else {
            continue;
        };
        if std == 0.0 || !std.is_finite() {
            log::debug!("normalize: '{name}' has zero spread, left as-is");
            continue;
        }
        for v in col.values.iter_mut() {
            if let Some(x) = v.as_f64() {
                *v = Value::float_or_null((x - mean) / std);
            }
        }
    }
    out
}
