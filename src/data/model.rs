use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Value – a single cell
// ---------------------------------------------------------------------------

/// One cell of a loaded table, typed by what its text parsed as.
/// Distinct-value sets are `BTreeSet`s, so `Value` is `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Null,
}

// -- Manual Eq/Ord so Value can be used as a set key --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
                Timestamp(_) => 6,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Value::Date(d) => write!(f, "{d}"),
            Value::Null => Ok(()),
        }
    }
}

impl Value {
    /// Interpret the value as an `f64` when it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Integer view of a numeric value, accepting whole floats (`10.0` → `10`).
    pub fn as_whole_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// `Value::Float`, except NaN which becomes `Value::Null`.
    pub fn float_or_null(v: f64) -> Value {
        if v.is_nan() {
            Value::Null
        } else {
            Value::Float(v)
        }
    }
}

// ---------------------------------------------------------------------------
// DType – the inferred type of a whole column
// ---------------------------------------------------------------------------

/// Column dtype inferred from its non-null cells.
///
/// Integers mixed with floats widen to `Float`; any other mix is `Object`,
/// which is never treated as numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Integer,
    Float,
    Bool,
    String,
    Timestamp,
    Date,
    Object,
    /// Every cell is null.
    Empty,
}

impl DType {
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> DType {
        let mut dtype = DType::Empty;
        for v in values {
            let cell = match v {
                Value::Null => continue,
                Value::Integer(_) => DType::Integer,
                Value::Float(_) => DType::Float,
                Value::Bool(_) => DType::Bool,
                Value::String(_) => DType::String,
                Value::Timestamp(_) => DType::Timestamp,
                Value::Date(_) => DType::Date,
            };
            dtype = match (dtype, cell) {
                (DType::Empty, c) => c,
                (a, b) if a == b => a,
                (DType::Integer, DType::Float) | (DType::Float, DType::Integer) => DType::Float,
                _ => return DType::Object,
            };
        }
        dtype
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, DType::Integer | DType::Float)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Integer => "int64",
            DType::Float => "float64",
            DType::Bool => "bool",
            DType::String => "string",
            DType::Timestamp => "datetime",
            DType::Date => "date",
            DType::Object => "object",
            DType::Empty => "empty",
        };
        f.pad(name)
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// One named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }

    pub fn dtype(&self) -> DType {
        DType::infer(&self.values)
    }

    pub fn is_numeric(&self) -> bool {
        self.dtype().is_numeric()
    }

    /// Numeric reading of row `i`; `None` for nulls and non-numeric cells.
    pub fn f64_at(&self, i: usize) -> Option<f64> {
        self.values.get(i).and_then(Value::as_f64)
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Non-null numeric cells, in row order.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(Value::as_f64).collect()
    }

    /// Distinct non-null values.
    pub fn unique_values(&self) -> BTreeSet<Value> {
        self.values.iter().filter(|v| !v.is_null()).cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete table
// ---------------------------------------------------------------------------

/// An ordered table of equally long columns.
///
/// Transforms never mutate a dataset a caller can still see: they clone it,
/// patch the clone and hand the new value back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Build a dataset from columns of equal length.
    pub fn from_columns(columns: Vec<Column>) -> anyhow::Result<Self> {
        let row_count = columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = columns.iter().find(|c| c.values.len() != row_count) {
            anyhow::bail!(
                "column '{}' has {} rows, expected {row_count}",
                bad.name,
                bad.values.len()
            );
        }
        Ok(Dataset { columns, row_count })
    }

    /// Build a dataset from row-major cells aligned to `names`.
    pub fn from_rows(names: &[String], rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len();
        let mut columns: Vec<Column> = names
            .iter()
            .map(|n| Column::new(n.clone(), Vec::with_capacity(row_count)))
            .collect();
        for row in rows {
            let mut cells = row.into_iter();
            for col in &mut columns {
                col.values.push(cells.next().unwrap_or(Value::Null));
            }
        }
        Dataset { columns, row_count }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.row_count
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Names of the columns whose dtype is numeric.
    pub fn numeric_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Return a copy with `name` replaced (same position) or appended.
    ///
    /// `values` must have one entry per row.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Dataset {
        let mut out = self.clone();
        out.set_column(name, values);
        out
    }

    /// In-place variant of [`Dataset::with_column`] for owned copies.
    pub(crate) fn set_column(&mut self, name: &str, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.row_count);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.values = values,
            None => self.columns.push(Column::new(name, values)),
        }
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Keep the rows whose mask entry is `true`.
    pub fn retain_rows(&self, mask: &[bool]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = c
                    .values
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| v.clone())
                    .collect();
                Column::new(c.name.clone(), values)
            })
            .collect();
        let row_count = mask.iter().take(self.row_count).filter(|k| **k).count();
        Dataset { columns, row_count }
    }

    /// Keep the rows at `indices`, in the order given.
    pub fn take_rows(&self, indices: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = indices
                    .iter()
                    .map(|&i| c.values.get(i).cloned().unwrap_or(Value::Null))
                    .collect();
                Column::new(c.name.clone(), values)
            })
            .collect();
        Dataset {
            columns,
            row_count: indices.len(),
        }
    }

    /// Cells of row `i`, in column order.
    pub fn row(&self, i: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[i]).collect()
    }
}

/// Whether every column in `names` is present.
pub fn has_columns(dataset: &Dataset, names: &[&str]) -> bool {
    names.iter().all(|n| dataset.has_column(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_columns(vec![
            Column::new(
                "views",
                vec![Value::Integer(10), Value::Float(2.5), Value::Null],
            ),
            Column::new(
                "name",
                vec![
                    Value::String("a".into()),
                    Value::String("b".into()),
                    Value::String("c".into()),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn dtype_widens_integers_to_float() {
        let ds = sample();
        assert_eq!(ds.column("views").unwrap().dtype(), DType::Float);
        assert_eq!(ds.column("name").unwrap().dtype(), DType::String);
    }

    #[test]
    fn mixed_numeric_and_text_is_object() {
        let vals = [Value::Integer(1), Value::String("x".into())];
        assert_eq!(DType::infer(&vals), DType::Object);
        assert!(!DType::Object.is_numeric());
        assert_eq!(DType::infer(&[Value::Null]), DType::Empty);
    }

    #[test]
    fn has_columns_checks_every_name() {
        let ds = sample();
        assert!(has_columns(&ds, &["views", "name"]));
        assert!(!has_columns(&ds, &["views", "likes"]));
        assert!(has_columns(&ds, &[]));
    }

    #[test]
    fn with_column_leaves_original_untouched() {
        let ds = sample();
        let patched = ds.with_column("flag", vec![Value::Bool(true); 3]);
        assert!(!ds.has_column("flag"));
        assert_eq!(patched.column_names(), vec!["views", "name", "flag"]);

        let replaced = patched.with_column("views", vec![Value::Null; 3]);
        assert_eq!(replaced.column_names(), vec!["views", "name", "flag"]);
        assert_eq!(replaced.column("views").unwrap().null_count(), 3);
    }

    #[test]
    fn retain_and_take_rows() {
        let ds = sample();
        let kept = ds.retain_rows(&[true, false, true]);
        assert_eq!(kept.len(), 2);
        assert_eq!(
            kept.column("name").unwrap().values,
            vec![Value::String("a".into()), Value::String("c".into())]
        );

        let taken = ds.take_rows(&[2, 0]);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken.row(0)[1], &Value::String("c".into()));
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        let res = Dataset::from_columns(vec![
            Column::new("a", vec![Value::Null]),
            Column::new("b", vec![]),
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn whole_floats_read_as_integers() {
        assert_eq!(Value::Float(10.0).as_whole_i64(), Some(10));
        assert_eq!(Value::Float(10.5).as_whole_i64(), None);
        assert_eq!(Value::String("10".into()).as_whole_i64(), None);
    }
}
