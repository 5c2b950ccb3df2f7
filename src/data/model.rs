use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Value – a single cell of the table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common dataframe dtypes.
/// Used as a key in `BTreeMap` / `BTreeSet` downstream, so `Value` must be `Ord`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

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
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
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
            Value::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl Value {
    /// Interpret the value as an `f64` for range filtering.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// ---------------------------------------------------------------------------
// RecordSet – the complete loaded (or filtered) table
// ---------------------------------------------------------------------------

/// An immutable table: ordered rows aligned with `columns`, plus per-column
/// unique values and a content fingerprint used to key cached work.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    /// Column names in source order.
    pub columns: Vec<String>,
    /// Rows; every row holds exactly `columns.len()` values.
    pub rows: Vec<Vec<Value>>,
    /// For each column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<Value>>,
    /// Hex SHA-256 identifying where this table came from.
    pub fingerprint: String,
}

impl RecordSet {
    /// Build column indices from parsed rows.
    ///
    /// Rows shorter than the header are padded with `Null`, longer rows are
    /// truncated, so the column-alignment invariant always holds.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>, fingerprint: String) -> Self {
        let width = columns.len();
        let rows: Vec<Vec<Value>> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();

        let mut unique_values: BTreeMap<String, BTreeSet<Value>> = columns
            .iter()
            .map(|c| (c.clone(), BTreeSet::new()))
            .collect();
        for row in &rows {
            for (col, val) in columns.iter().zip(row) {
                if let Some(set) = unique_values.get_mut(col) {
                    set.insert(val.clone());
                }
            }
        }

        RecordSet {
            columns,
            rows,
            unique_values,
            fingerprint,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell at `row` in `column`.
    #[cfg(test)]
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Observed `(min, max)` over the numeric cells of `column`.
    pub fn numeric_bounds(&self, column: &str) -> Option<(f64, f64)> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .filter_map(|r| r[idx].as_f64())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// First `n` rows, the way a dataframe `head()` previews data.
    pub fn head(&self, n: usize) -> &[Vec<Value>] {
        &self.rows[..n.min(self.rows.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordSet {
        RecordSet::from_rows(
            vec!["age".into(), "job".into()],
            vec![
                vec![Value::Integer(40), "tech".into()],
                vec![Value::Integer(25), "admin".into()],
                vec![Value::Integer(60)],
            ],
            "abc".into(),
        )
    }

    #[test]
    fn short_rows_are_padded_with_null() {
        let rs = sample();
        assert_eq!(rs.rows[2], vec![Value::Integer(60), Value::Null]);
        assert!(rs.unique_values["job"].contains(&Value::Null));
    }

    #[test]
    fn numeric_bounds_span_observed_values() {
        assert_eq!(sample().numeric_bounds("age"), Some((25.0, 60.0)));
        assert_eq!(sample().numeric_bounds("job"), None);
        assert_eq!(sample().numeric_bounds("missing"), None);
    }

    #[test]
    fn values_order_by_kind_then_content() {
        let mut v = vec![
            Value::from("b"),
            Value::Integer(3),
            Value::Null,
            Value::from("a"),
            Value::Bool(true),
        ];
        v.sort();
        assert_eq!(
            v,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Integer(3),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn head_is_clamped_to_length() {
        let rs = sample();
        assert_eq!(rs.head(2).len(), 2);
        assert_eq!(rs.head(10).len(), 3);
    }
}
