use std::collections::BTreeMap;

use super::model::{RecordSet, Value};
use crate::cache::cache_key;
use crate::error::{DashboardError, Result};

/// Column header used for the share of each category when a distribution is
/// exported as a table.
pub const PERCENT_COLUMN: &str = "percent";

/// Percentage breakdown of one categorical column, sorted by category.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub column: String,
    /// Non-null cells that were counted.
    pub counted: usize,
    /// Category → percentage of `counted`.
    pub shares: BTreeMap<Value, f64>,
    /// Fingerprint of the table the distribution was computed from.
    pub source_fingerprint: String,
}

impl Distribution {
    /// Entries in ascending category order.
    pub fn entries(&self) -> impl Iterator<Item = (&Value, f64)> {
        self.shares.iter().map(|(k, v)| (k, *v))
    }

    #[cfg(test)]
    pub fn percent(&self, category: &Value) -> Option<f64> {
        self.shares.get(category).copied()
    }

    pub fn total(&self) -> f64 {
        self.shares.values().sum()
    }

    /// Two-column table (`<column>`, `percent`) for export.
    pub fn to_record_set(&self) -> Result<RecordSet> {
        let fingerprint = cache_key("distribution", &(&self.source_fingerprint, &self.column))?;
        let rows = self
            .entries()
            .map(|(k, v)| vec![k.clone(), Value::Float(v)])
            .collect();
        Ok(RecordSet::from_rows(
            vec![self.column.clone(), PERCENT_COLUMN.to_string()],
            rows,
            fingerprint,
        ))
    }
}

/// Value counts of `column` normalised to percentages.
///
/// Null cells are skipped, so shares always sum to 100. A table with nothing
/// to count yields [`DashboardError::EmptyResult`].
pub fn distribution(dataset: &RecordSet, column: &str) -> Result<Distribution> {
    let idx = dataset
        .column_index(column)
        .ok_or_else(|| DashboardError::UnknownColumn(column.to_string()))?;

    let mut counts: BTreeMap<Value, usize> = BTreeMap::new();
    for row in &dataset.rows {
        let value = &row[idx];
        if !value.is_null() {
            *counts.entry(value.clone()).or_default() += 1;
        }
    }

    let counted: usize = counts.values().sum();
    if counted == 0 {
        return Err(DashboardError::EmptyResult);
    }

    let shares = counts
        .into_iter()
        .map(|(k, n)| (k, n as f64 / counted as f64 * 100.0))
        .collect();

    Ok(Distribution {
        column: column.to_string(),
        counted,
        shares,
        source_fingerprint: dataset.fingerprint.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::arb_bank;
    use proptest::prelude::*;

    fn outcomes(ys: &[&str]) -> RecordSet {
        RecordSet::from_rows(
            vec!["y".into()],
            ys.iter()
                .map(|y| {
                    if y.is_empty() {
                        vec![Value::Null]
                    } else {
                        vec![Value::from(*y)]
                    }
                })
                .collect(),
            "fp".into(),
        )
    }

    #[test]
    fn shares_sum_to_one_hundred_and_are_sorted() {
        let dist = distribution(&outcomes(&["yes", "no", "no", "unknown", "no", "yes"]), "y")
            .unwrap();
        assert!((dist.total() - 100.0).abs() < 1e-9);
        let keys: Vec<String> = dist.entries().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["no", "unknown", "yes"]);
        assert!((dist.percent(&Value::from("no")).unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(dist.counted, 6);
    }

    #[test]
    fn nulls_are_not_counted() {
        let dist = distribution(&outcomes(&["yes", "", "no", ""]), "y").unwrap();
        assert_eq!(dist.counted, 2);
        assert_eq!(dist.percent(&Value::from("yes")), Some(50.0));
    }

    #[test]
    fn empty_table_is_an_empty_result() {
        assert!(matches!(
            distribution(&outcomes(&[]), "y"),
            Err(DashboardError::EmptyResult)
        ));
        assert!(matches!(
            distribution(&outcomes(&["", ""]), "y"),
            Err(DashboardError::EmptyResult)
        ));
    }

    #[test]
    fn unknown_target_column() {
        assert!(matches!(
            distribution(&outcomes(&["yes"]), "target"),
            Err(DashboardError::UnknownColumn(_))
        ));
    }

    #[test]
    fn exports_as_two_column_table() {
        let dist = distribution(&outcomes(&["yes", "no", "no", "no"]), "y").unwrap();
        let table = dist.to_record_set().unwrap();
        assert_eq!(table.columns, vec!["y", PERCENT_COLUMN]);
        assert_eq!(
            table.rows,
            vec![
                vec![Value::from("no"), Value::Float(75.0)],
                vec![Value::from("yes"), Value::Float(25.0)],
            ]
        );
    }

    proptest! {
        #[test]
        fn shares_sum_to_one_hundred_over_sorted_keys(rs in arb_bank(60)) {
            let cells: Vec<&Value> = rs.rows.iter().map(|r| &r[2]).filter(|v| !v.is_null()).collect();
            match distribution(&rs, "y") {
                Ok(dist) => {
                    prop_assert_eq!(dist.counted, cells.len());
                    prop_assert!((dist.total() - 100.0).abs() < 1e-9);
                    let keys: Vec<&Value> = dist.entries().map(|(k, _)| k).collect();
                    prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
                    for (key, share) in dist.entries() {
                        let n = cells.iter().filter(|v| **v == key).count();
                        prop_assert!((share - n as f64 * 100.0 / cells.len() as f64).abs() < 1e-9);
                    }
                }
                Err(DashboardError::EmptyResult) => prop_assert!(cells.is_empty()),
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }
    }
}
