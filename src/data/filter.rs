use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use super::model::{RecordSet, Value};
use crate::cache::{MemoCache, cache_key};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};

// ---------------------------------------------------------------------------
// Filter predicates
// ---------------------------------------------------------------------------

/// One entry of a multi-select: either the wildcard or a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Choice {
    /// "Do not filter this column."
    All,
    Only(Value),
}

/// Selected entries for one categorical column.
pub type Selection = BTreeSet<Choice>;

/// A selection holding only the wildcard.
pub fn wildcard() -> Selection {
    BTreeSet::from([Choice::All])
}

/// A selection of concrete values, without the wildcard.
#[cfg(test)]
pub fn only<I, V>(values: I) -> Selection
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values.into_iter().map(|v| Choice::Only(v.into())).collect()
}

pub fn is_wildcard(selection: &Selection) -> bool {
    selection.contains(&Choice::All)
}

/// Inclusive numeric bounds over one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeFilter {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

impl RangeFilter {
    pub fn contains(&self, value: &Value) -> bool {
        value
            .as_f64()
            .is_some_and(|v| self.min <= v && v <= self.max)
    }
}

/// The full predicate set submitted from the filter form: the range filter
/// first, then one membership filter per column, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSet {
    pub range: Option<RangeFilter>,
    pub memberships: Vec<(String, Selection)>,
}

impl FilterSet {
    /// Everything selected: the observed range and the wildcard for every
    /// configured column.
    pub fn defaults_for(dataset: &RecordSet, config: &DashboardConfig) -> Self {
        let range = dataset
            .numeric_bounds(&config.range_column)
            .map(|(min, max)| RangeFilter {
                column: config.range_column.clone(),
                min,
                max,
            });
        let memberships = config
            .filter_columns
            .iter()
            .map(|c| (c.name.clone(), wildcard()))
            .collect();
        FilterSet { range, memberships }
    }

    pub fn selection_mut(&mut self, column: &str) -> Option<&mut Selection> {
        self.memberships
            .iter_mut()
            .find(|(c, _)| c == column)
            .map(|(_, s)| s)
    }

    pub fn selection(&self, column: &str) -> Option<&Selection> {
        self.memberships
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, s)| s)
    }
}

// ---------------------------------------------------------------------------
// Pure filter steps
// ---------------------------------------------------------------------------

/// Return positions of rows whose `column` value passes `keep`.
pub fn matching_indices(
    dataset: &RecordSet,
    column: &str,
    keep: impl Fn(&Value) -> bool,
) -> Result<Vec<usize>> {
    let idx = dataset
        .column_index(column)
        .ok_or_else(|| DashboardError::UnknownColumn(column.to_string()))?;
    Ok(dataset
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| keep(&row[idx]))
        .map(|(i, _)| i)
        .collect())
}

/// Build the subset at `indices`, renumbered from zero. When nothing was
/// dropped the input itself is returned, which keeps filtering idempotent.
fn subset(dataset: &Arc<RecordSet>, indices: Vec<usize>, fingerprint: String) -> Arc<RecordSet> {
    if indices.len() == dataset.len() {
        return Arc::clone(dataset);
    }
    let rows = indices.into_iter().map(|i| dataset.rows[i].clone()).collect();
    Arc::new(RecordSet::from_rows(
        dataset.columns.clone(),
        rows,
        fingerprint,
    ))
}

/// Keep rows whose `column` value is in `selection`.
///
/// A selection containing the wildcard returns the input unchanged; an empty
/// selection keeps nothing.
pub fn apply(dataset: &Arc<RecordSet>, column: &str, selection: &Selection) -> Result<Arc<RecordSet>> {
    if is_wildcard(selection) {
        // still reject unknown columns so typos surface early
        dataset
            .column_index(column)
            .ok_or_else(|| DashboardError::UnknownColumn(column.to_string()))?;
        return Ok(Arc::clone(dataset));
    }
    let indices = matching_indices(dataset, column, |v| {
        selection.contains(&Choice::Only(v.clone()))
    })?;
    let fingerprint = membership_key(dataset, column, selection)?;
    Ok(subset(dataset, indices, fingerprint))
}

/// Keep rows with `range.min <= value <= range.max`. Non-numeric and null
/// cells are dropped; a column with text but no numbers at all is an error.
pub fn apply_range(dataset: &Arc<RecordSet>, range: &RangeFilter) -> Result<Arc<RecordSet>> {
    let idx = dataset
        .column_index(&range.column)
        .ok_or_else(|| DashboardError::UnknownColumn(range.column.clone()))?;
    let has_text = dataset.rows.iter().any(|row| !row[idx].is_null());
    if has_text && dataset.numeric_bounds(&range.column).is_none() {
        return Err(DashboardError::NotNumeric(range.column.clone()));
    }
    let indices = matching_indices(dataset, &range.column, |v| range.contains(v))?;
    let fingerprint = range_key(dataset, range)?;
    Ok(subset(dataset, indices, fingerprint))
}

fn membership_key(dataset: &RecordSet, column: &str, selection: &Selection) -> Result<String> {
    Ok(cache_key("filter.membership", &(&dataset.fingerprint, column, selection))?)
}

fn range_key(dataset: &RecordSet, range: &RangeFilter) -> Result<String> {
    Ok(cache_key("filter.range", &(&dataset.fingerprint, range))?)
}

// ---------------------------------------------------------------------------
// Cached pipeline
// ---------------------------------------------------------------------------

/// Runs filter steps through a memo cache keyed by (input fingerprint,
/// column, predicate), so resubmitting the same form does no work.
#[derive(Debug)]
pub struct FilterEngine {
    cache: MemoCache<Arc<RecordSet>>,
}

impl FilterEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: MemoCache::new(capacity),
        }
    }

    pub fn membership(
        &mut self,
        dataset: &Arc<RecordSet>,
        column: &str,
        selection: &Selection,
    ) -> Result<Arc<RecordSet>> {
        if is_wildcard(selection) {
            return apply(dataset, column, selection);
        }
        let key = membership_key(dataset, column, selection)?;
        self.cache
            .get_or_try_insert_with(key, || apply(dataset, column, selection))
    }

    pub fn range(&mut self, dataset: &Arc<RecordSet>, range: &RangeFilter) -> Result<Arc<RecordSet>> {
        let key = range_key(dataset, range)?;
        self.cache
            .get_or_try_insert_with(key, || apply_range(dataset, range))
    }

    /// Range filter first, then every membership filter in order.
    pub fn run(&mut self, base: &Arc<RecordSet>, filters: &FilterSet) -> Result<Arc<RecordSet>> {
        let mut current = Arc::clone(base);
        if let Some(range) = &filters.range {
            current = self.range(&current, range)?;
        }
        for (column, selection) in &filters.memberships {
            current = self.membership(&current, column, selection)?;
        }
        log::info!(
            "Filters kept {} of {} rows",
            current.len(),
            base.len()
        );
        let (hits, misses) = self.cache.stats();
        log::debug!("filter cache: {hits} hits, {misses} misses");
        Ok(current)
    }

    #[cfg(test)]
    pub fn stats(&self) -> (u64, u64) {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::{arb_bank, arb_concrete_selection, arb_selection};
    use proptest::prelude::*;

    fn bank() -> Arc<RecordSet> {
        Arc::new(RecordSet::from_rows(
            vec!["age".into(), "job".into(), "y".into()],
            vec![
                vec![Value::Integer(25), "admin".into(), "yes".into()],
                vec![Value::Integer(40), "tech".into(), "no".into()],
                vec![Value::Integer(60), "admin".into(), "yes".into()],
                vec![Value::Integer(33), "services".into(), "no".into()],
            ],
            "bank".into(),
        ))
    }

    fn ages(rs: &RecordSet) -> Vec<i64> {
        rs.rows
            .iter()
            .map(|r| match r[0] {
                Value::Integer(i) => i,
                _ => panic!("age should be an integer"),
            })
            .collect()
    }

    #[test]
    fn wildcard_is_identity() {
        let rs = bank();
        let mut sel = only(["tech"]);
        sel.insert(Choice::All);
        let out = apply(&rs, "job", &sel).unwrap();
        assert!(Arc::ptr_eq(&out, &rs));
        assert_eq!(*out, *rs);
    }

    #[test]
    fn membership_keeps_matching_rows_in_order() {
        let rs = bank();
        let sel = only(["admin", "services"]);
        let out = apply(&rs, "job", &sel).unwrap();
        assert_eq!(ages(&out), vec![25, 60, 33]);
        for i in 0..out.len() {
            let job = out.value(i, "job").unwrap().clone();
            assert!(sel.contains(&Choice::Only(job)));
        }
        assert_ne!(out.fingerprint, rs.fingerprint);
    }

    #[test]
    fn membership_is_idempotent() {
        let rs = bank();
        let sel = only(["admin"]);
        let once = apply(&rs, "job", &sel).unwrap();
        let twice = apply(&once, "job", &sel).unwrap();
        assert_eq!(*once, *twice);
    }

    #[test]
    fn empty_selection_keeps_nothing() {
        let out = apply(&bank(), "job", &Selection::new()).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.columns, vec!["age", "job", "y"]);
    }

    #[test]
    fn unknown_column_is_reported() {
        let err = apply(&bank(), "salary", &only(["x"])).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownColumn(c) if c == "salary"));
        assert!(apply(&bank(), "salary", &wildcard()).is_err());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = RangeFilter {
            column: "age".into(),
            min: 25.0,
            max: 40.0,
        };
        let out = apply_range(&bank(), &range).unwrap();
        assert_eq!(ages(&out), vec![25, 40, 33]);
    }

    #[test]
    fn range_drops_non_numeric_cells() {
        let rs = Arc::new(RecordSet::from_rows(
            vec!["age".into()],
            vec![
                vec![Value::Integer(30)],
                vec![Value::Null],
                vec!["unknown".into()],
                vec![Value::Float(41.5)],
            ],
            "mixed".into(),
        ));
        let range = RangeFilter {
            column: "age".into(),
            min: 0.0,
            max: 100.0,
        };
        let out = apply_range(&rs, &range).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn range_over_text_column_is_rejected() {
        let range = RangeFilter {
            column: "job".into(),
            min: 0.0,
            max: 100.0,
        };
        let err = apply_range(&bank(), &range).unwrap_err();
        assert!(matches!(err, DashboardError::NotNumeric(c) if c == "job"));
    }

    #[test]
    fn pipeline_applies_range_then_memberships() {
        let config = DashboardConfig::default();
        let rs = bank();
        let mut filters = FilterSet {
            range: Some(RangeFilter {
                column: "age".into(),
                min: 20.0,
                max: 50.0,
            }),
            memberships: vec![("job".into(), wildcard())],
        };
        let mut engine = FilterEngine::new(config.cache_capacity);

        let narrowed = engine.run(&rs, &filters).unwrap();
        assert_eq!(ages(&narrowed), vec![25, 40, 33]);

        *filters.selection_mut("job").unwrap() = only(["admin"]);
        let admin = engine.run(&rs, &filters).unwrap();
        assert_eq!(ages(&admin), vec![25]);
    }

    #[test]
    fn repeated_pipeline_hits_the_cache() {
        let rs = bank();
        let filters = FilterSet {
            range: Some(RangeFilter {
                column: "age".into(),
                min: 30.0,
                max: 70.0,
            }),
            memberships: vec![("job".into(), only(["admin", "tech"]))],
        };
        let mut engine = FilterEngine::new(8);
        let first = engine.run(&rs, &filters).unwrap();
        let second = engine.run(&rs, &filters).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.stats(), (2, 2));
    }

    #[test]
    fn defaults_span_observed_range_and_select_all() {
        let config = DashboardConfig::default();
        let filters = FilterSet::defaults_for(&bank(), &config);
        let range = filters.range.as_ref().unwrap();
        assert_eq!((range.min, range.max), (25.0, 60.0));
        assert_eq!(filters.memberships.len(), config.filter_columns.len());
        assert!(filters.memberships.iter().all(|(_, s)| is_wildcard(s)));
    }

    proptest! {
        #[test]
        fn wildcard_leaves_any_table_unchanged(rs in arb_bank(40), mut sel in arb_selection()) {
            sel.insert(Choice::All);
            let rs = Arc::new(rs);
            let out = apply(&rs, "job", &sel).unwrap();
            prop_assert!(Arc::ptr_eq(&out, &rs));
        }

        #[test]
        fn membership_keeps_selected_rows_in_order(rs in arb_bank(40), sel in arb_concrete_selection()) {
            let expected: Vec<Vec<Value>> = rs
                .rows
                .iter()
                .filter(|r| sel.contains(&Choice::Only(r[1].clone())))
                .cloned()
                .collect();
            let out = apply(&Arc::new(rs), "job", &sel).unwrap();
            prop_assert_eq!(&out.rows, &expected);
        }

        #[test]
        fn membership_is_idempotent_for_any_selection(rs in arb_bank(40), sel in arb_selection()) {
            let once = apply(&Arc::new(rs), "job", &sel).unwrap();
            let twice = apply(&once, "job", &sel).unwrap();
            prop_assert_eq!(&*once, &*twice);
        }

        #[test]
        fn range_keeps_rows_inside_the_bounds_in_order(rs in arb_bank(40), a in 10i64..100, b in 10i64..100) {
            let range = RangeFilter {
                column: "age".into(),
                min: a.min(b) as f64,
                max: a.max(b) as f64,
            };
            let expected: Vec<Vec<Value>> = rs
                .rows
                .iter()
                .filter(|r| matches!(r[0], Value::Integer(age) if a.min(b) <= age && age <= a.max(b)))
                .cloned()
                .collect();
            let out = apply_range(&Arc::new(rs), &range).unwrap();
            prop_assert_eq!(&out.rows, &expected);
        }
    }
}
