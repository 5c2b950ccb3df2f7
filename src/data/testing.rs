//! proptest strategies for arbitrary bank tables and multi-select selections.

use proptest::prelude::*;

use super::filter::{Choice, Selection};
use super::model::{RecordSet, Value};

pub const COLUMNS: [&str; 3] = ["age", "job", "y"];
const JOBS: [&str; 5] = ["admin.", "blue-collar", "retired", "student", "unknown"];
const OUTCOMES: [&str; 3] = ["no", "yes", "unknown"];

fn arb_age() -> impl Strategy<Value = Value> {
    prop_oneof![
        8 => (17i64..99).prop_map(Value::Integer),
        1 => Just(Value::Null),
    ]
}

fn arb_job() -> impl Strategy<Value = Value> {
    prop_oneof![
        8 => prop::sample::select(JOBS.to_vec()).prop_map(Value::from),
        1 => Just(Value::Null),
    ]
}

fn arb_outcome() -> impl Strategy<Value = Value> {
    prop_oneof![
        8 => prop::sample::select(OUTCOMES.to_vec()).prop_map(Value::from),
        1 => Just(Value::Null),
    ]
}

/// `age;job;y` tables with up to `max_rows` rows and occasional empty cells.
pub fn arb_bank(max_rows: usize) -> impl Strategy<Value = RecordSet> {
    prop::collection::vec((arb_age(), arb_job(), arb_outcome()), 0..max_rows).prop_map(|rows| {
        RecordSet::from_rows(
            COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.into_iter().map(|(a, j, y)| vec![a, j, y]).collect(),
            "arb".into(),
        )
    })
}

/// Concrete `job` values, never the wildcard.
pub fn arb_concrete_selection() -> impl Strategy<Value = Selection> {
    prop::collection::btree_set(arb_job().prop_map(Choice::Only), 0..4)
}

/// Any `job` selection, sometimes holding the wildcard.
pub fn arb_selection() -> impl Strategy<Value = Selection> {
    (arb_concrete_selection(), any::<bool>()).prop_map(|(mut selection, wildcard)| {
        if wildcard {
            selection.insert(Choice::All);
        }
        selection
    })
}
