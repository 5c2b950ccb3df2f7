//! egui rendering of the session state. Nothing in here owns data: every
//! widget reads from or writes to [`crate::state::SessionState`].

pub mod panels;
pub mod plot;
pub mod table;

use crate::data::model::Value;

/// Cell text for widgets; empty cells get a visible placeholder.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "<empty>".to_string(),
        other => other.to_string(),
    }
}
