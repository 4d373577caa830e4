//! Field-level comparison between two metadata snapshots.

use std::collections::{BTreeMap, BTreeSet};

use crate::event::{Field, FieldMap, value_text};

/// Compare two snapshots field by field.
///
/// Returns, for every field present in either snapshot whose rendered value
/// differs, the `(left, right)` renderings. A field absent on one side
/// renders as the empty string, which also means a field going from absent
/// to `""` does not register as a change.
#[must_use]
pub fn metadata_diff(left: &FieldMap, right: &FieldMap) -> BTreeMap<Field, (String, String)> {
    let fields: BTreeSet<Field> = left
        .iter()
        .map(|(field, _)| field)
        .chain(right.iter().map(|(field, _)| field))
        .collect();

    let mut diff = BTreeMap::new();
    for field in fields {
        let left_text = left.get(field).map_or_else(String::new, value_text);
        let right_text = right.get(field).map_or_else(String::new, value_text);
        if left_text != right_text {
            diff.insert(field, (left_text, right_text));
        }
    }
    diff
}
