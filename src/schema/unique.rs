//! Uniqueness checks behind the `u-id` and `unique` field types.
//!
//! Every check returns an empty string on success and a readable message
//! describing the first violation otherwise.

use serde_json::Value;
use std::fmt;

use crate::types::FastMap;
use crate::value_shape::{ValueShape, canonical, record_id};

/// Nesting levels inspected by the structural check; deeper branches pass unchecked.
pub const MAX_DEPTH: usize = 10;

/// Table and case a check runs on, shown as `('table', 'case')`.
#[derive(Debug, Clone, Copy)]
pub struct Infos<'a> {
    pub table: &'a str,
    pub case: &'a str,
}

impl fmt::Display for Infos<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "('{}', '{}')", self.table, self.case)
    }
}

// ─── u-id ───────────────────────────────────────────────────────────────────

/// Every record carries an integer `Id` and no two are equal.
pub fn check_unique_ids(records: &[Value], infos: Infos) -> String {
    let mut seen: FastMap<i64, &Value> = FastMap::default();
    for (pos, record) in records.iter().enumerate() {
        let Some(id) = record_id(record) else {
            return format!("Missing Id {infos} at idx={pos}: <<{record}>>");
        };
        if let Some(there) = seen.get(&id) {
            return format!("Duplicate key {infos}: {id}, <<{there}>>");
        }
        seen.insert(id, record);
    }
    String::new()
}

// ─── unique, per field ──────────────────────────────────────────────────────

/// Each named field is unique across live records (`Id >= 1`).
///
/// Records without the field are ignored. All repeats of one field are
/// reported together: their count and the first one found.
pub fn check_unique_fields(records: &[Value], fields: &[&str], infos: Infos) -> String {
    for field in fields {
        let mut seen: FastMap<String, i64> = FastMap::default();
        let mut repeats = 0usize;
        let mut first: Option<(String, i64, i64)> = None;

        for record in records {
            let Some(id) = record_id(record).filter(|id| *id >= 1) else {
                continue;
            };
            let Some(value) = record.get(*field) else {
                continue;
            };
            let key = canonical(value);
            match seen.get(&key) {
                Some(&first_id) => {
                    repeats += 1;
                    first.get_or_insert((key, first_id, id));
                }
                None => {
                    seen.insert(key, id);
                }
            }
        }

        if let Some((value, first_id, id)) = first {
            return format!(
                "Duplicate field '{field}' {infos}: {repeats} repeated, first {value} at Id={id} (as Id={first_id})"
            );
        }
    }
    String::new()
}

// ─── unique, structural ─────────────────────────────────────────────────────

/// Structural uniqueness of `value`.
///
/// Dicts must be non-empty. List elements must be pairwise distinct
/// (compared independently of key order) and are checked in turn; a
/// single-element list is unwrapped instead, repeatedly when such lists
/// nest, each level counting toward the depth. Scalars always pass, and
/// anything nested deeper than [`MAX_DEPTH`] is not inspected.
pub fn check_structure(value: &Value, infos: Infos, depth: usize) -> String {
    check_shape(ValueShape::from(value), infos, depth)
}

pub fn check_shape(shape: ValueShape<'_>, infos: Infos, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }
    match shape {
        ValueShape::Object(map) => {
            if map.is_empty() {
                return format!("Empty dictionary {infos} (depth={depth})");
            }
            String::new()
        }
        ValueShape::List([only]) => check_structure(only, infos, depth + 1),
        ValueShape::List(items) => {
            let mut seen: FastMap<String, usize> = FastMap::default();
            for (idx, item) in items.iter().enumerate() {
                let key = canonical(item);
                if let Some(first) = seen.get(&key) {
                    return format!(
                        "Duplicate element idx={} {infos} (depth={depth}): <<{item}>>, same as idx={}",
                        idx + 1,
                        first + 1
                    );
                }
                seen.insert(key, idx);
            }
            for item in items {
                let msg = check_structure(item, infos, depth + 1);
                if !msg.is_empty() {
                    return msg;
                }
            }
            String::new()
        }
        ValueShape::Scalar(_) => String::new(),
    }
}
