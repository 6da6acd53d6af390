//! Display names and `Id` lookups for the records of one case.

use serde_json::Value;
use smol_str::SmolStr;
use std::fmt;

use crate::types::*;
use crate::value_shape::{canonical, record_id, scalar_text};

const NAME_JOIN: &str = "|";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashOptions {
    /// Drop one trailing `|` from joined names (left by an empty last field).
    pub strip_trailing_bar: bool,
}

// ─── Anomalies ──────────────────────────────────────────────────────────────

/// Non-fatal findings recorded while hashing a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashAnomaly {
    DuplicateId { id: i64, first: usize, again: usize },
    DuplicateName { name: SmolStr, first_id: i64, id: i64 },
    /// A record derived its name from a different set of fields than the first one did.
    KeyingDrift { id: i64, expected: Vec<SmolStr>, found: Vec<SmolStr> },
}

impl fmt::Display for HashAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAnomaly::DuplicateId { id, first, again } => {
                write!(f, "Duplicate Id={id} at idx={again} (first at idx={first})")
            }
            HashAnomaly::DuplicateName { name, first_id, id } => {
                write!(f, "Duplicate name '{name}': Id={id} and Id={first_id}")
            }
            HashAnomaly::KeyingDrift { id, expected, found } => write!(
                f,
                "Keying drift at Id={id}: [{}] instead of [{}]",
                found.join(", "),
                expected.join(", ")
            ),
        }
    }
}

// ─── IdPositions ────────────────────────────────────────────────────────────

/// `Id` → list position, or the reasons positions cannot be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdPositions {
    Indexed(FastMap<i64, usize>),
    /// At least one `Id` repeats: no position lookups are offered at all.
    Duplicates(Vec<String>),
}

// ─── IdHash ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IdHash {
    pub id_to_name: FastMap<i64, SmolStr>,
    pub name_to_id: FastMap<SmolStr, i64>,
    pub id_to_idx: IdPositions,
    /// Sorted field names the first live record was named from.
    pub keying: Vec<SmolStr>,
    pub anomalies: Vec<HashAnomaly>,
}

struct Named {
    id: i64,
    name: SmolStr,
}

impl IdHash {
    /// Hash a case's records. `None` unless the list ends with an `Id: 0` sentinel.
    pub fn compute(records: &[Value], opts: HashOptions) -> Option<Self> {
        let last = records.last()?;
        if record_id(last) != Some(0) {
            return None;
        }

        let mut first_pos: FastMap<i64, usize> = FastMap::default();
        let mut duplicated: FastHashSet<i64> = FastHashSet::default();
        let mut anomalies = Vec::new();
        let mut keying: Option<Vec<SmolStr>> = None;
        let mut named = Vec::new();

        for (pos, record) in records.iter().enumerate() {
            let Some(id) = record_id(record).filter(|id| *id > 0) else {
                continue;
            };
            if let Some(&first) = first_pos.get(&id) {
                duplicated.insert(id);
                anomalies.push(HashAnomaly::DuplicateId { id, first, again: pos });
                continue;
            }
            first_pos.insert(id, pos);

            let (name, used) = derive_name(record, opts);
            if let Some(expected) = &keying {
                if *expected != used {
                    anomalies.push(HashAnomaly::KeyingDrift {
                        id,
                        expected: expected.clone(),
                        found: used,
                    });
                }
            } else {
                keying = Some(used);
            }
            named.push(Named { id, name });
        }

        let mut id_to_name = FastMap::default();
        let mut name_to_id: FastMap<SmolStr, i64> = FastMap::default();
        for Named { id, name } in named {
            if duplicated.contains(&id) {
                continue;
            }
            if let Some(&first_id) = name_to_id.get(&name) {
                anomalies.push(HashAnomaly::DuplicateName { name: name.clone(), first_id, id });
            } else {
                name_to_id.insert(name.clone(), id);
            }
            id_to_name.insert(id, name);
        }

        let id_to_idx = if duplicated.is_empty() {
            IdPositions::Indexed(first_pos)
        } else {
            IdPositions::Duplicates(
                anomalies
                    .iter()
                    .filter(|a| matches!(a, HashAnomaly::DuplicateId { .. }))
                    .map(ToString::to_string)
                    .collect(),
            )
        };

        Some(Self {
            id_to_name,
            name_to_id,
            id_to_idx,
            keying: keying.unwrap_or_default(),
            anomalies,
        })
    }

    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.id_to_name.get(&id).map(SmolStr::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<i64> {
        self.name_to_id.get(name).copied()
    }

    /// List position of `id`; always `None` once any duplicate `Id` was seen.
    pub fn position_of(&self, id: i64) -> Option<usize> {
        match &self.id_to_idx {
            IdPositions::Indexed(map) => map.get(&id).copied(),
            IdPositions::Duplicates(_) => None,
        }
    }

    pub fn has_duplicate_ids(&self) -> bool {
        matches!(self.id_to_idx, IdPositions::Duplicates(_))
    }

    /// One-line summary of the anomalies; empty when there are none.
    pub fn summary(&self) -> String {
        if self.anomalies.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self.anomalies.iter().map(ToString::to_string).collect();
        format!("{} anomalies: {}", parts.len(), parts.join("; "))
    }
}

/// Display name of a record and the sorted field names it came from.
pub fn derive_name(record: &Value, opts: HashOptions) -> (SmolStr, Vec<SmolStr>) {
    if let Some(name) = record.get(NAME_FIELD) {
        let text = match name {
            Value::String(s) => s.clone(),
            other => canonical(other),
        };
        return (SmolStr::from(text), vec![SmolStr::new_static(NAME_FIELD)]);
    }

    let mut fields: Vec<(&str, String)> = record
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(key, _)| key.as_str() != ID_FIELD)
        .filter_map(|(key, value)| Some((key.as_str(), scalar_text(value)?)))
        .collect();
    fields.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let used = fields.iter().map(|(key, _)| SmolStr::from(*key)).collect();
    let values: Vec<&str> = fields.iter().map(|(_, text)| text.as_str()).collect();
    let mut name = values.join(NAME_JOIN);
    if opts.strip_trailing_bar && name.ends_with(NAME_JOIN) {
        name.pop();
    }
    (SmolStr::from(name), used)
}
