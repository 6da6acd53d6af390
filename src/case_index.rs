//! Logical index over a box's top-level keys.
//!
//! A box is a JSON object whose first key is the header (`!...`), whose
//! following keys are cases named `name` or `name=suffix`, and which may
//! carry a `~` terminator after which nothing is indexed.
//!
//! The index holds keys only. Record lists are resolved against the box
//! value on every access, so an index never outlives the data it points
//! into; rebuild it after the box's top-level keys change.

use serde_json::Value;
use smol_str::SmolStr;

use crate::error::{Result, StoreError};
use crate::types::*;
use crate::value_shape::record_id;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseIndex {
    /// position → physical key
    idx: Vec<SmolStr>,
    /// position → logical name
    names: Vec<SmolStr>,
    /// logical name → physical key
    case: FastMap<SmolStr, SmolStr>,
    terminated: bool,
}

impl CaseIndex {
    /// Scan the top-level keys of `value` in their stored order.
    pub fn build(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(StoreError::MalformedBox(
                "top-level value is not an object".to_string(),
            ));
        };

        let mut index = CaseIndex::default();
        for (pos, key) in map.keys().enumerate() {
            let logical = if pos == 0 {
                if !key.starts_with(HEADER_PREFIX) {
                    return Err(StoreError::MalformedBox(format!(
                        "header key '{key}' does not start with '{HEADER_PREFIX}'"
                    )));
                }
                SmolStr::new_static(HEADER_NAME)
            } else if key == TERMINATOR_KEY {
                index.terminated = true;
                break;
            } else {
                logical_name(key)
            };
            let physical = SmolStr::from(key.as_str());
            index.idx.push(physical.clone());
            index.names.push(logical.clone());
            index.case.insert(logical, physical);
        }
        Ok(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.idx.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Whether scanning stopped at a `~` key.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Physical key stored at `pos`.
    #[inline]
    pub fn position(&self, pos: usize) -> Option<&SmolStr> {
        self.idx.get(pos)
    }

    pub fn header_key(&self) -> Option<&SmolStr> {
        self.case.get(HEADER_NAME)
    }

    /// Logical names in position order, header (`!`) first.
    pub fn logical_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(SmolStr::as_str)
    }

    pub fn contains(&self, logical: &str) -> bool {
        self.case.contains_key(logical)
    }

    /// Physical key for a logical case name.
    pub fn physical(&self, logical: &str) -> Result<&SmolStr> {
        self.case
            .get(logical)
            .ok_or_else(|| StoreError::CaseNotFound(SmolStr::from(logical)))
    }

    /// The case's value inside `value`, whatever its shape.
    pub fn case_value<'v>(&self, value: &'v Value, logical: &str) -> Result<&'v Value> {
        let key = self.physical(logical)?;
        value
            .get(key.as_str())
            .ok_or_else(|| StoreError::CaseNotFound(SmolStr::from(logical)))
    }

    /// Physical key and record list of a case.
    pub fn case_root<'v>(&self, value: &'v Value, logical: &str) -> Result<(&SmolStr, &'v [Value])> {
        let key = self.physical(logical)?;
        let records = self.records(value, logical)?;
        Ok((key, records))
    }

    /// The case's record list.
    pub fn records<'v>(&self, value: &'v Value, logical: &str) -> Result<&'v [Value]> {
        match self.case_value(value, logical)? {
            Value::Array(list) => Ok(list),
            _ => Err(not_a_list(logical)),
        }
    }

    pub fn records_mut<'v>(&self, value: &'v mut Value, logical: &str) -> Result<&'v mut Vec<Value>> {
        let key = self.physical(logical)?;
        match value.get_mut(key.as_str()) {
            Some(Value::Array(list)) => Ok(list),
            Some(_) => Err(not_a_list(logical)),
            None => Err(StoreError::CaseNotFound(SmolStr::from(logical))),
        }
    }
}

/// Portion of a case key before the first `=`.
#[inline]
pub fn logical_name(key: &str) -> SmolStr {
    match key.split_once(SUFFIX_SEPARATOR) {
        Some((prefix, _)) => SmolStr::from(prefix),
        None => SmolStr::from(key),
    }
}

/// `records` without its trailing `Id: 0` sentinel, if it has one.
pub fn strip_sentinel(records: &[Value]) -> &[Value] {
    match records.split_last() {
        Some((last, live)) if record_id(last) == Some(0) => live,
        _ => records,
    }
}

fn not_a_list(logical: &str) -> StoreError {
    StoreError::MalformedBox(format!("case '{logical}' is not a list"))
}
