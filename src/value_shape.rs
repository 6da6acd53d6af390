use serde_json::{Map, Value};

use crate::types::ID_FIELD;

// ─── ValueShape ─────────────────────────────────────────────────────────────

/// Borrowed view of a JSON value, split by the three shapes the store
/// distinguishes: lists, dicts and everything else.
#[derive(Debug, Clone, Copy)]
pub enum ValueShape<'a> {
    List(&'a [Value]),
    Object(&'a Map<String, Value>),
    Scalar(&'a Value),
}

impl<'a> From<&'a Value> for ValueShape<'a> {
    #[inline]
    fn from(v: &'a Value) -> Self {
        match v {
            Value::Array(arr) => ValueShape::List(arr),
            Value::Object(map) => ValueShape::Object(map),
            other => ValueShape::Scalar(other),
        }
    }
}

impl ValueShape<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            ValueShape::List(_) => "list",
            ValueShape::Object(_) => "dict",
            ValueShape::Scalar(_) => "scalar",
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Order-independent text form of `value`, used to compare values for equality.
pub fn canonical(value: &Value) -> String {
    let mut sorted = value.clone();
    sorted.sort_all_objects();
    sorted.to_string()
}

/// Text of a string, number or boolean; `None` for null, lists and dicts.
#[inline]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integer `Id` of a record, if it has one.
#[inline]
pub fn record_id(record: &Value) -> Option<i64> {
    record.get(ID_FIELD)?.as_i64()
}
