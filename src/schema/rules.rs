use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::types::TableName;

/// One table declared by the schema's `boxes` case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxDescriptor {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Key")]
    pub key: TableName,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    /// Rule lists; within each list a rule's `Id` is its 1-based position.
    #[serde(rename = "Cases", default)]
    pub cases: Vec<Vec<FieldRule>>,
}

impl BoxDescriptor {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    /// Every rule of the table, in declared order.
    pub fn rules(&self) -> impl Iterator<Item = &FieldRule> {
        self.cases.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(rename = "Id")]
    pub id: i64,
    /// Logical case name inside the table.
    #[serde(rename = "Key")]
    pub key: SmolStr,
    #[serde(rename = "FieldType")]
    pub field_type: FieldType,
    #[serde(rename = "Method", default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Vec<MethodRule>>,
}

impl FieldRule {
    /// Field names declared by every `UniqueFields` entry of the method, in order.
    pub fn unique_fields(&self) -> Vec<&str> {
        self.method
            .iter()
            .flatten()
            .filter_map(|m| m.unique_fields.as_ref())
            .flatten()
            .map(SmolStr::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// Every record's `Id` is distinct.
    #[serde(rename = "u-id")]
    UniqueId,
    /// Records, or the named fields of records, are distinct.
    #[serde(rename = "unique")]
    Unique,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodRule {
    #[serde(rename = "UniqueFields", default, skip_serializing_if = "Option::is_none")]
    pub unique_fields: Option<Vec<SmolStr>>,
}
