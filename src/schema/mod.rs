//! Declarative schema of a database: which tables exist and which
//! uniqueness rules hold for their cases.
//!
//! The schema lives in `schema.json`, itself a box whose `boxes` case lists
//! one [`BoxDescriptor`] per table (the trailing `Id: 0` sentinel is dropped).

pub mod rules;
pub mod unique;

use log::{debug, info};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::case_index::{CaseIndex, strip_sentinel};
use crate::error::{Result, StoreError};
use crate::jbox::JBox;
use crate::types::*;
use crate::value_shape::ValueShape;

pub use rules::{BoxDescriptor, FieldRule, FieldType, MethodRule};
pub use unique::{Infos, MAX_DEPTH};

/// Case of `schema.json` holding the table descriptors.
pub const BOXES_CASE: &str = "boxes";

// ─── LoadedTables ───────────────────────────────────────────────────────────

/// Where validation finds table content.
pub trait LoadedTables {
    /// The table's box, or `None` when it is unknown or failed to load.
    fn loaded(&self, table: &str) -> Option<&JBox>;
}

impl LoadedTables for FastMap<TableName, JBox> {
    fn loaded(&self, table: &str) -> Option<&JBox> {
        self.get(table)
    }
}

// ─── Schema ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Schema {
    info: DataInfo,
    /// Box and path the schema was read from, if any.
    source: Option<(JBox, PathBuf)>,
    boxes: Vec<BoxDescriptor>,
}

impl Schema {
    /// A schema declaring no tables; validates anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check load-time invariants and build a schema from descriptors.
    ///
    /// Fails when a rule's `Id` is not its 1-based position in its list, a
    /// descriptor has no `Title` or a non-positive `Id`, or a table is declared twice.
    pub fn new(boxes: Vec<BoxDescriptor>) -> Result<Self> {
        let mut used = FastHashSet::default();
        for desc in &boxes {
            if desc.id <= 0 {
                return Err(StoreError::MalformedSchema(format!(
                    "'{}': box Id must be positive, got {}",
                    desc.key, desc.id
                )));
            }
            if desc.title().is_empty() {
                return Err(StoreError::MalformedSchema(format!("'{}': empty Title", desc.key)));
            }
            if !used.insert(desc.key.clone()) {
                return Err(StoreError::MalformedSchema(format!("'{}': duplicate table", desc.key)));
            }
            for rules in &desc.cases {
                for (pos, rule) in rules.iter().enumerate() {
                    let expected = pos as i64 + 1;
                    if rule.id != expected {
                        return Err(StoreError::MalformedSchema(format!(
                            "'{}': rule '{}' has Id={}, expected {expected}",
                            desc.key, rule.key, rule.id
                        )));
                    }
                }
            }
        }
        Ok(Self {
            info: DataInfo::new("schema", Encoding::default()),
            source: None,
            boxes,
        })
    }

    /// Read descriptors from the `boxes` case of a loaded schema box.
    pub fn from_box(jbox: JBox, path: impl Into<PathBuf>) -> Result<Self> {
        let index = CaseIndex::build(jbox.value())?;
        let records = index.records(jbox.value(), BOXES_CASE)?;
        let live = Value::Array(strip_sentinel(records).to_vec());
        let boxes: Vec<BoxDescriptor> =
            serde_json::from_value(live).map_err(|e| StoreError::MalformedSchema(e.to_string()))?;

        let mut schema = Self::new(boxes)?;
        schema.info = DataInfo::new("schema", jbox.encoding());
        schema.source = Some((jbox, path.into()));
        Ok(schema)
    }

    /// Load `path`; `Ok(None)` when the file does not exist.
    pub fn load(path: &Path, encoding: Encoding, ensure_ascii: bool) -> Result<Option<Self>> {
        let mut jbox = JBox::new("schema", encoding).with_ensure_ascii(ensure_ascii);
        if !jbox.load(path)? {
            return Ok(None);
        }
        let schema = Self::from_box(jbox, path)?;
        info!("schema {}: {} table(s)", path.display(), schema.boxes.len());
        Ok(Some(schema))
    }

    pub fn info(&self) -> &DataInfo {
        &self.info
    }

    pub fn path(&self) -> Option<&Path> {
        self.source.as_ref().map(|(_, path)| path.as_path())
    }

    /// Declared tables, in schema order.
    pub fn tables(&self) -> &[BoxDescriptor] {
        &self.boxes
    }

    pub fn descriptor(&self, table: &str) -> Option<&BoxDescriptor> {
        self.boxes.iter().find(|desc| desc.key == table)
    }

    /// Rewrite the schema file in canonical form. No-op for a schema not read from a file.
    pub fn save(&mut self) -> Result<()> {
        match &mut self.source {
            Some((jbox, path)) => jbox.save(path.as_path()),
            None => {
                debug!("schema has no source file; nothing to save");
                Ok(())
            }
        }
    }

    // ─── Validation ─────────────────────────────────────────────────────────

    /// Check every declared rule against `tables`, in schema order.
    ///
    /// Returns an empty string on success, otherwise the first failure.
    /// A declared table that is not loaded yields `Faulty '<table>'`.
    pub fn validate<T: LoadedTables + ?Sized>(&self, tables: &T) -> String {
        for desc in &self.boxes {
            let table = desc.key.as_str();
            let Some(jbox) = tables.loaded(table) else {
                return format!("Faulty '{table}'");
            };
            let index = match CaseIndex::build(jbox.value()) {
                Ok(index) => index,
                Err(e) => return format!("Faulty '{table}': {e}"),
            };

            for rule in desc.rules() {
                let infos = Infos { table, case: rule.key.as_str() };
                let case = match index.case_value(jbox.value(), &rule.key) {
                    Ok(case) => case,
                    Err(_) => return format!("Case not found {infos}"),
                };
                // Only record lists carry rules.
                let Value::Array(records) = case else {
                    continue;
                };
                let msg = check_rule(rule, records, infos);
                if !msg.is_empty() {
                    return msg;
                }
            }
        }
        String::new()
    }
}

/// Dispatch one rule on its case's records.
pub fn check_rule(rule: &FieldRule, records: &[Value], infos: Infos) -> String {
    match rule.field_type {
        FieldType::UniqueId => unique::check_unique_ids(records, infos),
        FieldType::Unique => {
            let fields = rule.unique_fields();
            if fields.is_empty() {
                unique::check_shape(ValueShape::List(records), infos, 0)
            } else {
                unique::check_unique_fields(records, &fields, infos)
            }
        }
    }
}
