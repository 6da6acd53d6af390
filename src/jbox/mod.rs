//! JSON-file-backed document ("box").
//!
//! A box owns one JSON value. It is loaded from and saved to a file in a
//! fixed encoding, and is always written pretty-printed with sorted keys
//! and a single trailing newline.

pub mod codec;

use log::debug;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::io::Write;
use std::path::Path;
use xxhash_rust::xxh64::xxh64;

use crate::case_index::CaseIndex;
use crate::error::{Result, StoreError};
use crate::types::*;
use crate::value_shape::record_id;

#[derive(Debug, Clone)]
pub struct JBox {
    info: DataInfo,
    value: Value,
    ensure_ascii: bool,
    /// xxh64 of the text last loaded or saved.
    fingerprint: Option<u64>,
    /// Physical case key → position of the last record inserted since the last save.
    pending: FastMap<SmolStr, usize>,
}

impl Default for JBox {
    fn default() -> Self {
        Self::new("", Encoding::default())
    }
}

impl JBox {
    /// An empty box holding `{}`.
    pub fn new(name: impl Into<SmolStr>, encoding: Encoding) -> Self {
        Self::from_value(Value::Object(Map::new()), name, encoding)
    }

    pub fn from_value(value: Value, name: impl Into<SmolStr>, encoding: Encoding) -> Self {
        Self {
            info: DataInfo::new(name, encoding),
            value,
            ensure_ascii: true,
            fingerprint: None,
            pending: FastMap::default(),
        }
    }

    /// Escape non-ASCII characters on output (default `true`).
    pub fn with_ensure_ascii(mut self, ensure_ascii: bool) -> Self {
        self.ensure_ascii = ensure_ascii;
        self
    }

    #[inline]
    pub fn info(&self) -> &DataInfo {
        &self.info
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.info.encoding
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Mutable access to the content. Case indexes built before the
    /// mutation must be rebuilt if top-level keys change.
    #[inline]
    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    // ─── I/O ────────────────────────────────────────────────────────────────

    /// Replace the content with the file at `path`.
    ///
    /// Returns `Ok(false)` when the file does not exist (content is left
    /// empty), and a `Json` error when it is not valid JSON.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        self.value = Value::Object(Map::new());
        self.pending.clear();
        self.fingerprint = None;

        let Some(text) = codec::read_text(path, self.info.encoding)? else {
            debug!("{}: no file at {}", self.info.hint(), path.display());
            return Ok(false);
        };
        self.value = serde_json::from_str(&text)?;
        self.fingerprint = Some(self.current_fingerprint()?);
        Ok(true)
    }

    /// Write the content to `path`, replacing the file. Does not validate.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = self.to_json_string()?;
        codec::write_text(path.as_ref(), &text, self.info.encoding)?;
        self.pending.clear();
        self.fingerprint = Some(xxh64(text.as_bytes(), 0));
        Ok(())
    }

    /// Write the same text `save` would to any stream.
    pub fn save_to_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        let text = self.to_json_string()?;
        writer.write_all(&self.info.encoding.encode(&text)?)?;
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String> {
        codec::render(&self.value, self.ensure_ascii)
    }

    /// Whether the rendered content differs from what was last loaded or saved.
    pub fn is_modified(&self) -> bool {
        match (self.fingerprint, self.current_fingerprint()) {
            (Some(saved), Ok(now)) => saved != now,
            _ => true,
        }
    }

    fn current_fingerprint(&self) -> Result<u64> {
        Ok(xxh64(self.to_json_string()?.as_bytes(), 0))
    }

    // ─── Cases ──────────────────────────────────────────────────────────────

    pub fn case_index(&self) -> Result<CaseIndex> {
        CaseIndex::build(&self.value)
    }

    /// Top-level keys, leaving out header (`!...`) and terminator (`~...`) keys.
    pub fn cases(&self) -> Vec<&str> {
        match &self.value {
            Value::Object(map) => map
                .keys()
                .map(String::as_str)
                .filter(|key| !key.starts_with(HEADER_PREFIX) && !key.starts_with(TERMINATOR_KEY))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Insert a record just before the sentinel of case `logical`.
    ///
    /// The new record starts as a copy of the sentinel, is overlaid with
    /// `fields`, and gets the next free `Id` when `fields` has none.
    /// Returns the list position of the inserted record.
    pub fn add_to(&mut self, logical: &str, fields: Map<String, Value>) -> Result<usize> {
        let index = self.case_index()?;
        let key = index.physical(logical)?.clone();
        let records = index.records_mut(&mut self.value, logical)?;

        let Some(last) = records.last() else {
            return Err(StoreError::MalformedBox(format!("case '{logical}' is empty")));
        };
        if record_id(last) != Some(0) {
            return Err(StoreError::MalformedBox(format!(
                "case '{logical}': last record is not an Id 0 sentinel"
            )));
        }

        let mut record = match last {
            Value::Object(template) => template.clone(),
            _ => Map::new(),
        };
        record.remove(ID_FIELD);
        record.extend(fields);
        if !record.contains_key(ID_FIELD) {
            let max = records.iter().filter_map(record_id).max().unwrap_or(0).max(0);
            let Some(next) = max.checked_add(1) else {
                return Err(StoreError::MalformedBox(format!(
                    "case '{logical}': no Id left after {max}"
                )));
            };
            record.insert(ID_FIELD.to_string(), Value::from(next));
        }

        let pos = records.len() - 1;
        records.insert(pos, Value::Object(record));
        self.pending.insert(key, pos);
        Ok(pos)
    }

    /// Cases with records inserted since the last save, with the last inserted position.
    pub fn pending_inserts(&self) -> &FastMap<SmolStr, usize> {
        &self.pending
    }
}

impl std::fmt::Display for JBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self.to_json_string().map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}
