use log::{info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::case_index::CaseIndex;
use crate::error::{Result, StoreError};
use crate::id_hash::{HashOptions, IdHash};
use crate::jbox::JBox;
use crate::types::TableName;

/// One `<name>.json` file of a database and its load status.
#[derive(Debug, Clone)]
pub struct Table {
    name: TableName,
    path: PathBuf,
    jbox: JBox,
    ok: bool,
    load_error: Option<String>,
}

impl Table {
    /// A table not loaded yet.
    pub fn new(name: TableName, path: PathBuf, jbox: JBox) -> Self {
        Self {
            name,
            path,
            jbox,
            ok: false,
            load_error: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn jbox(&self) -> &JBox {
        &self.jbox
    }

    #[inline]
    pub fn jbox_mut(&mut self) -> &mut JBox {
        &mut self.jbox
    }

    /// Loaded and parsed successfully.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// (Re)read the file. Failures are recorded on the table, never returned.
    pub fn load(&mut self) -> bool {
        let (ok, error) = match self.jbox.load(&self.path) {
            Ok(true) => (true, None),
            Ok(false) => (false, Some(format!("no file at {}", self.path.display()))),
            Err(e) => (false, Some(e.to_string())),
        };
        if let Some(e) = &error {
            warn!("table '{}' not loaded: {e}", self.name);
        }
        self.ok = ok;
        self.load_error = error;
        ok
    }

    pub fn save(&mut self) -> Result<()> {
        if !self.ok {
            return Err(StoreError::Validation(format!("Faulty '{}'", self.name)));
        }
        self.jbox.save(&self.path)?;
        info!("saved '{}' at {}", self.name, self.path.display());
        Ok(())
    }

    /// Index of the table's current content.
    pub fn case_index(&self) -> Result<CaseIndex> {
        self.jbox.case_index()
    }

    pub fn records(&self, case: &str) -> Result<&[Value]> {
        self.case_index()?.records(self.jbox.value(), case)
    }

    /// Identifier hash of `case`; `None` when its list has no `Id: 0` sentinel.
    pub fn id_hash(&self, case: &str, opts: HashOptions) -> Result<Option<IdHash>> {
        Ok(IdHash::compute(self.records(case)?, opts))
    }
}
