use log::{debug, info, warn};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::table::Table;
use super::types::{DbConfig, DbState};
use crate::error::{Result, StoreError};
use crate::id_hash::IdHash;
use crate::jbox::JBox;
use crate::schema::{LoadedTables, Schema};
use crate::types::*;

/// A directory of table files validated by its `schema.json`.
///
/// Single-session: the database assumes it is the only writer of its
/// directory while open.
#[derive(Debug)]
pub struct Database {
    info: DataInfo,
    config: DbConfig,
    dir: PathBuf,
    schema: Schema,
    has_schema: bool,
    /// Why a present `schema.json` could not be read.
    schema_error: Option<String>,
    /// Sorted by name.
    tables: BTreeMap<TableName, Table>,
    state: DbState,
    msg: String,
}

impl LoadedTables for Database {
    fn loaded(&self, table: &str) -> Option<&JBox> {
        self.tables.get(table).filter(|t| t.is_ok()).map(Table::jbox)
    }
}

impl Database {
    /// An empty, uninitialized database.
    pub fn new(config: DbConfig) -> Self {
        Self {
            info: DataInfo::new(config.name.clone(), config.encoding),
            config,
            dir: PathBuf::new(),
            schema: Schema::empty(),
            has_schema: false,
            schema_error: None,
            tables: BTreeMap::new(),
            state: DbState::Uninitialized,
            msg: String::new(),
        }
    }

    /// Discover and load the database at `path`: a directory, or any file inside one.
    ///
    /// Tables that fail to load are recorded, not fatal. A schema that
    /// cannot be parsed or breaks its structural rules is an error.
    pub fn open(path: impl AsRef<Path>, config: DbConfig) -> Result<Self> {
        let mut db = Self::new(config);
        db.discover(path)?;
        db.load_tables();
        if db.config.auto_validate {
            db.valid_schema();
        }
        Ok(db)
    }

    /// List `*.json` files next to `path` and read `schema.json`.
    pub fn discover(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = if fs::metadata(path)?.is_dir() {
            path.to_path_buf()
        } else {
            match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        };

        let mut schema_path = None;
        let mut tables = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some(JSON_EXTENSION) {
                continue;
            }
            let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
                warn!("skipping non UTF-8 file name: {}", file.display());
                continue;
            };
            if stem == SCHEMA_STEM {
                schema_path = Some(file);
                continue;
            }
            let name = TableName::from(stem);
            let jbox = JBox::new(format!("{}:{name}", self.info.hint()), self.config.encoding_for(&name))
                .with_ensure_ascii(self.config.ensure_ascii);
            tables.insert(name.clone(), Table::new(name, file, jbox));
        }

        self.msg.clear();
        self.has_schema = false;
        self.schema_error = None;
        self.schema = Schema::empty();
        if let Some(schema_path) = schema_path {
            match Schema::load(&schema_path, self.config.encoding, self.config.ensure_ascii) {
                Ok(Some(schema)) => {
                    self.schema = schema;
                    self.has_schema = true;
                }
                Ok(None) => {}
                // Unparsable text is reported like a missing schema; broken rules are not.
                Err(e @ (StoreError::Json(_) | StoreError::Encoding(_))) => {
                    let msg = format!("Unable to read schema: {}: {e}", schema_path.display());
                    warn!("{}: {msg}", self.info.hint());
                    self.schema_error = Some(msg);
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(msg) = &self.schema_error {
            self.msg = msg.clone();
        } else if !self.has_schema && self.config.expect_schema {
            self.msg = Self::missing_schema_message(&dir);
        }

        info!("{}: {} table(s) in {}", self.info.hint(), tables.len(), dir.display());
        self.dir = dir;
        self.tables = tables;
        self.state = DbState::Discovered;
        Ok(())
    }

    /// Load every discovered table; failures are kept per table.
    pub fn load_tables(&mut self) {
        for table in self.tables.values_mut() {
            debug!("loading {}", table.path().display());
            table.load();
        }
        self.state = DbState::Loaded;
    }

    /// Re-read one table from disk.
    pub fn reload(&mut self, name: &str) -> Result<bool> {
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| StoreError::TableNotFound(SmolStr::from(name)))?;
        Ok(table.load())
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn info(&self) -> &DataInfo {
        &self.info
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn has_schema(&self) -> bool {
        self.has_schema
    }

    pub fn state(&self) -> DbState {
        self.state
    }

    /// Last validation or save message; empty when none.
    pub fn message(&self) -> &str {
        &self.msg
    }

    pub fn basic_ok(&self) -> bool {
        self.msg.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(SmolStr::as_str)
    }

    /// `name`, else the configured default table, else the first table by name.
    pub fn table(&self, name: Option<&str>) -> Result<&Table> {
        let name = self.resolve(name)?;
        self.tables.get(&name).ok_or(StoreError::TableNotFound(name))
    }

    pub fn table_mut(&mut self, name: Option<&str>) -> Result<&mut Table> {
        let name = self.resolve(name)?;
        self.tables.get_mut(&name).ok_or(StoreError::TableNotFound(name))
    }

    fn resolve(&self, name: Option<&str>) -> Result<TableName> {
        if let Some(name) = name.map(SmolStr::from).or_else(|| self.config.default_table.clone()) {
            return Ok(name);
        }
        self.tables.keys().next().cloned().ok_or(StoreError::NoTables)
    }

    /// Identifier hash of `case` in `table`.
    pub fn id_hash(&self, table: &str, case: &str) -> Result<Option<IdHash>> {
        self.table(Some(table))?.id_hash(case, self.config.hash_options())
    }

    // ─── Validation ─────────────────────────────────────────────────────────

    /// Validate the loaded tables against the schema. Empty on success.
    pub fn validate(&self) -> String {
        if let Some(msg) = &self.schema_error {
            return msg.clone();
        }
        if !self.has_schema && self.config.expect_schema {
            return Self::missing_schema_message(&self.dir);
        }
        self.schema.validate(self)
    }

    /// Run [`validate`](Self::validate), keeping its message and the resulting state.
    pub fn valid_schema(&mut self) -> bool {
        self.msg = self.validate();
        let valid = self.msg.is_empty();
        self.state = if valid { DbState::Valid } else { DbState::Invalid };
        if !valid {
            warn!("{}: {}", self.info.hint(), self.msg);
        }
        valid
    }

    fn missing_schema_message(dir: &Path) -> String {
        format!("No schema at: {}", dir.display())
    }

    // ─── Save ───────────────────────────────────────────────────────────────

    /// Save one table, or all of them in name order.
    ///
    /// Validates first (unless `skip_save_validation`) and writes nothing
    /// when validation fails. Saving all tables is best effort, not
    /// transactional: every table is attempted, and a `PartialSave` error
    /// lists those that were not written while the others are already on disk.
    /// Tables that failed to load are never written.
    pub fn save(&mut self, name: Option<&str>) -> Result<()> {
        self.save_where(name, |_| true)
    }

    /// Like `save(None)`, but only for tables whose content changed since
    /// they were loaded or last saved.
    pub fn save_modified(&mut self) -> Result<()> {
        self.save_where(None, |t| t.jbox().is_modified())
    }

    fn save_where(&mut self, name: Option<&str>, wanted: impl Fn(&Table) -> bool) -> Result<()> {
        if !self.config.skip_save_validation && !self.valid_schema() {
            return Err(StoreError::Validation(self.msg.clone()));
        }

        if let Some(name) = name {
            let table = self
                .tables
                .get_mut(name)
                .ok_or_else(|| StoreError::TableNotFound(SmolStr::from(name)))?;
            return table.save();
        }

        let mut failed = Vec::new();
        for (name, table) in self.tables.iter_mut() {
            if !table.is_ok() {
                debug!("not saving '{name}': not loaded");
                continue;
            }
            if !wanted(table) {
                continue;
            }
            if let Err(e) = table.save() {
                warn!("failed to save '{name}': {e}");
                failed.push(name.clone());
            }
        }
        if failed.is_empty() {
            info!("{}: saved", self.info.hint());
            return Ok(());
        }
        let names: Vec<&str> = failed.iter().map(SmolStr::as_str).collect();
        self.msg = format!("Failed Save(s): {}", names.join("; "));
        Err(StoreError::PartialSave {
            failed,
            message: self.msg.clone(),
        })
    }

    /// Rewrite `schema.json` in canonical form (sorted, indented).
    pub fn resave_schema(&mut self) -> Result<()> {
        self.schema.save()
    }
}
