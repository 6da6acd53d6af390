use log::debug;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::id_hash::HashOptions;
use crate::types::{Encoding, FastMap, TableName};

/// Configuration for [`Database::open`](super::Database::open).
///
/// Can be read from a JSON options file; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub name: SmolStr,
    /// Encoding of every table without an entry in `table_encodings`.
    pub encoding: Encoding,
    pub table_encodings: FastMap<TableName, Encoding>,
    /// Table returned by `table(None)`; the first table by name when unset.
    pub default_table: Option<TableName>,
    /// Write even when schema validation fails.
    pub skip_save_validation: bool,
    /// Without a `schema.json`, the database never validates. Default: true.
    pub expect_schema: bool,
    /// Validate once right after loading.
    pub auto_validate: bool,
    /// Escape non-ASCII characters as `\uXXXX` on output. Default: true.
    pub ensure_ascii: bool,
    pub strip_trailing_bar: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            name: SmolStr::new_static("dbx"),
            encoding: Encoding::Utf8,
            table_encodings: FastMap::default(),
            default_table: None,
            skip_save_validation: false,
            expect_schema: true,
            auto_validate: false,
            ensure_ascii: true,
            strip_trailing_bar: false,
        }
    }
}

impl DbConfig {
    pub fn encoding_for(&self, table: &str) -> Encoding {
        self.table_encodings.get(table).copied().unwrap_or(self.encoding)
    }

    pub fn hash_options(&self) -> HashOptions {
        HashOptions {
            strip_trailing_bar: self.strip_trailing_bar,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Options file `file_base` in the user's home directory (`USERPROFILE`
    /// on Windows, `HOME` elsewhere, `/` when neither is set). A missing
    /// file yields the defaults.
    pub fn from_home(file_base: &str) -> Result<(PathBuf, Self)> {
        let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
        let home = std::env::var_os(var)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(std::path::MAIN_SEPARATOR_STR));
        let path = home.join(file_base);
        if !path.is_file() {
            debug!("no options at {}; using defaults", path.display());
            return Ok((path, Self::default()));
        }
        let config = Self::from_file(&path)?;
        Ok((path, config))
    }
}

/// Lifecycle of a [`Database`](super::Database).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbState {
    #[default]
    Uninitialized,
    /// Directory listed, schema read.
    Discovered,
    /// Every candidate table load attempted.
    Loaded,
    Valid,
    Invalid,
}
