use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::HashSet;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::str::FromStr;

use crate::error::StoreError;

pub type FastMap<K, V> = std::collections::HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub type FastHashSet<T> = HashSet<T, BuildHasherDefault<FxHasher>>;

/// Alias for table names: the file stem of `<table>.json`.
pub type TableName = SmolStr;

// ─── Conventions ────────────────────────────────────────────────────────────

/// First character of the header case key.
pub const HEADER_PREFIX: char = '!';
/// Logical name the header case is indexed under.
pub const HEADER_NAME: &str = "!";
/// Top-level key that ends case scanning.
pub const TERMINATOR_KEY: &str = "~";
/// Separates a case's logical name from its suffix (`name=suffix`).
pub const SUFFIX_SEPARATOR: char = '=';
/// Record field carrying the integer identifier.
pub const ID_FIELD: &str = "Id";
/// Record field used verbatim as the display name.
pub const NAME_FIELD: &str = "Name";
/// Extension of every table and of the schema file.
pub const JSON_EXTENSION: &str = "json";
/// Stem of the schema file inside a database directory.
pub const SCHEMA_STEM: &str = "schema";

// ─── Encoding ───────────────────────────────────────────────────────────────

/// Text encoding of a table file. Never autodetected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encoding {
    #[default]
    Utf8,
    /// ISO-8859-1, also accepted as `latin-1`.
    Latin1,
}

impl Encoding {
    /// Canonical name, as reported to callers.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, StoreError> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| StoreError::Encoding(format!("invalid utf-8: {e}"))),
            // Every byte maps to the code point of the same value.
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>, StoreError> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        StoreError::Encoding(format!("{c:?} is not representable in ISO-8859-1"))
                    })
                })
                .collect(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "iso-8859-1" | "latin-1" | "latin1" => Ok(Encoding::Latin1),
            other => Err(StoreError::Encoding(format!("unsupported encoding: {other}"))),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Encoding> for String {
    fn from(e: Encoding) -> Self {
        e.name().to_string()
    }
}

// ─── DataInfo ───────────────────────────────────────────────────────────────

/// Name and encoding shared by boxes, schemas and databases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataInfo {
    pub name: SmolStr,
    pub encoding: Encoding,
}

impl DataInfo {
    pub fn new(name: impl Into<SmolStr>, encoding: Encoding) -> Self {
        Self {
            name: name.into(),
            encoding,
        }
    }

    /// The name, or `?` when unnamed; used in diagnostics.
    pub fn hint(&self) -> &str {
        if self.name.is_empty() { "?" } else { self.name.as_str() }
    }
}
