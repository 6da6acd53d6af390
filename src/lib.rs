//! A small JSON-file database.
//!
//! Every table is one `<name>.json` file (a "box") whose top-level object
//! holds a `!`-prefixed header, then named cases of records terminated by an
//! `Id: 0` sentinel. A `schema.json` in the same directory declares the
//! tables and the uniqueness rules their cases must satisfy; saving is
//! refused while those rules are violated.

pub mod case_index;
pub mod db;
pub mod error;
pub mod id_hash;
pub mod jbox;
pub mod schema;
pub mod types;
pub mod value_shape;

pub use case_index::CaseIndex;
pub use db::{Database, DbConfig, DbState, Table};
pub use error::{Result, StoreError};
pub use id_hash::{HashOptions, IdHash};
pub use jbox::JBox;
pub use schema::{LoadedTables, Schema};
pub use types::{DataInfo, Encoding};
