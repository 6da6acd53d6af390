pub mod db;
pub mod table;
pub mod types;

pub use db::Database;
pub use table::Table;
pub use types::{DbConfig, DbState};

#[cfg(test)]
mod tests;
