// ─── Error ──────────────────────────────────────────────────────────────────
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("encoding error: {0}")]
    Encoding(String),
    /// Top-level value is not an object, or its first key does not start with `!`.
    #[error("malformed box: {0}")]
    MalformedBox(String),
    /// Rule `Id` out of position, empty `Title`, duplicate table, unknown `FieldType`.
    #[error("malformed schema: {0}")]
    MalformedSchema(String),
    #[error("case not found: {0}")]
    CaseNotFound(SmolStr),
    #[error("table not found: {0}")]
    TableNotFound(SmolStr),
    #[error("no tables")]
    NoTables,
    #[error("{0}")]
    Validation(String),
    /// Best-effort multi-table save: the listed tables were not written.
    #[error("{message}")]
    PartialSave {
        failed: Vec<SmolStr>,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
