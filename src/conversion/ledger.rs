//! Category ledger files: a registry persisted as JSON so category ids stay
//! stable across independent runs.
//!
//! ```json
//! [
//!   {"id": 1, "name": "car"},
//!   {"id": 2, "name": "dog", "supercategory": "animal"}
//! ]
//! ```

use std::fs;
use std::path::Path;

use crate::error::AnnoconvError;
use crate::ir::{CategoryRecord, CategoryRegistry};

/// Loads a registry from a ledger file.
///
/// # Errors
/// - [`AnnoconvError::Io`] if the file cannot be read
/// - [`AnnoconvError::CategoryLedgerParse`] for invalid JSON
/// - [`AnnoconvError::MalformedInput`] (wrapped with the path) for id 0 or
///   duplicate ids/names
pub fn load_category_ledger(path: &Path) -> Result<CategoryRegistry, AnnoconvError> {
    let raw = fs::read_to_string(path).map_err(|source| AnnoconvError::from(source).in_file(path))?;
    let records: Vec<CategoryRecord> =
        serde_json::from_str(&raw).map_err(|source| AnnoconvError::CategoryLedgerParse {
            path: path.to_path_buf(),
            source,
        })?;

    let registry = CategoryRegistry::from_records(records).map_err(|err| err.in_file(path))?;
    tracing::debug!(path = %path.display(), categories = registry.len(), "loaded category ledger");
    Ok(registry)
}

/// Writes `registry` to a ledger file, ordered by id.
pub fn save_category_ledger(path: &Path, registry: &CategoryRegistry) -> Result<(), AnnoconvError> {
    let json = serde_json::to_string_pretty(&registry.to_records())
        .map_err(|source| AnnoconvError::JsonWrite { source })?;
    fs::write(path, json + "\n").map_err(|source| AnnoconvError::from(source).in_file(path))?;
    tracing::debug!(path = %path.display(), categories = registry.len(), "saved category ledger");
    Ok(())
}
