pub mod json_store;
pub mod lock;
pub mod memory;
pub mod state;

use std::path::PathBuf;

use crate::model::{Domain, Entity, ValidationError};

pub use json_store::JsonStore;
pub use memory::MemoryStore;

/// Error type for the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no {domain} with key '{key}'")]
    NotFound { domain: Domain, key: String },
    #[error("field '{field}' is not editable on {domain}")]
    NotEditable { domain: Domain, field: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("edit conflict: {domain} '{key}' field '{field}' changed externally")]
    EditConflict {
        domain: Domain,
        key: String,
        field: String,
    },
    #[error(transparent)]
    Lock(#[from] lock::LockError),
}

/// Read side of the persistence boundary: snapshots of entity collections.
/// The returned vectors are owned copies; callers may reorder and annotate
/// them freely without affecting the store.
pub trait DataProvider {
    fn entities(&self, domain: Domain) -> Result<Vec<Entity>, StoreError>;
}

/// Write side. Every mutation validates through the field schema registry
/// before persisting.
pub trait DataStore: DataProvider {
    /// Atomic single-field update. `value` must already be in normalized
    /// form (the schema's `validate` is applied, not `normalize`).
    fn apply_edit(
        &mut self,
        domain: Domain,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    fn delete_entities(&mut self, domain: Domain, keys: &[String]) -> Result<(), StoreError>;

    /// Group-field rewrite used by kanban card moves. Same contract as
    /// `apply_edit` but named separately so stores can audit moves.
    fn move_group_field(
        &mut self,
        domain: Domain,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError>;
}
