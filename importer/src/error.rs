use thiserror::Error;

/// Failures the importer refuses to continue past. Everything else is a
/// typed warning on the model.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("input is not an importable trace")]
    UnimportableInput,
    #[error("implicit snapshots must have names, got id {0:?}")]
    ImplicitSnapshotWithoutName(String),
    #[error("object snapshot args cannot have an id field inside them")]
    TopLevelSnapshotId,
}
