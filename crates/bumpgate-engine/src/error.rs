//! Engine-level errors.

use bumpgate_core::domain::error::{ManifestError, SemverError, UpgradeError};
use bumpgate_core::domain::phase::IllegalTransition;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Phase(#[from] IllegalTransition),
}

impl From<SemverError> for EngineError {
    fn from(err: SemverError) -> Self {
        EngineError::Upgrade(err.into())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
