use crate::scheduler::FacilityError;
use crate::storage::StorageError;
use thiserror::Error;

/// Erreurs du cœur. Aucune n'est fatale : la prochaine passe de
/// planification repart de zéro.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration insuffisante ou calcul impossible : « pas d'horaires ».
    #[error("prayer times unavailable: {0}")]
    ComputationUnavailable(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Facility(#[from] FacilityError),
}

impl CoreError {
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        CoreError::ComputationUnavailable(reason.into())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CoreError::ComputationUnavailable(_))
    }
}
