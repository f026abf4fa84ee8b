use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("a run is already active (run_id {run_id})")]
    Busy { run_id: String },

    #[error("store error: {0}")]
    Store(#[from] pulse_store::StoreError),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
