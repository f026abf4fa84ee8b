use thiserror::Error;

/// Top-level error type the binary translates into an exit code.
///
/// Subsystem crates (`pulse-store`, `pulse-sources`, …) keep their own
/// narrower error enums; this type is what `pulse-gateway::main` and the
/// Coordinator ultimately see.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("analysis error: {0}")]
    Analysis(String),

    #[error("messenger error: {0}")]
    Messenger(String),

    #[error("run {run_id} is busy: another run is active")]
    Busy { run_id: String },

    #[error("run cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PulseError {
    /// Process exit code: 0 clean, 1 config invalid, 2 one-shot runtime
    /// failure, 3 unexpected fault.
    pub fn exit_code(&self) -> i32 {
        match self {
            PulseError::Config(_) => 1,
            PulseError::Store(_)
            | PulseError::Analysis(_)
            | PulseError::Messenger(_)
            | PulseError::Busy { .. }
            | PulseError::Cancelled { .. } => 2,
            PulseError::Io(_) | PulseError::Internal(_) => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
