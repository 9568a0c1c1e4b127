use reelcap_engine::AcquireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Acquisition error: {0}")]
    Acquire(#[from] AcquireError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::InvalidInput(_) => 2,
            AppError::Acquire(e) => match e.root_cause() {
                AcquireError::Cancelled => 130,
                AcquireError::InvalidInput { .. } => 2,
                _ => 1,
            },
            AppError::Io(_) => 1,
        }
    }
}
