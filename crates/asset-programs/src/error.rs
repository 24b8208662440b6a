use sol_wire::WireError;
use thiserror::Error;

/// Errors raised while encoding program instructions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("argument encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl From<std::io::Error> for ProgramError {
    fn from(err: std::io::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}
