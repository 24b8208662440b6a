use asset_programs::ProgramError;
use sol_wire::{Address, WireError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeskError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Token account still holds {balance} base units; burn or transfer them before closing")]
    NonZeroBalance { balance: u64 },

    #[error("Inclusion proof is stale: {0}")]
    ProofStale(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Signing request rejected by user")]
    UserRejectedSigning,

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Unsupported: {operation} is not available for {kind} assets")]
    UnsupportedKind {
        operation: &'static str,
        kind: &'static str,
    },

    #[error("Capacity exceeded: {quantity} exceeds the largest tree capacity of {max}")]
    CapacityExceeded { quantity: u64, max: u64 },

    #[error("Invalid account owner: {address} is owned by {owner}")]
    InvalidAccountOwner { address: Address, owner: Address },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// How a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Ask the user again (rejected or missing wallet).
    Reprompt,
    /// The request itself is wrong; retrying changes nothing.
    DoNotRetry,
    /// Fetch fresh chain state, rebuild and sign a new transaction.
    RebuildAndResubmit,
    /// Transient; the whole operation can be run again.
    RetryWhole,
}

impl DeskError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::WalletNotConnected | Self::UserRejectedSigning => RetryClass::Reprompt,
            Self::ProofStale(_) => RetryClass::RebuildAndResubmit,
            Self::Network(_) | Self::UploadFailed(_) | Self::SigningFailed(_) => {
                RetryClass::RetryWhole
            }
            Self::NotFound(_)
            | Self::InvalidAmount(_)
            | Self::NonZeroBalance { .. }
            | Self::UnsupportedKind { .. }
            | Self::CapacityExceeded { .. }
            | Self::InvalidAccountOwner { .. }
            | Self::InvalidParams(_)
            | Self::TransactionFailed(_)
            | Self::Config(_)
            | Self::Wire(_)
            | Self::Program(_) => RetryClass::DoNotRetry,
        }
    }
}
