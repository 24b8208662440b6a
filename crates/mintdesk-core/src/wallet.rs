//! The wallet-signing seam.

use async_trait::async_trait;
use sol_wire::{Address, Keypair, Transaction};
use thiserror::Error;

use crate::error::DeskError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("user rejected the request")]
    Rejected,

    #[error("{0}")]
    Failed(String),
}

impl From<SignError> for DeskError {
    fn from(e: SignError) -> Self {
        match e {
            SignError::Rejected => DeskError::UserRejectedSigning,
            SignError::Failed(msg) => DeskError::SigningFailed(msg),
        }
    }
}

/// A connected (or disconnected) wallet. Only the wallet's own signature
/// slot is filled; other required signers must already have signed.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// The connected account, or `None` when no wallet is connected.
    fn address(&self) -> Option<Address>;

    async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction, SignError>;

    /// Sign several transactions behind one approval where the wallet
    /// supports it. The default signs them one by one.
    async fn sign_all_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, SignError> {
        let mut signed = Vec::with_capacity(transactions.len());
        for tx in transactions {
            signed.push(self.sign_transaction(tx).await?);
        }
        Ok(signed)
    }
}

/// A wallet backed by an in-process keypair, for scripts and local testing.
#[derive(Debug)]
pub struct LocalKeypairSigner {
    keypair: Keypair,
}

impl LocalKeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load a Solana CLI keypair file: a JSON array of 64 bytes.
    pub fn from_keypair_json(json: &str) -> Result<Self, DeskError> {
        let bytes: Vec<u8> = serde_json::from_str(json)
            .map_err(|e| DeskError::Config(format!("keypair file is not a byte array: {e}")))?;
        Ok(Self::new(Keypair::from_keypair_bytes(&bytes)?))
    }
}

#[async_trait]
impl WalletSigner for LocalKeypairSigner {
    fn address(&self) -> Option<Address> {
        Some(self.keypair.address())
    }

    async fn sign_transaction(&self, mut transaction: Transaction) -> Result<Transaction, SignError> {
        transaction
            .partial_sign(&self.keypair)
            .map_err(|e| SignError::Failed(e.to_string()))?;
        Ok(transaction)
    }
}
