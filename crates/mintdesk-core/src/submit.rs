//! Building, signing and submitting transactions on behalf of the connected
//! wallet.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use sol_wire::{Address, Instruction, Keypair, Message, Signature, Transaction};
use tracing::{debug, info, warn};

use crate::config::DeskConfig;
use crate::error::DeskError;
use crate::rpc::{ChainClient, HttpChainClient};
use crate::wallet::WalletSigner;

/// Explicit session context: the chain connection and the wallet. Every
/// component takes one of these instead of reading global state.
#[derive(Clone)]
pub struct Session {
    pub chain: Arc<dyn ChainClient>,
    pub wallet: Arc<dyn WalletSigner>,
}

impl Session {
    pub fn new(chain: Arc<dyn ChainClient>, wallet: Arc<dyn WalletSigner>) -> Self {
        Self { chain, wallet }
    }

    /// Session over JSON-RPC to the endpoints in `config`.
    pub fn connect(config: &DeskConfig, wallet: Arc<dyn WalletSigner>) -> Result<Self, DeskError> {
        config.validate()?;
        Ok(Self::new(Arc::new(HttpChainClient::new(config)), wallet))
    }

    /// The connected wallet address, or `WalletNotConnected`.
    pub fn wallet_address(&self) -> Result<Address, DeskError> {
        self.wallet.address().ok_or(DeskError::WalletNotConnected)
    }

    /// Compile `instructions` with the wallet as fee payer against a fresh
    /// blockhash, and sign with any generated keypairs (new mints, assets,
    /// trees). The wallet's slot is left empty.
    pub async fn build_transaction(
        &self,
        instructions: &[Instruction],
        extra_signers: &[&Keypair],
    ) -> Result<Transaction, DeskError> {
        let payer = self.wallet_address()?;
        let blockhash = self.chain.get_latest_blockhash().await?;
        build_with_blockhash(instructions, &payer, blockhash, extra_signers)
    }

    /// Run one transaction through signing, submission and confirmation,
    /// reporting each phase to `phases`.
    pub async fn execute(
        &self,
        instructions: &[Instruction],
        extra_signers: &[&Keypair],
        phases: &mut PhaseTracker,
    ) -> Result<Signature, DeskError> {
        let result = self.execute_inner(instructions, extra_signers, phases).await;
        match &result {
            Ok(_) => phases.advance(OperationPhase::Confirmed),
            Err(e) => {
                warn!(error = %e, "operation failed");
                phases.advance(OperationPhase::Failed);
            }
        }
        result
    }

    async fn execute_inner(
        &self,
        instructions: &[Instruction],
        extra_signers: &[&Keypair],
        phases: &mut PhaseTracker,
    ) -> Result<Signature, DeskError> {
        phases.advance(OperationPhase::Building);
        let unsigned = self.build_transaction(instructions, extra_signers).await?;

        phases.advance(OperationPhase::Signing);
        let signed = self.wallet.sign_transaction(unsigned).await?;
        ensure_fully_signed(&signed)?;

        phases.advance(OperationPhase::Submitting);
        self.submit_and_confirm(&signed).await
    }

    /// Send an already signed transaction and wait for confirmation.
    pub async fn submit_and_confirm(&self, signed: &Transaction) -> Result<Signature, DeskError> {
        let signature = self.chain.send_transaction(signed).await?;
        info!(%signature, "transaction submitted");
        self.chain.confirm_transaction(&signature).await?;
        info!(%signature, "transaction confirmed");
        Ok(signature)
    }
}

pub(crate) fn build_with_blockhash(
    instructions: &[Instruction],
    payer: &Address,
    blockhash: sol_wire::Hash,
    extra_signers: &[&Keypair],
) -> Result<Transaction, DeskError> {
    let message = Message::compile(instructions, payer, blockhash)?;
    let mut tx = Transaction::new_unsigned(message);
    for keypair in extra_signers {
        tx.partial_sign(keypair)?;
    }
    Ok(tx)
}

pub(crate) fn ensure_fully_signed(tx: &Transaction) -> Result<(), DeskError> {
    let missing = tx.missing_signers();
    if missing.is_empty() {
        return Ok(());
    }
    let list = missing
        .iter()
        .map(Address::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Err(DeskError::SigningFailed(format!("missing signatures for {list}")))
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Lifecycle of one operation. Not persisted; a new operation starts at
/// `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationPhase {
    Idle,
    Building,
    Signing,
    Submitting,
    Confirmed,
    Failed,
}

impl OperationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Callback receiving every phase transition.
pub type PhaseObserver = Arc<dyn Fn(OperationPhase) + Send + Sync>;

/// Tracks the phase of a single operation and forwards transitions to an
/// optional observer.
pub struct PhaseTracker {
    label: &'static str,
    phase: OperationPhase,
    observer: Option<PhaseObserver>,
}

impl PhaseTracker {
    pub fn new(label: &'static str, observer: Option<PhaseObserver>) -> Self {
        Self {
            label,
            phase: OperationPhase::Idle,
            observer,
        }
    }

    pub fn phase(&self) -> OperationPhase {
        self.phase
    }

    /// Move to `next`. Transitions out of a terminal phase are ignored.
    pub fn advance(&mut self, next: OperationPhase) {
        if self.phase.is_terminal() || self.phase == next {
            return;
        }
        debug!(operation = self.label, from = %self.phase, to = %next, "phase");
        self.phase = next;
        if let Some(observer) = &self.observer {
            observer(next);
        }
    }
}
