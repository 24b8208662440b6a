//! Burn, transfer, delegate and close-account across every asset kind.
//!
//! Each operation matches exhaustively on [`AssetKind`] and builds the one
//! program call sequence that kind understands. Local preconditions are
//! checked before anything touches the network.

use asset_programs::{associated_token, bubblegum, mpl_core, spl_token, token_metadata};
use serde::Serialize;
use sol_wire::{Address, Instruction};
use tracing::{info, warn};

use crate::amount::check_spendable;
use crate::asset::{Asset, AssetKind, LeafData, OperationReceipt, TokenAccount};
use crate::error::DeskError;
use crate::resolver::AddressResolver;
use crate::submit::{OperationPhase, PhaseObserver, PhaseTracker, Session};

/// `AccountCompressionError::ConcurrentMerkleTreeError`, surfaced as
/// `{"Custom":6001}` when the tree changed under an on-chain transaction.
const CONCURRENT_MERKLE_TREE_ERROR: u32 = 6001;

/// Program log fragments that mean the proof no longer matches the tree.
const STALE_PROOF_MARKERS: &[&str] = &[
    "invalid root recomputed from proof",
    "invalidproof",
    "concurrentmerkletreeerror",
    "leaf contents do not match",
];

/// A mutating request against one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Operation {
    /// Fungible burns need an amount; NFTs are always burnt whole.
    Burn { amount: Option<u64> },
    /// Fungible transfers need an amount; NFTs move whole.
    Transfer {
        destination: Address,
        amount: Option<u64>,
    },
    /// Fungible only.
    Delegate { delegate: Address, amount: u64 },
    /// Close an empty token account, returning its rent to the wallet.
    CloseAccount { account: TokenAccount },
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Burn { .. } => "burn",
            Self::Transfer { .. } => "transfer",
            Self::Delegate { .. } => "delegate",
            Self::CloseAccount { .. } => "close account",
        }
    }
}

pub struct OperationDispatcher {
    session: Session,
    resolver: AddressResolver,
    observer: Option<PhaseObserver>,
}

impl OperationDispatcher {
    pub fn new(session: Session) -> Self {
        let resolver = AddressResolver::new(session.chain.clone());
        Self {
            session,
            resolver,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: PhaseObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn burn(&self, asset: &Asset, amount: Option<u64>) -> Result<OperationReceipt, DeskError> {
        self.execute(asset, Operation::Burn { amount }).await
    }

    pub async fn transfer(
        &self,
        asset: &Asset,
        destination: Address,
        amount: Option<u64>,
    ) -> Result<OperationReceipt, DeskError> {
        self.execute(asset, Operation::Transfer { destination, amount })
            .await
    }

    pub async fn delegate(
        &self,
        asset: &Asset,
        delegate: Address,
        amount: u64,
    ) -> Result<OperationReceipt, DeskError> {
        self.execute(asset, Operation::Delegate { delegate, amount })
            .await
    }

    pub async fn close_account(
        &self,
        asset: &Asset,
        account: TokenAccount,
    ) -> Result<OperationReceipt, DeskError> {
        self.execute(asset, Operation::CloseAccount { account }).await
    }

    /// Validate, build, sign, submit and confirm `operation` on `asset`.
    pub async fn execute(
        &self,
        asset: &Asset,
        operation: Operation,
    ) -> Result<OperationReceipt, DeskError> {
        let label = operation.label();
        let mut phases = PhaseTracker::new(label, self.observer.clone());
        let checked = self
            .session
            .wallet_address()
            .and_then(|wallet| validate(asset, &operation, &wallet).map(|()| wallet));
        let wallet = match checked {
            Ok(wallet) => wallet,
            Err(e) => {
                phases.advance(OperationPhase::Failed);
                return Err(e);
            }
        };
        info!(operation = label, asset = %asset.id, kind = asset.kind.label(), "dispatching");

        phases.advance(OperationPhase::Building);
        let instructions = match self.build(asset, &operation, &wallet).await {
            Ok(ixs) => ixs,
            Err(e) => {
                phases.advance(OperationPhase::Failed);
                return Err(e);
            }
        };

        let result = self.session.execute(&instructions, &[], &mut phases).await;
        let signature = match result {
            Ok(signature) => signature,
            Err(e) if matches!(asset.kind, AssetKind::CompressedNft { .. }) => {
                return Err(map_stale_proof(e))
            }
            Err(e) => return Err(e),
        };

        Ok(OperationReceipt {
            operation: label,
            asset: asset.id,
            signature,
        })
    }

    async fn build(
        &self,
        asset: &Asset,
        operation: &Operation,
        wallet: &Address,
    ) -> Result<Vec<Instruction>, DeskError> {
        let collection = asset.collection.map(|c| c.0);

        match (&asset.kind, operation) {
            // -- fungible --------------------------------------------------
            (AssetKind::FungibleToken { decimals, .. }, Operation::Burn { amount }) => {
                let amount = required(*amount)?;
                let program = self.resolver.resolve_program_owner(&asset.id).await?;
                let source = self.resolver.derive_account_address(&asset.id, wallet, program)?;
                Ok(vec![spl_token::burn_checked(
                    program, &source, &asset.id, wallet, amount, *decimals,
                )?])
            }
            (
                AssetKind::FungibleToken { decimals, .. },
                Operation::Transfer {
                    destination,
                    amount,
                },
            ) => {
                let amount = required(*amount)?;
                self.token_transfer(&asset.id, wallet, destination, amount, *decimals)
                    .await
            }
            (
                AssetKind::FungibleToken { decimals, .. },
                Operation::Delegate { delegate, amount },
            ) => {
                let program = self.resolver.resolve_program_owner(&asset.id).await?;
                let source = self.resolver.derive_account_address(&asset.id, wallet, program)?;
                Ok(vec![spl_token::approve_checked(
                    program, &source, &asset.id, delegate, wallet, *amount, *decimals,
                )?])
            }

            // -- legacy NFT ------------------------------------------------
            (AssetKind::LegacyNft, Operation::Burn { .. }) => {
                let program = self.resolver.resolve_program_owner(&asset.id).await?;
                let token = self.resolver.derive_account_address(&asset.id, wallet, program)?;
                Ok(vec![token_metadata::burn_nft_v1(
                    wallet,
                    &asset.id,
                    &token,
                    collection.as_ref(),
                    program,
                )?])
            }
            (AssetKind::LegacyNft, Operation::Transfer { destination, .. }) => {
                self.token_transfer(&asset.id, wallet, destination, 1, 0)
                    .await
            }

            // -- close (token accounts) ------------------------------------
            (
                AssetKind::FungibleToken { .. } | AssetKind::LegacyNft,
                Operation::CloseAccount { account },
            ) => {
                let program = self.resolver.resolve_program_owner(&asset.id).await?;
                Ok(vec![spl_token::close_account(
                    program,
                    &account.address,
                    wallet,
                    wallet,
                )])
            }

            // -- core NFT --------------------------------------------------
            (AssetKind::CoreNft { .. }, Operation::Burn { .. }) => Ok(vec![mpl_core::burn_v1(
                &asset.id,
                collection.as_ref(),
                wallet,
            )?]),
            (AssetKind::CoreNft { .. }, Operation::Transfer { destination, .. }) => {
                Ok(vec![mpl_core::transfer_v1(
                    &asset.id,
                    collection.as_ref(),
                    wallet,
                    destination,
                )?])
            }

            // -- compressed NFT --------------------------------------------
            (AssetKind::CompressedNft { tree, leaf }, Operation::Burn { .. }) => {
                let proof = self.fresh_proof(asset, tree, leaf).await?;
                Ok(vec![bubblegum::burn(
                    tree,
                    &leaf.owner,
                    &leaf.delegate.unwrap_or(leaf.owner),
                    &proof,
                )?])
            }
            (AssetKind::CompressedNft { tree, leaf }, Operation::Transfer { destination, .. }) => {
                let proof = self.fresh_proof(asset, tree, leaf).await?;
                Ok(vec![bubblegum::transfer(
                    tree,
                    &leaf.owner,
                    &leaf.delegate.unwrap_or(leaf.owner),
                    destination,
                    &proof,
                )?])
            }

            (
                AssetKind::LegacyNft | AssetKind::CoreNft { .. } | AssetKind::CompressedNft { .. },
                Operation::Delegate { .. },
            )
            | (
                AssetKind::CoreNft { .. } | AssetKind::CompressedNft { .. },
                Operation::CloseAccount { .. },
            ) => Err(unsupported(asset, operation)),
        }
    }

    /// Create the destination token account if it does not exist, then move
    /// `amount` with `TransferChecked`, in one transaction.
    async fn token_transfer(
        &self,
        mint: &Address,
        wallet: &Address,
        destination: &Address,
        amount: u64,
        decimals: u8,
    ) -> Result<Vec<Instruction>, DeskError> {
        let program = self.resolver.resolve_program_owner(mint).await?;
        let source = self.resolver.derive_account_address(mint, wallet, program)?;
        let target = self.resolver.derive_account_address(mint, destination, program)?;

        let mut instructions = Vec::with_capacity(2);
        if self.session.chain.get_account(&target).await?.is_none() {
            instructions.push(associated_token::create_idempotent(
                wallet,
                destination,
                mint,
                program,
            )?);
        }
        instructions.push(spl_token::transfer_checked(
            program, &source, mint, &target, wallet, amount, decimals,
        )?);
        Ok(instructions)
    }

    /// Fetch the leaf's current proof. Never reused across calls.
    async fn fresh_proof(
        &self,
        asset: &Asset,
        tree: &Address,
        leaf: &LeafData,
    ) -> Result<bubblegum::LeafProof, DeskError> {
        let proof = self.session.chain.get_asset_proof(&asset.id).await?;
        if proof.tree_id != *tree {
            return Err(DeskError::InvalidParams(format!(
                "proof for {} belongs to tree {}, expected {tree}",
                asset.id, proof.tree_id
            )));
        }
        Ok(bubblegum::LeafProof {
            root: proof.root,
            data_hash: leaf.data_hash,
            creator_hash: leaf.creator_hash,
            nonce: leaf.leaf_id,
            index: u32::try_from(leaf.leaf_id).map_err(|_| {
                DeskError::InvalidParams(format!("leaf id {} out of range", leaf.leaf_id))
            })?,
            proof: proof.proof,
        })
    }
}

/// Local checks that need no network access.
fn validate(asset: &Asset, operation: &Operation, wallet: &Address) -> Result<(), DeskError> {
    match (&asset.kind, operation) {
        (AssetKind::FungibleToken { balance, .. }, Operation::Burn { amount })
        | (AssetKind::FungibleToken { balance, .. }, Operation::Transfer { amount, .. }) => {
            check_spendable(required(*amount)?, *balance)
        }
        (AssetKind::FungibleToken { balance, .. }, Operation::Delegate { amount, .. }) => {
            check_spendable(*amount, *balance)
        }
        (
            AssetKind::FungibleToken { .. } | AssetKind::LegacyNft,
            Operation::CloseAccount { account },
        ) => {
            if account.balance != 0 {
                return Err(DeskError::NonZeroBalance {
                    balance: account.balance,
                });
            }
            if account.mint != asset.id {
                return Err(DeskError::InvalidParams(format!(
                    "token account {} holds mint {}, not {}",
                    account.address, account.mint, asset.id
                )));
            }
            Ok(())
        }
        (AssetKind::CoreNft { owner }, Operation::Burn { .. } | Operation::Transfer { .. })
        | (
            AssetKind::CompressedNft {
                leaf: LeafData { owner, .. },
                ..
            },
            Operation::Burn { .. } | Operation::Transfer { .. },
        ) => {
            if owner != wallet {
                return Err(DeskError::InvalidParams(format!(
                    "{} is owned by {owner}, not the connected wallet",
                    asset.id
                )));
            }
            Ok(())
        }
        (AssetKind::LegacyNft, Operation::Burn { .. } | Operation::Transfer { .. }) => Ok(()),
        (
            AssetKind::LegacyNft | AssetKind::CoreNft { .. } | AssetKind::CompressedNft { .. },
            Operation::Delegate { .. },
        )
        | (
            AssetKind::CoreNft { .. } | AssetKind::CompressedNft { .. },
            Operation::CloseAccount { .. },
        ) => Err(unsupported(asset, operation)),
    }
}

fn required(amount: Option<u64>) -> Result<u64, DeskError> {
    amount.ok_or_else(|| DeskError::InvalidAmount("an amount is required for fungible tokens".into()))
}

fn unsupported(asset: &Asset, operation: &Operation) -> DeskError {
    DeskError::UnsupportedKind {
        operation: operation.label(),
        kind: asset.kind.label(),
    }
}

/// Submission failures of compressed operations caused by a moved root are
/// reported as `ProofStale` so the caller rebuilds with a new proof.
fn map_stale_proof(err: DeskError) -> DeskError {
    match err {
        DeskError::TransactionFailed(text) | DeskError::Network(text)
            if is_stale_proof_message(&text) =>
        {
            warn!("compressed submission rejected with a stale proof");
            DeskError::ProofStale(text)
        }
        other => other,
    }
}

fn is_stale_proof_message(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    STALE_PROOF_MARKERS.iter().any(|m| lower.contains(m))
        || custom_error_code(&lower) == Some(CONCURRENT_MERKLE_TREE_ERROR)
}

/// The code of an `InstructionError` `{"Custom":N}` in a lowercased
/// transaction error, if any.
fn custom_error_code(lower: &str) -> Option<u32> {
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    let rest = &compact[compact.find("\"custom\":")? + "\"custom\":".len()..];
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
