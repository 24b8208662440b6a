//! Minting many compressed NFTs into one tree, a group at a time.

use asset_programs::bubblegum::{self, MetadataArgs};
use asset_programs::token_metadata::{validate_metadata_strings, validate_royalty, Creator};
use futures::future::join_all;
use serde::{Serialize, Serializer};
use sol_wire::{Address, Signature, Transaction};
use tracing::{info, warn};

use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::DeskError;
use crate::submit::{build_with_blockhash, ensure_fully_signed, Session};

/// Shared fields of every NFT in a batch. Names get a ` #<n>` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NftTemplate {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub royalty_bps: u16,
}

impl NftTemplate {
    /// Name of the `n`th NFT, counting from 1.
    pub fn numbered_name(&self, n: u64) -> String {
        format!("{} #{n}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GroupStatus {
    Confirmed,
    /// The first error of the group, kept typed so callers can pick a retry
    /// strategy from it.
    Failed {
        #[serde(serialize_with = "error_message")]
        error: DeskError,
    },
    NotAttempted,
}

fn error_message<S: Serializer>(error: &DeskError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    /// 1-based number of the first NFT in the group.
    pub first: u64,
    pub size: u64,
    pub status: GroupStatus,
    pub signatures: Vec<Signature>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MintBatchReport {
    pub groups: Vec<GroupReport>,
    pub succeeded: u64,
    pub failed: u64,
    pub not_attempted: u64,
    /// Signatures of every confirmed mint, in submission order.
    pub signatures: Vec<Signature>,
}

impl MintBatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.not_attempted == 0
    }
}

/// Mints `quantity` NFTs as independent transactions, `batch_size` at a
/// time. Groups run strictly one after another; a failing group stops the
/// batch and earlier confirmed groups stay minted.
pub struct BatchMinter {
    session: Session,
    batch_size: usize,
}

impl BatchMinter {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn mint_batch(
        &self,
        tree: &Address,
        quantity: u64,
        template: &NftTemplate,
    ) -> Result<MintBatchReport, DeskError> {
        let wallet = self.session.wallet_address()?;
        if quantity == 0 {
            return Err(DeskError::InvalidAmount(
                "batch must mint at least one NFT".into(),
            ));
        }
        // the longest name is the last one
        validate_metadata_strings(&template.numbered_name(quantity), &template.symbol, &template.uri)?;
        validate_royalty(template.royalty_bps)?;

        let size = self.batch_size as u64;
        let mut report = MintBatchReport::default();
        let mut aborted = false;
        let mut first = 1;

        while first <= quantity {
            let count = size.min(quantity - first + 1);
            if aborted {
                report.not_attempted += count;
                report.groups.push(GroupReport {
                    first,
                    size: count,
                    status: GroupStatus::NotAttempted,
                    signatures: Vec::new(),
                });
                first += count;
                continue;
            }

            let group = self
                .mint_group(tree, &wallet, template, first, count)
                .await;
            report.succeeded += group.signatures.len() as u64;
            report.signatures.extend_from_slice(&group.signatures);
            if let GroupStatus::Failed { error } = &group.status {
                warn!(first, count, %error, "mint group failed, stopping batch");
                report.failed += count - group.signatures.len() as u64;
                aborted = true;
            }
            report.groups.push(group);
            first += count;
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            not_attempted = report.not_attempted,
            "batch finished"
        );
        Ok(report)
    }

    /// One group: a shared blockhash, one signing prompt and concurrent
    /// submissions. Never returns an error; failures land in the report.
    async fn mint_group(
        &self,
        tree: &Address,
        wallet: &Address,
        template: &NftTemplate,
        first: u64,
        count: u64,
    ) -> GroupReport {
        let failed = |error: DeskError, signatures: Vec<Signature>| GroupReport {
            first,
            size: count,
            status: GroupStatus::Failed { error },
            signatures,
        };

        let signed = match self.build_and_sign(tree, wallet, template, first, count).await {
            Ok(txs) => txs,
            Err(e) => return failed(e, Vec::new()),
        };

        let results = join_all(signed.iter().map(|tx| self.session.submit_and_confirm(tx))).await;

        let mut signatures = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(signature) => signatures.push(signature),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => GroupReport {
                first,
                size: count,
                status: GroupStatus::Confirmed,
                signatures,
            },
            Some(e) => failed(e, signatures),
        }
    }

    async fn build_and_sign(
        &self,
        tree: &Address,
        wallet: &Address,
        template: &NftTemplate,
        first: u64,
        count: u64,
    ) -> Result<Vec<Transaction>, DeskError> {
        let blockhash = self.session.chain.get_latest_blockhash().await?;

        let mut unsigned = Vec::with_capacity(count as usize);
        for n in first..first + count {
            let metadata = MetadataArgs::new(
                template.numbered_name(n),
                &template.symbol,
                &template.uri,
                template.royalty_bps,
                vec![Creator {
                    address: *wallet,
                    verified: true,
                    share: 100,
                }],
            );
            let ix = bubblegum::mint_v1(tree, wallet, wallet, wallet, &metadata)?;
            unsigned.push(build_with_blockhash(&[ix], wallet, blockhash, &[])?);
        }

        let signed = self.session.wallet.sign_all_transactions(unsigned).await?;
        for tx in &signed {
            ensure_fully_signed(tx)?;
        }
        Ok(signed)
    }
}
