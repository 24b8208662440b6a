//! In-memory stand-ins for the chain, the wallet and the pinning service.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mintdesk_core::asset::AssetProof;
use mintdesk_core::classifier::RawAssetRecord;
use mintdesk_core::rpc::{AccountFilter, AccountInfo};
use mintdesk_core::{ChainClient, DeskError, PinningService, Session, SignError, WalletSigner};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sol_wire::{Address, Hash, Keypair, Signature, Transaction};

pub const RENT_LAMPORTS: u64 = 2_039_280;

// ─── Chain ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeChain {
    pub accounts: Mutex<HashMap<Address, AccountInfo>>,
    pub records: Mutex<Vec<RawAssetRecord>>,
    pub proof: Mutex<Option<AssetProof>>,
    /// 0-based indices of `send_transaction` calls that fail.
    pub failing_sends: Mutex<HashSet<usize>>,
    pub send_error: Mutex<String>,
    /// Landed transactions fail confirmation with this error when set.
    pub confirm_error: Mutex<Option<String>>,
    pub sent: Mutex<Vec<Transaction>>,
    pub calls: AtomicUsize,
    sends: AtomicUsize,
    blockhashes: AtomicUsize,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        mintdesk_core::telemetry::init_tracing();
        Arc::new(Self::default())
    }

    pub fn insert_account(&self, address: Address, owner: Address, data: Vec<u8>) {
        self.accounts.lock().unwrap().insert(
            address,
            AccountInfo {
                owner,
                lamports: RENT_LAMPORTS,
                data,
            },
        );
    }

    pub fn fail_sends(&self, indices: impl IntoIterator<Item = usize>, error: &str) {
        self.failing_sends.lock().unwrap().extend(indices);
        *self.send_error.lock().unwrap() = error.to_string();
    }

    pub fn fail_confirmations(&self, error: &str) {
        *self.confirm_error.lock().unwrap() = Some(error.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, DeskError> {
        self.tick();
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, DeskError> {
        self.tick();
        let n = self.blockhashes.fetch_add(1, Ordering::SeqCst);
        Ok(Hash::new([n as u8 + 1; 32]))
    }

    async fn get_minimum_balance_for_rent_exemption(&self, space: u64) -> Result<u64, DeskError> {
        self.tick();
        Ok(space * 10)
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        filters: &[AccountFilter],
    ) -> Result<Vec<(Address, AccountInfo)>, DeskError> {
        self.tick();
        let mut found: Vec<(Address, AccountInfo)> = self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, info)| info.owner == *program)
            .filter(|(_, info)| filters.iter().all(|f| f.matches(&info.data)))
            .map(|(address, info)| (*address, info.clone()))
            .collect();
        found.sort_by_key(|(address, _)| *address);
        Ok(found)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, DeskError> {
        self.tick();
        let index = self.sends.fetch_add(1, Ordering::SeqCst);
        if !transaction.verify() {
            return Err(DeskError::TransactionFailed("signature verification failed".into()));
        }
        // round-trip through the wire format, as a node would
        let decoded = Transaction::deserialize(&transaction.serialize())?;
        if self.failing_sends.lock().unwrap().contains(&index) {
            return Err(DeskError::TransactionFailed(
                self.send_error.lock().unwrap().clone(),
            ));
        }
        self.sent.lock().unwrap().push(decoded);
        transaction
            .id()
            .ok_or_else(|| DeskError::TransactionFailed("unsigned".into()))
    }

    async fn confirm_transaction(&self, signature: &Signature) -> Result<(), DeskError> {
        self.tick();
        match self.confirm_error.lock().unwrap().as_ref() {
            Some(err) => Err(DeskError::TransactionFailed(format!("{signature}: {err}"))),
            None => Ok(()),
        }
    }

    async fn get_asset(&self, id: &Address) -> Result<RawAssetRecord, DeskError> {
        self.tick();
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == *id)
            .cloned()
            .ok_or_else(|| DeskError::NotFound(format!("asset {id}")))
    }

    async fn get_asset_proof(&self, id: &Address) -> Result<AssetProof, DeskError> {
        self.tick();
        self.proof
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DeskError::NotFound(format!("proof for asset {id}")))
    }

    async fn search_assets_by_owner(&self, owner: &Address) -> Result<Vec<RawAssetRecord>, DeskError> {
        self.tick();
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.ownership.as_ref().is_some_and(|o| o.owner == *owner))
            .cloned()
            .collect())
    }

    async fn get_assets_by_group(&self, collection: &Address) -> Result<Vec<RawAssetRecord>, DeskError> {
        self.tick();
        let value = collection.to_string();
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.grouping.iter().any(|g| g.group_value == value))
            .cloned()
            .collect())
    }
}

// ─── Wallet ──────────────────────────────────────────────────────────

pub struct FakeWallet {
    keypair: Option<Keypair>,
    pub reject: bool,
    pub prompts: AtomicUsize,
}

impl FakeWallet {
    pub fn connected(seed: u8) -> Arc<Self> {
        Arc::new(Self {
            keypair: Some(Keypair::from_seed(&[seed; 32])),
            reject: false,
            prompts: AtomicUsize::new(0),
        })
    }

    pub fn rejecting(seed: u8) -> Arc<Self> {
        Arc::new(Self {
            keypair: Some(Keypair::from_seed(&[seed; 32])),
            reject: true,
            prompts: AtomicUsize::new(0),
        })
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self {
            keypair: None,
            reject: false,
            prompts: AtomicUsize::new(0),
        })
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    fn sign(&self, mut tx: Transaction) -> Result<Transaction, SignError> {
        if self.reject {
            return Err(SignError::Rejected);
        }
        let keypair = self.keypair.as_ref().ok_or(SignError::Failed("not connected".into()))?;
        tx.partial_sign(keypair)
            .map_err(|e| SignError::Failed(e.to_string()))?;
        Ok(tx)
    }
}

#[async_trait]
impl WalletSigner for FakeWallet {
    fn address(&self) -> Option<Address> {
        self.keypair.as_ref().map(Keypair::address)
    }

    async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction, SignError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.sign(transaction)
    }

    async fn sign_all_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, SignError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        transactions.into_iter().map(|tx| self.sign(tx)).collect()
    }
}

pub fn session(chain: &Arc<FakeChain>, wallet: &Arc<FakeWallet>) -> Session {
    Session::new(chain.clone(), wallet.clone())
}

// ─── Pinning ─────────────────────────────────────────────────────────

/// Content-addressed store: the URI is derived from the bytes.
#[derive(Default)]
pub struct FakePinning {
    store: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakePinning {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn put(&self, bytes: Vec<u8>) -> String {
        let uri = format!(
            "https://gateway.test/ipfs/{}",
            bs58::encode(Sha256::digest(&bytes)).into_string()
        );
        self.store.lock().unwrap().insert(uri.clone(), bytes);
        uri
    }

    pub fn fetch(&self, uri: &str) -> Option<Vec<u8>> {
        self.store.lock().unwrap().get(uri).cloned()
    }
}

#[async_trait]
impl PinningService for FakePinning {
    async fn pin_file(&self, _: &str, bytes: Vec<u8>, _: &str) -> Result<String, DeskError> {
        Ok(self.put(bytes))
    }

    async fn pin_json(&self, _: &str, document: Value) -> Result<String, DeskError> {
        let bytes = serde_json::to_vec(&document)
            .map_err(|e| DeskError::UploadFailed(e.to_string()))?;
        Ok(self.put(bytes))
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Program id of each instruction in a submitted transaction.
pub fn program_ids(tx: &Transaction) -> Vec<Address> {
    tx.message
        .instructions
        .iter()
        .map(|ix| tx.message.account_keys[ix.program_id_index as usize])
        .collect()
}

/// Accounts of instruction `index`, in instruction order.
pub fn instruction_accounts(tx: &Transaction, index: usize) -> Vec<Address> {
    tx.message.instructions[index]
        .account_indices
        .iter()
        .map(|i| tx.message.account_keys[*i as usize])
        .collect()
}

/// Anchor instruction discriminator.
pub fn anchor_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}
