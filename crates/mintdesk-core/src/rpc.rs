//! Chain access: Solana JSON-RPC plus the DAS indexer methods.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sol_wire::{Address, Hash, Signature, Transaction};
use tracing::{debug, warn};

use crate::asset::AssetProof;
use crate::classifier::{RawAssetRecord, GROUP_KEY_COLLECTION};
use crate::config::{Commitment, DeskConfig};
use crate::error::DeskError;

/// Page size for DAS listing calls.
const DAS_PAGE_LIMIT: u32 = 1000;

/// An account as returned by `getAccountInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub owner: Address,
    pub lamports: u64,
    pub data: Vec<u8>,
}

/// A `getProgramAccounts` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    /// Account data at `offset` starts with `bytes`.
    Memcmp { offset: usize, bytes: Vec<u8> },
}

impl AccountFilter {
    pub fn memcmp(offset: usize, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Memcmp {
            offset,
            bytes: bytes.into(),
        }
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            Self::Memcmp { offset, bytes } => data
                .get(*offset..offset + bytes.len())
                .is_some_and(|window| window == bytes.as_slice()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Memcmp { offset, bytes } => json!({
                "memcmp": { "offset": offset, "bytes": bs58::encode(bytes).into_string() }
            }),
        }
    }
}

/// Everything the operation layer needs from the network. Implemented over
/// HTTP by [`HttpChainClient`] and by in-memory fakes in tests.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `None` when the account does not exist.
    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, DeskError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, DeskError>;

    async fn get_minimum_balance_for_rent_exemption(&self, space: u64) -> Result<u64, DeskError>;

    /// Accounts owned by `program` whose data passes every filter.
    async fn get_program_accounts(
        &self,
        program: &Address,
        filters: &[AccountFilter],
    ) -> Result<Vec<(Address, AccountInfo)>, DeskError>;

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, DeskError>;

    /// Wait until `signature` reaches the configured commitment, or fail.
    async fn confirm_transaction(&self, signature: &Signature) -> Result<(), DeskError>;

    async fn get_asset(&self, id: &Address) -> Result<RawAssetRecord, DeskError>;

    async fn get_asset_proof(&self, id: &Address) -> Result<AssetProof, DeskError>;

    async fn search_assets_by_owner(&self, owner: &Address)
        -> Result<Vec<RawAssetRecord>, DeskError>;

    async fn get_assets_by_group(
        &self,
        collection: &Address,
    ) -> Result<Vec<RawAssetRecord>, DeskError>;
}

// ---------------------------------------------------------------------------
// JSON-RPC envelope
// ---------------------------------------------------------------------------

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RpcRequest<T> {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    #[serde(rename = "params")]
    pub parameters: T,
}

impl<T> RpcRequest<T> {
    pub fn new(method: impl Into<String>, parameters: T) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: "mintdesk".to_string(),
            method: method.into(),
            parameters,
        }
    }
}

#[derive(Deserialize, Debug)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize, Debug)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorBody {
    /// Message plus any program logs from a failed preflight simulation.
    fn describe(&self) -> String {
        let logs = self
            .data
            .as_ref()
            .and_then(|d| d.get("logs"))
            .and_then(Value::as_array)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if logs.is_empty() {
            format!("{} (code {})", self.message, self.code)
        } else {
            format!("{} (code {})\n{logs}", self.message, self.code)
        }
    }
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
struct UiAccount {
    data: (String, String),
    owner: Address,
    lamports: u64,
}

impl UiAccount {
    fn decode(self, method: &str) -> Result<AccountInfo, DeskError> {
        let data = BASE64
            .decode(self.data.0.as_bytes())
            .map_err(|e| DeskError::Network(format!("{method}: bad base64 data: {e}")))?;
        Ok(AccountInfo {
            owner: self.owner,
            lamports: self.lamports,
            data,
        })
    }
}

#[derive(Deserialize)]
struct KeyedAccount {
    pubkey: Address,
    account: UiAccount,
}

#[derive(Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    confirmation_status: Option<String>,
    err: Option<Value>,
}

#[derive(Deserialize)]
struct DasPage {
    #[serde(default)]
    items: Vec<RawAssetRecord>,
}

#[derive(Deserialize)]
struct DasProof {
    root: Address,
    proof: Vec<Address>,
    leaf: Address,
    node_index: u64,
    tree_id: Address,
}

impl From<DasProof> for AssetProof {
    fn from(p: DasProof) -> Self {
        Self {
            root: p.root.to_bytes(),
            proof: p.proof,
            leaf: p.leaf.to_bytes(),
            node_index: p.node_index,
            tree_id: p.tree_id,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

pub struct HttpChainClient {
    http: Client,
    rpc_url: String,
    das_url: String,
    commitment: Commitment,
    poll_interval: std::time::Duration,
    max_attempts: u32,
}

impl HttpChainClient {
    pub fn new(config: &DeskConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: &DeskConfig) -> Self {
        Self {
            http,
            rpc_url: config.rpc_url.clone(),
            das_url: config.das_url.clone(),
            commitment: config.commitment,
            poll_interval: config.confirm_poll_interval(),
            max_attempts: config.confirm_max_attempts,
        }
    }

    async fn call<P: Serialize + Send + Sync, R: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: P,
    ) -> Result<Option<R>, DeskError> {
        debug!(method, "rpc call");
        let request = RpcRequest::new(method, params);

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeskError::Network(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeskError::Network(format!("{method}: HTTP {status}: {body}")));
        }

        let body: RpcResponse<R> = response
            .json()
            .await
            .map_err(|e| DeskError::Network(format!("{method}: malformed response: {e}")))?;

        if let Some(error) = body.error {
            return Err(classify_rpc_error(method, &error));
        }
        Ok(body.result)
    }

    async fn call_required<P: Serialize + Send + Sync, R: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: P,
    ) -> Result<R, DeskError> {
        self.call(url, method, params)
            .await?
            .ok_or_else(|| DeskError::Network(format!("{method}: response has no result")))
    }

    async fn das_paged(&self, method: &str, base: Value) -> Result<Vec<RawAssetRecord>, DeskError> {
        let mut items = Vec::new();
        for page in 1u32.. {
            let mut params = base.clone();
            params["page"] = json!(page);
            params["limit"] = json!(DAS_PAGE_LIMIT);

            let batch: DasPage = self.call_required(&self.das_url, method, params).await?;
            let n = batch.items.len();
            items.extend(batch.items);
            if n < DAS_PAGE_LIMIT as usize {
                break;
            }
        }
        Ok(items)
    }
}

/// Map a JSON-RPC error to the taxonomy. Missing DAS assets come back as
/// RPC errors rather than null results.
fn classify_rpc_error(method: &str, error: &RpcErrorBody) -> DeskError {
    let text = error.describe();
    if method == "sendTransaction" {
        return DeskError::TransactionFailed(text);
    }
    if text.to_ascii_lowercase().contains("not found") {
        return DeskError::NotFound(format!("{method}: {text}"));
    }
    DeskError::Network(format!("{method}: {text}"))
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, DeskError> {
        let params = json!([
            address.to_string(),
            { "encoding": "base64", "commitment": self.commitment.as_str() },
        ]);
        let response: WithContext<Option<UiAccount>> =
            self.call_required(&self.rpc_url, "getAccountInfo", params).await?;

        response
            .value
            .map(|account| account.decode("getAccountInfo"))
            .transpose()
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, DeskError> {
        let params = json!([{ "commitment": self.commitment.as_str() }]);
        let response: WithContext<BlockhashValue> =
            self.call_required(&self.rpc_url, "getLatestBlockhash", params).await?;
        Ok(response.value.blockhash.parse()?)
    }

    async fn get_minimum_balance_for_rent_exemption(&self, space: u64) -> Result<u64, DeskError> {
        self.call_required(
            &self.rpc_url,
            "getMinimumBalanceForRentExemption",
            json!([space]),
        )
        .await
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        filters: &[AccountFilter],
    ) -> Result<Vec<(Address, AccountInfo)>, DeskError> {
        let filters: Vec<Value> = filters.iter().map(AccountFilter::to_json).collect();
        let params = json!([
            program.to_string(),
            {
                "encoding": "base64",
                "commitment": self.commitment.as_str(),
                "filters": filters,
            },
        ]);
        let accounts: Vec<KeyedAccount> = self
            .call_required(&self.rpc_url, "getProgramAccounts", params)
            .await?;
        accounts
            .into_iter()
            .map(|keyed| {
                let address = keyed.pubkey;
                keyed
                    .account
                    .decode("getProgramAccounts")
                    .map(|info| (address, info))
            })
            .collect()
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, DeskError> {
        let encoded = BASE64.encode(transaction.serialize());
        let params = json!([
            encoded,
            { "encoding": "base64", "preflightCommitment": self.commitment.as_str() },
        ]);
        let signature: String = self
            .call_required(&self.rpc_url, "sendTransaction", params)
            .await?;
        Ok(signature.parse()?)
    }

    async fn confirm_transaction(&self, signature: &Signature) -> Result<(), DeskError> {
        for attempt in 1..=self.max_attempts {
            let params = json!([[signature.to_string()], { "searchTransactionHistory": true }]);
            let response: WithContext<Vec<Option<SignatureStatus>>> = self
                .call_required(&self.rpc_url, "getSignatureStatuses", params)
                .await?;

            if let Some(Some(status)) = response.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(DeskError::TransactionFailed(format!("{signature}: {err}")));
                }
                let reached = status
                    .confirmation_status
                    .as_deref()
                    .is_some_and(|s| self.commitment.is_reached_by(s));
                if reached {
                    debug!(%signature, attempt, "transaction confirmed");
                    return Ok(());
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        warn!(%signature, attempts = self.max_attempts, "confirmation timed out");
        Err(DeskError::Network(format!(
            "{signature} not confirmed after {} attempts",
            self.max_attempts
        )))
    }

    async fn get_asset(&self, id: &Address) -> Result<RawAssetRecord, DeskError> {
        self.call(&self.das_url, "getAsset", json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("asset {id}")))
    }

    async fn get_asset_proof(&self, id: &Address) -> Result<AssetProof, DeskError> {
        let proof: Option<DasProof> = self
            .call(&self.das_url, "getAssetProof", json!({ "id": id.to_string() }))
            .await?;
        proof
            .map(AssetProof::from)
            .ok_or_else(|| DeskError::NotFound(format!("proof for asset {id}")))
    }

    async fn search_assets_by_owner(
        &self,
        owner: &Address,
    ) -> Result<Vec<RawAssetRecord>, DeskError> {
        self.das_paged(
            "searchAssets",
            json!({ "ownerAddress": owner.to_string(), "tokenType": "all" }),
        )
        .await
    }

    async fn get_assets_by_group(
        &self,
        collection: &Address,
    ) -> Result<Vec<RawAssetRecord>, DeskError> {
        self.das_paged(
            "getAssetsByGroup",
            json!({ "groupKey": GROUP_KEY_COLLECTION, "groupValue": collection.to_string() }),
        )
        .await
    }
}
