//! The dashboard's view of on-chain assets.

use asset_programs::TokenProgram;
use serde::Serialize;
use sol_wire::{Address, Signature};

/// An asset as the operation layer sees it. The variant of [`AssetKind`]
/// never changes once the asset exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    /// Mint address (fungible, legacy NFT), asset account (core) or asset id
    /// (compressed).
    pub id: Address,
    pub kind: AssetKind,
    /// Program that owns the asset's primary account.
    pub program: Address,
    pub collection: Option<CollectionRef>,
    pub content: AssetContent,
}

/// The four mutually incompatible on-chain representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum AssetKind {
    FungibleToken {
        decimals: u8,
        balance: u64,
    },
    LegacyNft,
    CoreNft {
        owner: Address,
    },
    CompressedNft {
        tree: Address,
        leaf: LeafData,
    },
}

impl AssetKind {
    /// Human-readable label used in errors and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FungibleToken { .. } => "fungible token",
            Self::LegacyNft => "legacy NFT",
            Self::CoreNft { .. } => "core NFT",
            Self::CompressedNft { .. } => "compressed NFT",
        }
    }

    pub fn is_nft(&self) -> bool {
        !matches!(self, Self::FungibleToken { .. })
    }
}

/// Leaf fields of a compressed NFT that do not change when other leaves in
/// the same tree are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafData {
    pub leaf_id: u64,
    #[serde(with = "bytes_b58")]
    pub data_hash: [u8; 32],
    #[serde(with = "bytes_b58")]
    pub creator_hash: [u8; 32],
    pub owner: Address,
    pub delegate: Option<Address>,
}

/// Back-reference to the collection an asset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CollectionRef(pub Address);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetContent {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image_uri: Option<String>,
    pub metadata_uri: Option<String>,
}

/// A per-owner balance record for one mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenAccount {
    pub address: Address,
    pub owner: Address,
    pub mint: Address,
    pub program: TokenProgram,
    pub balance: u64,
}

/// Current inclusion proof of a compressed NFT, as served by the indexer.
/// Valid only until the next write to the same tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetProof {
    pub root: [u8; 32],
    pub proof: Vec<Address>,
    pub leaf: [u8; 32],
    pub node_index: u64,
    pub tree_id: Address,
}

/// Outcome of a mutating operation that reached confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationReceipt {
    pub operation: &'static str,
    pub asset: Address,
    pub signature: Signature,
}

/// Address and transaction of a newly created mint, asset, collection or
/// tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreatedAsset {
    pub address: Address,
    pub signature: Signature,
}

mod bytes_b58 {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&bs58::encode(bytes).into_string())
    }
}
