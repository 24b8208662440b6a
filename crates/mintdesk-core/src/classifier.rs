//! Classification of indexer (DAS) asset records into [`Asset`]s.
//!
//! Rule order matters: burnt and collection records are removed first, and
//! compression is checked before the plain NFT interfaces, because a
//! compressed or collection-grouped record would otherwise pass for a
//! standalone NFT.

use asset_programs::ids::{BUBBLEGUM_PROGRAM_ID, MPL_CORE_PROGRAM_ID, TOKEN_PROGRAM_ID};
use serde::{Deserialize, Serialize};
use sol_wire::Address;
use tracing::debug;

use crate::asset::{Asset, AssetContent, AssetKind, CollectionRef, LeafData};

pub const INTERFACE_CORE_ASSET: &str = "MplCoreAsset";
pub const INTERFACE_CORE_COLLECTION: &str = "MplCoreCollection";
const FUNGIBLE_INTERFACES: &[&str] = &["FungibleToken", "FungibleAsset"];
/// Programmable NFTs are not listed: their token accounts stay frozen and
/// need token-record aware instructions.
const LEGACY_NFT_INTERFACES: &[&str] = &["V1_NFT", "V2_NFT", "LEGACY_NFT"];

pub const GROUP_KEY_COLLECTION: &str = "collection";

// ---------------------------------------------------------------------------
// Raw indexer records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAssetRecord {
    pub id: Address,
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub burnt: bool,
    #[serde(default)]
    pub compression: Option<RawCompression>,
    #[serde(default)]
    pub grouping: Vec<RawGrouping>,
    #[serde(default)]
    pub ownership: Option<RawOwnership>,
    #[serde(default)]
    pub content: Option<RawContent>,
    #[serde(default)]
    pub token_info: Option<RawTokenInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCompression {
    #[serde(default)]
    pub compressed: bool,
    /// Base58; empty for uncompressed assets.
    #[serde(default)]
    pub tree: String,
    #[serde(default)]
    pub data_hash: String,
    #[serde(default)]
    pub creator_hash: String,
    #[serde(default)]
    pub leaf_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGrouping {
    pub group_key: String,
    pub group_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOwnership {
    pub owner: Address,
    #[serde(default)]
    pub delegate: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContent {
    #[serde(default)]
    pub json_uri: String,
    #[serde(default)]
    pub metadata: RawMetadata,
    #[serde(default)]
    pub links: RawLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLinks {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTokenInfo {
    #[serde(default)]
    pub balance: u64,
    #[serde(default)]
    pub decimals: u8,
    #[serde(default)]
    pub token_program: Option<Address>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl RawAssetRecord {
    /// Value of the first `collection` grouping, parsed or not.
    pub fn collection_group(&self) -> Option<&str> {
        self.grouping
            .iter()
            .find(|g| g.group_key == GROUP_KEY_COLLECTION)
            .map(|g| g.group_value.as_str())
    }

    fn collection(&self) -> Option<Address> {
        self.collection_group().and_then(|v| v.parse().ok())
    }

    fn is_compressed(&self) -> bool {
        self.compression.as_ref().is_some_and(|c| c.compressed)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Records sorted into assets, plus how many were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub assets: Vec<Asset>,
    pub skipped: usize,
}

/// Classify a record for a standalone listing (e.g. a wallet's holdings).
///
/// Returns `None` for burnt assets, collection records, collection-grouped
/// core assets and any interface the dashboard does not handle.
pub fn classify(record: &RawAssetRecord) -> Option<Asset> {
    classify_with(record, None)
}

/// Classify a record fetched through a collection listing. Same rules as
/// [`classify`], except core assets grouped under `collection` are admitted.
pub fn classify_in_collection(record: &RawAssetRecord, collection: &Address) -> Option<Asset> {
    classify_with(record, Some(collection))
}

/// Classify many records at once, counting the ones dropped.
pub fn partition<'a>(
    records: impl IntoIterator<Item = &'a RawAssetRecord>,
    collection: Option<&Address>,
) -> Classified {
    let mut out = Classified::default();
    for record in records {
        match classify_with(record, collection) {
            Some(asset) => out.assets.push(asset),
            None => out.skipped += 1,
        }
    }
    out
}

fn classify_with(record: &RawAssetRecord, collection_path: Option<&Address>) -> Option<Asset> {
    let interface = record.interface.as_str();
    let collection = record.collection();

    if record.burnt {
        debug!(id = %record.id, "skipping burnt asset");
        return None;
    }
    if interface == INTERFACE_CORE_COLLECTION {
        debug!(id = %record.id, "skipping collection record");
        return None;
    }

    let kind = if record.is_compressed() && LEGACY_NFT_INTERFACES.contains(&interface) {
        compressed_kind(record)?
    } else if FUNGIBLE_INTERFACES.contains(&interface) {
        let info = record.token_info.clone().unwrap_or_default();
        AssetKind::FungibleToken {
            decimals: info.decimals,
            balance: info.balance,
        }
    } else if interface == INTERFACE_CORE_ASSET {
        let admitted = match (record.collection_group(), collection_path) {
            (None, _) => true,
            (Some(_), Some(path)) => collection == Some(*path),
            (Some(_), None) => false,
        };
        if !admitted {
            debug!(id = %record.id, "skipping collection-grouped core asset");
            return None;
        }
        AssetKind::CoreNft {
            owner: record.ownership.as_ref()?.owner,
        }
    } else if LEGACY_NFT_INTERFACES.contains(&interface) {
        AssetKind::LegacyNft
    } else {
        debug!(id = %record.id, interface, "skipping unrecognised interface");
        return None;
    };

    let program = match &kind {
        AssetKind::CompressedNft { .. } => BUBBLEGUM_PROGRAM_ID,
        AssetKind::CoreNft { .. } => MPL_CORE_PROGRAM_ID,
        AssetKind::FungibleToken { .. } | AssetKind::LegacyNft => record
            .token_info
            .as_ref()
            .and_then(|t| t.token_program)
            .unwrap_or(TOKEN_PROGRAM_ID),
    };

    Some(Asset {
        id: record.id,
        kind,
        program,
        collection: collection.map(CollectionRef),
        content: content_of(record),
    })
}

fn compressed_kind(record: &RawAssetRecord) -> Option<AssetKind> {
    let compression = record.compression.as_ref()?;
    let ownership = record.ownership.as_ref()?;

    let parsed = (|| {
        let tree: Address = compression.tree.parse().ok()?;
        let data_hash = decode_hash(&compression.data_hash)?;
        let creator_hash = decode_hash(&compression.creator_hash)?;
        Some((tree, data_hash, creator_hash))
    })();

    let Some((tree, data_hash, creator_hash)) = parsed else {
        debug!(id = %record.id, "skipping compressed asset with malformed leaf data");
        return None;
    };

    Some(AssetKind::CompressedNft {
        tree,
        leaf: LeafData {
            leaf_id: compression.leaf_id,
            data_hash,
            creator_hash,
            owner: ownership.owner,
            delegate: ownership.delegate.filter(|d| *d != ownership.owner),
        },
    })
}

fn decode_hash(s: &str) -> Option<[u8; 32]> {
    s.trim().parse::<Address>().ok().map(Address::to_bytes)
}

fn content_of(record: &RawAssetRecord) -> AssetContent {
    let Some(content) = &record.content else {
        return AssetContent {
            symbol: record
                .token_info
                .as_ref()
                .and_then(|t| t.symbol.clone())
                .unwrap_or_default(),
            ..AssetContent::default()
        };
    };

    let symbol = if content.metadata.symbol.is_empty() {
        record
            .token_info
            .as_ref()
            .and_then(|t| t.symbol.clone())
            .unwrap_or_default()
    } else {
        content.metadata.symbol.clone()
    };

    AssetContent {
        name: content.metadata.name.clone(),
        symbol,
        description: content.metadata.description.clone(),
        image_uri: content.links.image.clone().filter(|s| !s.is_empty()),
        metadata_uri: Some(content.json_uri.clone()).filter(|s| !s.is_empty()),
    }
}
