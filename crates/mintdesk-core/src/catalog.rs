//! Listing a wallet's holdings and a collection's members.

use asset_programs::ids::MPL_CORE_PROGRAM_ID;
use asset_programs::mpl_core::{CollectionV1, COLLECTION_UPDATE_AUTHORITY_OFFSET, KEY_COLLECTION_V1};
use sol_wire::Address;
use tracing::{debug, warn};

use crate::asset::{Asset, CreatedAsset};
use crate::classifier::{classify, classify_in_collection, partition, Classified};
use crate::create::{AssetCreator, NftParams, NftStandard};
use crate::error::DeskError;
use crate::rpc::AccountFilter;
use crate::submit::Session;
use crate::upload::UploadResult;

/// A wallet's assets, split the way the dashboard shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedAssets {
    pub nfts: Vec<Asset>,
    pub tokens: Vec<Asset>,
    pub skipped: usize,
}

/// Result of minting into a collection: the new asset and the collection
/// listing read after confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMint {
    pub created: CreatedAsset,
    pub members: Classified,
}

/// A core collection account and its decoded state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub address: Address,
    pub state: CollectionV1,
}

pub struct AssetCatalog {
    session: Session,
}

impl AssetCatalog {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub async fn owned_assets(&self, owner: &Address) -> Result<OwnedAssets, DeskError> {
        let records = self.session.chain.search_assets_by_owner(owner).await?;
        let classified = partition(&records, None);
        debug!(%owner, kept = classified.assets.len(), skipped = classified.skipped, "owned assets");

        let (nfts, tokens): (Vec<Asset>, Vec<Asset>) = classified
            .assets
            .into_iter()
            .partition(|asset| asset.kind.is_nft());
        Ok(OwnedAssets {
            nfts,
            tokens,
            skipped: classified.skipped,
        })
    }

    pub async fn collection_assets(&self, collection: &Address) -> Result<Classified, DeskError> {
        let records = self.session.chain.get_assets_by_group(collection).await?;
        Ok(partition(&records, Some(collection)))
    }

    /// Core collections whose update authority is `authority`, read straight
    /// from the Core program's accounts. Undecodable accounts are skipped.
    pub async fn collections_by_authority(
        &self,
        authority: &Address,
    ) -> Result<Vec<CollectionSummary>, DeskError> {
        let filters = [
            AccountFilter::memcmp(0, [KEY_COLLECTION_V1]),
            AccountFilter::memcmp(COLLECTION_UPDATE_AUTHORITY_OFFSET, authority.as_ref()),
        ];
        let accounts = self
            .session
            .chain
            .get_program_accounts(&MPL_CORE_PROGRAM_ID, &filters)
            .await?;

        let mut collections = Vec::with_capacity(accounts.len());
        for (address, account) in accounts {
            match CollectionV1::decode(&account.data) {
                Ok(state) => collections.push(CollectionSummary { address, state }),
                Err(e) => warn!(%address, error = %e, "skipping undecodable collection"),
            }
        }
        debug!(%authority, count = collections.len(), "collections");
        Ok(collections)
    }

    /// Look up one asset by id. Grouped records are classified on their
    /// collection's path. Records that do not classify (burnt, a collection,
    /// an unknown interface) are reported as not found.
    pub async fn asset(&self, id: &Address) -> Result<Asset, DeskError> {
        let record = self.session.chain.get_asset(id).await?;
        let grouped = record
            .collection_group()
            .and_then(|value| value.parse::<Address>().ok());
        let asset = match grouped {
            Some(collection) => classify_in_collection(&record, &collection),
            None => classify(&record),
        };
        asset.ok_or_else(|| DeskError::NotFound(format!("asset {id}")))
    }

    /// Create a core NFT inside `collection`, wait for confirmation and
    /// return the refreshed member listing.
    pub async fn mint_into_collection(
        &self,
        collection: &Address,
        name: &str,
        royalty_bps: u16,
        upload: &UploadResult,
    ) -> Result<CollectionMint, DeskError> {
        let params = NftParams {
            name: name.to_string(),
            symbol: String::new(),
            royalty_bps,
            standard: NftStandard::Core {
                collection: Some(*collection),
            },
        };
        let created = AssetCreator::new(self.session.clone())
            .create_nft(&params, upload)
            .await?;

        let members = self.collection_assets(collection).await?;
        if !members.assets.iter().any(|a| a.id == created.address) {
            debug!(asset = %created.address, "new asset not indexed yet");
        }
        Ok(CollectionMint { created, members })
    }
}
