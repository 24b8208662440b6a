//! Creating fungible tokens, NFTs, collections and Merkle trees.

use asset_programs::ids::ACCOUNT_COMPRESSION_PROGRAM_ID;
use asset_programs::token_metadata::{
    self, AssetData, Creator, MintAuthority, PrintSupply, TokenStandard,
};
use asset_programs::{bubblegum, mpl_core, system, TokenProgram};
use serde::Serialize;
use sol_wire::{Address, Instruction, Keypair};
use tracing::info;

use crate::amount::{parse_ui_amount, MAX_DECIMALS};
use crate::asset::CreatedAsset;
use crate::error::DeskError;
use crate::submit::{PhaseObserver, PhaseTracker, Session};
use crate::tree_sizing::{tree_account_size, MerkleTreeConfig};
use crate::upload::UploadResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FungibleParams {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Initial supply in whole tokens, e.g. `"1000000"` or `"12.5"`.
    pub supply: String,
    pub token_program: TokenProgram,
    /// Token-2022 only.
    pub transfer_fee: Option<TransferFee>,
}

/// Token-2022 transfer fee settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferFee {
    /// 1..=10000.
    pub basis_points: u16,
    /// Account that collects withheld fees.
    pub receiver: Option<Address>,
}

pub const MAX_TRANSFER_FEE_BASIS_POINTS: u16 = 10_000;

impl TransferFee {
    pub fn validate(&self, program: TokenProgram) -> Result<(), DeskError> {
        if program != TokenProgram::Token2022 {
            return Err(DeskError::InvalidParams(
                "transfer fees need the Token-2022 program".into(),
            ));
        }
        if self.receiver.is_none() {
            return Err(DeskError::InvalidParams(
                "a fee receiver is required when the transfer fee is enabled".into(),
            ));
        }
        if !(1..=MAX_TRANSFER_FEE_BASIS_POINTS).contains(&self.basis_points) {
            return Err(DeskError::InvalidParams(format!(
                "transfer fee must be between 1 and {MAX_TRANSFER_FEE_BASIS_POINTS} basis points"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NftStandard {
    /// Token Metadata NFT: a mint with supply one plus metadata and a
    /// master edition.
    Legacy { token_program: TokenProgram },
    /// Single-account core asset, optionally inside a core collection.
    Core { collection: Option<Address> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NftParams {
    pub name: String,
    pub symbol: String,
    pub royalty_bps: u16,
    pub standard: NftStandard,
}

/// Creation paths. Each one generates the new account's keypair, signs with
/// it and hands the transaction to the wallet as fee payer.
pub struct AssetCreator {
    session: Session,
    observer: Option<PhaseObserver>,
}

impl AssetCreator {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: PhaseObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Create a fungible mint with metadata and mint the whole supply to the
    /// wallet's token account.
    pub async fn create_fungible(
        &self,
        params: &FungibleParams,
        upload: &UploadResult,
    ) -> Result<CreatedAsset, DeskError> {
        let wallet = self.session.wallet_address()?;
        require_text("name", &params.name)?;
        require_text("symbol", &params.symbol)?;
        if params.decimals > MAX_DECIMALS {
            return Err(DeskError::InvalidParams(format!(
                "decimals must be between 0 and {MAX_DECIMALS}"
            )));
        }
        let supply = parse_ui_amount(&params.supply, params.decimals)?;
        if let Some(fee) = &params.transfer_fee {
            fee.validate(params.token_program)?;
        }

        let mint = Keypair::generate();
        let keys = MintAuthority {
            mint: mint.address(),
            authority: wallet,
            payer: wallet,
            token_program: params.token_program,
        };
        let data = AssetData::new(
            &params.name,
            &params.symbol,
            &upload.metadata_uri,
            0,
            TokenStandard::Fungible,
        );
        let instructions = vec![
            token_metadata::create_v1(&keys, data, Some(params.decimals), None)?,
            token_metadata::mint_v1(&keys, &wallet, supply, false)?,
        ];

        self.run("create token", &instructions, &mint).await
    }

    pub async fn create_nft(
        &self,
        params: &NftParams,
        upload: &UploadResult,
    ) -> Result<CreatedAsset, DeskError> {
        let wallet = self.session.wallet_address()?;
        require_text("name", &params.name)?;
        token_metadata::validate_royalty(params.royalty_bps)?;

        let asset = Keypair::generate();
        let instructions = match params.standard {
            NftStandard::Legacy { token_program } => {
                let keys = MintAuthority {
                    mint: asset.address(),
                    authority: wallet,
                    payer: wallet,
                    token_program,
                };
                let mut data = AssetData::new(
                    &params.name,
                    &params.symbol,
                    &upload.metadata_uri,
                    params.royalty_bps,
                    TokenStandard::NonFungible,
                );
                data.creators = Some(vec![Creator {
                    address: wallet,
                    verified: true,
                    share: 100,
                }]);
                vec![
                    token_metadata::create_v1(&keys, data, Some(0), Some(PrintSupply::Zero))?,
                    token_metadata::mint_v1(&keys, &wallet, 1, true)?,
                ]
            }
            NftStandard::Core { collection } => vec![mpl_core::create_v1(
                &asset.address(),
                collection.as_ref(),
                &wallet,
                &wallet,
                &wallet,
                &params.name,
                &upload.metadata_uri,
            )?],
        };

        self.run("create nft", &instructions, &asset).await
    }

    /// Create a core collection owned and updated by the wallet.
    pub async fn create_collection(
        &self,
        name: &str,
        upload: &UploadResult,
    ) -> Result<CreatedAsset, DeskError> {
        let wallet = self.session.wallet_address()?;
        require_text("name", name)?;

        let collection = Keypair::generate();
        let instruction = mpl_core::create_collection_v1(
            &collection.address(),
            &wallet,
            &wallet,
            name,
            &upload.metadata_uri,
        )?;
        self.run("create collection", &[instruction], &collection)
            .await
    }

    /// Allocate a tree account under the compression program and initialise
    /// it as a public Bubblegum tree.
    pub async fn create_tree(&self, config: MerkleTreeConfig) -> Result<CreatedAsset, DeskError> {
        let wallet = self.session.wallet_address()?;

        let space = tree_account_size(&config);
        let lamports = self
            .session
            .chain
            .get_minimum_balance_for_rent_exemption(space)
            .await?;

        let tree = Keypair::generate();
        let instructions = vec![
            system::create_account(
                &wallet,
                &tree.address(),
                lamports,
                space,
                &ACCOUNT_COMPRESSION_PROGRAM_ID,
            ),
            bubblegum::create_tree(
                &tree.address(),
                &wallet,
                &wallet,
                config.max_depth,
                config.max_buffer_size,
                Some(true),
            )?,
        ];
        info!(
            depth = config.max_depth,
            buffer = config.max_buffer_size,
            space,
            lamports,
            "creating merkle tree"
        );

        self.run("create tree", &instructions, &tree).await
    }

    async fn run(
        &self,
        label: &'static str,
        instructions: &[Instruction],
        new_account: &Keypair,
    ) -> Result<CreatedAsset, DeskError> {
        let mut phases = PhaseTracker::new(label, self.observer.clone());
        let signature = self
            .session
            .execute(instructions, &[new_account], &mut phases)
            .await?;
        let address = new_account.address();
        info!(operation = label, %address, %signature, "created");
        Ok(CreatedAsset { address, signature })
    }
}

fn require_text(field: &str, value: &str) -> Result<(), DeskError> {
    if value.trim().is_empty() {
        return Err(DeskError::InvalidParams(format!("{field} is required")));
    }
    Ok(())
}
