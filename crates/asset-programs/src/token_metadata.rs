//! Metaplex Token Metadata instructions (`CreateV1`, `MintV1`, `BurnV1`).
//!
//! Used for fungible tokens with metadata and for legacy-standard NFTs. The
//! program's optional accounts are positional: an absent one is replaced by
//! the Token Metadata program ID itself.

use borsh::BorshSerialize;
use sol_wire::{find_program_address, AccountMeta, Address, Instruction, SYSTEM_PROGRAM_ID};

use crate::associated_token::derive_associated_token_address;
use crate::error::ProgramError;
use crate::ids::{ASSOCIATED_TOKEN_PROGRAM_ID, SYSVAR_INSTRUCTIONS_ID, TOKEN_METADATA_PROGRAM_ID};
use crate::spl_token::TokenProgram;

const IX_BURN_V1: u8 = 41;
const IX_CREATE_V1: u8 = 42;
const IX_MINT_V1: u8 = 43;

pub const MAX_NAME_LENGTH: usize = 32;
pub const MAX_SYMBOL_LENGTH: usize = 10;
pub const MAX_URI_LENGTH: usize = 200;
pub const MAX_SELLER_FEE_BASIS_POINTS: u16 = 10_000;

// ---------------------------------------------------------------------------
// Argument types
// ---------------------------------------------------------------------------

#[derive(BorshSerialize, Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    pub address: Address,
    pub verified: bool,
    /// Percentage of royalties, all creators summing to 100.
    pub share: u8,
}

#[derive(BorshSerialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStandard {
    NonFungible,
    FungibleAsset,
    Fungible,
    NonFungibleEdition,
    ProgrammableNonFungible,
}

impl TokenStandard {
    fn has_master_edition(self) -> bool {
        matches!(self, Self::NonFungible | Self::ProgrammableNonFungible)
    }
}

#[derive(BorshSerialize, Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub verified: bool,
    pub key: Address,
}

#[derive(BorshSerialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseMethod {
    Burn,
    Multiple,
    Single,
}

#[derive(BorshSerialize, Debug, Clone, PartialEq, Eq)]
pub struct Uses {
    pub use_method: UseMethod,
    pub remaining: u64,
    pub total: u64,
}

#[derive(BorshSerialize, Debug, Clone, PartialEq, Eq)]
pub enum CollectionDetails {
    V1 { size: u64 },
}

#[derive(BorshSerialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintSupply {
    Zero,
    Limited(u64),
    Unlimited,
}

/// On-chain metadata written by `CreateV1`.
#[derive(BorshSerialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetData {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub creators: Option<Vec<Creator>>,
    pub primary_sale_happened: bool,
    pub is_mutable: bool,
    pub token_standard: TokenStandard,
    pub collection: Option<Collection>,
    pub uses: Option<Uses>,
    pub collection_details: Option<CollectionDetails>,
    pub rule_set: Option<Address>,
}

impl AssetData {
    /// Mutable metadata with no collection, uses or rule set.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        uri: impl Into<String>,
        seller_fee_basis_points: u16,
        token_standard: TokenStandard,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            uri: uri.into(),
            seller_fee_basis_points,
            creators: None,
            primary_sale_happened: false,
            is_mutable: true,
            token_standard,
            collection: None,
            uses: None,
            collection_details: None,
            rule_set: None,
        }
    }

    fn validate(&self) -> Result<(), ProgramError> {
        validate_metadata_strings(&self.name, &self.symbol, &self.uri)?;
        validate_royalty(self.seller_fee_basis_points)
    }
}

/// Length limits enforced by the metadata programs.
pub fn validate_metadata_strings(name: &str, symbol: &str, uri: &str) -> Result<(), ProgramError> {
    let limits = [
        ("name", name.len(), MAX_NAME_LENGTH),
        ("symbol", symbol.len(), MAX_SYMBOL_LENGTH),
        ("uri", uri.len(), MAX_URI_LENGTH),
    ];
    for (field, len, max) in limits {
        if len > max {
            return Err(ProgramError::InvalidArgument(format!(
                "{field} is {len} bytes, max {max}"
            )));
        }
    }
    Ok(())
}

pub fn validate_royalty(seller_fee_basis_points: u16) -> Result<(), ProgramError> {
    if seller_fee_basis_points > MAX_SELLER_FEE_BASIS_POINTS {
        return Err(ProgramError::InvalidArgument(format!(
            "royalty of {seller_fee_basis_points} basis points exceeds {MAX_SELLER_FEE_BASIS_POINTS}"
        )));
    }
    Ok(())
}

#[derive(BorshSerialize)]
enum CreateArgs {
    V1 {
        asset_data: AssetData,
        decimals: Option<u8>,
        print_supply: Option<PrintSupply>,
    },
}

#[derive(BorshSerialize)]
enum MintArgs {
    V1 {
        amount: u64,
        // Authorization data is only used by rule-set protected assets.
        authorization_data: Option<()>,
    },
}

#[derive(BorshSerialize)]
enum BurnArgs {
    V1 { amount: u64 },
}

fn encode<T: BorshSerialize>(index: u8, args: &T) -> Result<Vec<u8>, ProgramError> {
    let mut data = vec![index];
    args.serialize(&mut data)?;
    Ok(data)
}

// ---------------------------------------------------------------------------
// PDAs
// ---------------------------------------------------------------------------

/// Metadata account: `["metadata", program_id, mint]`.
pub fn metadata_pda(mint: &Address) -> Result<Address, ProgramError> {
    let (address, _) = find_program_address(
        &[b"metadata", TOKEN_METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &TOKEN_METADATA_PROGRAM_ID,
    )?;
    Ok(address)
}

/// Master edition account: `["metadata", program_id, mint, "edition"]`.
pub fn master_edition_pda(mint: &Address) -> Result<Address, ProgramError> {
    let (address, _) = find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"edition",
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )?;
    Ok(address)
}

fn optional(account: Option<Address>, writable: bool) -> AccountMeta {
    match account {
        Some(key) if writable => AccountMeta::writable(key, false),
        Some(key) => AccountMeta::readonly(key, false),
        None => AccountMeta::readonly(TOKEN_METADATA_PROGRAM_ID, false),
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// Signers and programs shared by `CreateV1` and `MintV1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintAuthority {
    pub mint: Address,
    pub authority: Address,
    pub payer: Address,
    pub token_program: TokenProgram,
}

/// `CreateV1`: create the mint, its metadata and (for non-fungibles) the
/// master edition. The mint is a fresh keypair and must sign.
pub fn create_v1(
    keys: &MintAuthority,
    asset_data: AssetData,
    decimals: Option<u8>,
    print_supply: Option<PrintSupply>,
) -> Result<Instruction, ProgramError> {
    asset_data.validate()?;

    let master_edition = if asset_data.token_standard.has_master_edition() {
        Some(master_edition_pda(&keys.mint)?)
    } else {
        None
    };

    let data = encode(
        IX_CREATE_V1,
        &CreateArgs::V1 {
            asset_data,
            decimals,
            print_supply,
        },
    )?;

    Ok(Instruction {
        program_id: TOKEN_METADATA_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(metadata_pda(&keys.mint)?, false),
            optional(master_edition, true),
            AccountMeta::writable(keys.mint, true),
            AccountMeta::readonly(keys.authority, true),
            AccountMeta::writable(keys.payer, true),
            AccountMeta::readonly(keys.authority, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(SYSVAR_INSTRUCTIONS_ID, false),
            AccountMeta::readonly(keys.token_program.id(), false),
        ],
        data,
    })
}

/// `MintV1`: mint `amount` base units into `token_owner`'s associated token
/// account, creating it if needed.
pub fn mint_v1(
    keys: &MintAuthority,
    token_owner: &Address,
    amount: u64,
    non_fungible: bool,
) -> Result<Instruction, ProgramError> {
    if amount == 0 {
        return Err(ProgramError::InvalidArgument("mint amount must be > 0".into()));
    }

    let token = derive_associated_token_address(token_owner, &keys.mint, keys.token_program)?;
    let master_edition = if non_fungible {
        Some(master_edition_pda(&keys.mint)?)
    } else {
        None
    };

    let data = encode(
        IX_MINT_V1,
        &MintArgs::V1 {
            amount,
            authorization_data: None,
        },
    )?;

    Ok(Instruction {
        program_id: TOKEN_METADATA_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(token, false),
            AccountMeta::readonly(*token_owner, false),
            AccountMeta::readonly(metadata_pda(&keys.mint)?, false),
            optional(master_edition, true),
            optional(None, true),
            AccountMeta::writable(keys.mint, false),
            AccountMeta::readonly(keys.authority, true),
            optional(None, false),
            AccountMeta::writable(keys.payer, true),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(SYSVAR_INSTRUCTIONS_ID, false),
            AccountMeta::readonly(keys.token_program.id(), false),
            AccountMeta::readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
            optional(None, false),
            optional(None, false),
        ],
        data,
    })
}

/// `BurnV1` for a whole legacy NFT: burns the token, closes the token
/// account and removes metadata and master edition.
///
/// When the NFT is a verified member of a collection, the collection's
/// metadata account must be passed so its size can be decremented.
pub fn burn_nft_v1(
    owner: &Address,
    mint: &Address,
    token_account: &Address,
    collection_mint: Option<&Address>,
    token_program: TokenProgram,
) -> Result<Instruction, ProgramError> {
    let collection_metadata = collection_mint.map(metadata_pda).transpose()?;
    let data = encode(IX_BURN_V1, &BurnArgs::V1 { amount: 1 })?;

    Ok(Instruction {
        program_id: TOKEN_METADATA_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*owner, true),
            optional(collection_metadata, true),
            AccountMeta::writable(metadata_pda(mint)?, false),
            optional(Some(master_edition_pda(mint)?), true),
            AccountMeta::writable(*mint, false),
            AccountMeta::writable(*token_account, false),
            optional(None, false),
            optional(None, false),
            optional(None, false),
            optional(None, false),
            optional(None, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(SYSVAR_INSTRUCTIONS_ID, false),
            AccountMeta::readonly(token_program.id(), false),
        ],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> MintAuthority {
        MintAuthority {
            mint: Address::new([0x10; 32]),
            authority: Address::new([0x20; 32]),
            payer: Address::new([0x20; 32]),
            token_program: TokenProgram::Legacy,
        }
    }

    #[test]
    fn metadata_and_edition_pdas_differ() {
        let mint = Address::new([0x10; 32]);
        assert_ne!(metadata_pda(&mint).unwrap(), master_edition_pda(&mint).unwrap());
    }

    #[test]
    fn create_v1_fungible_has_no_master_edition() {
        let data = AssetData::new("Gold", "GLD", "https://x/meta.json", 0, TokenStandard::Fungible);
        let ix = create_v1(&keys(), data, Some(6), None).unwrap();

        assert_eq!(ix.data[0], 42);
        assert_eq!(ix.data[1], 0, "CreateArgs::V1");
        assert_eq!(ix.accounts[1].pubkey, TOKEN_METADATA_PROGRAM_ID);
        assert!(ix.accounts[2].is_signer, "new mint signs");
    }

    #[test]
    fn create_v1_encodes_asset_data_in_order() {
        let data = AssetData::new("A", "B", "C", 500, TokenStandard::NonFungible);
        let ix = create_v1(&keys(), data, None, Some(PrintSupply::Zero)).unwrap();

        let mut expected = vec![42u8, 0];
        for s in ["A", "B", "C"] {
            expected.extend_from_slice(&1u32.to_le_bytes());
            expected.extend_from_slice(s.as_bytes());
        }
        expected.extend_from_slice(&500u16.to_le_bytes());
        // creators None, primary sale false, mutable true, standard NonFungible
        expected.extend_from_slice(&[0, 0, 1, 0]);
        // collection, uses, collection details, rule set: all None
        expected.extend_from_slice(&[0, 0, 0, 0]);
        // decimals None, print supply Some(Zero)
        expected.extend_from_slice(&[0, 1, 0]);

        assert_eq!(ix.data, expected);
        assert_eq!(ix.accounts[1].pubkey, master_edition_pda(&keys().mint).unwrap());
    }

    #[test]
    fn create_v1_rejects_long_name() {
        let data = AssetData::new("x".repeat(33), "S", "u", 0, TokenStandard::Fungible);
        let err = create_v1(&keys(), data, Some(0), None).unwrap_err();
        assert!(err.to_string().contains("name is 33 bytes"));
    }

    #[test]
    fn royalty_above_100_percent_is_rejected() {
        assert!(validate_royalty(10_000).is_ok());
        assert!(validate_royalty(10_001).is_err());
    }

    #[test]
    fn mint_v1_targets_owner_ata() {
        let owner = Address::new([0x30; 32]);
        let ix = mint_v1(&keys(), &owner, 1_000, false).unwrap();

        assert_eq!(ix.accounts.len(), 15);
        assert_eq!(
            ix.accounts[0].pubkey,
            derive_associated_token_address(&owner, &keys().mint, TokenProgram::Legacy).unwrap()
        );
        let mut expected = vec![43u8, 0];
        expected.extend_from_slice(&1_000u64.to_le_bytes());
        expected.push(0);
        assert_eq!(ix.data, expected);
    }

    #[test]
    fn burn_v1_passes_collection_metadata() {
        let owner = Address::new([0x01; 32]);
        let mint = Address::new([0x02; 32]);
        let token = Address::new([0x03; 32]);
        let collection = Address::new([0x04; 32]);

        let ix = burn_nft_v1(&owner, &mint, &token, Some(&collection), TokenProgram::Legacy)
            .unwrap();
        assert_eq!(ix.accounts.len(), 14);
        assert_eq!(ix.accounts[1].pubkey, metadata_pda(&collection).unwrap());
        assert_eq!(ix.data, [&[41u8, 0][..], &1u64.to_le_bytes()].concat());

        let standalone = burn_nft_v1(&owner, &mint, &token, None, TokenProgram::Legacy).unwrap();
        assert_eq!(standalone.accounts[1].pubkey, TOKEN_METADATA_PROGRAM_ID);
    }
}
