//! MPL Core instructions: single-account assets and collections.
//!
//! Core instructions are a one-byte discriminator followed by borsh args.
//! Optional accounts are positional and replaced by the Core program ID when
//! absent.

use borsh::{BorshDeserialize, BorshSerialize};
use sol_wire::{AccountMeta, Address, Instruction, SYSTEM_PROGRAM_ID};

use crate::error::ProgramError;
use crate::ids::MPL_CORE_PROGRAM_ID;
use crate::token_metadata::validate_metadata_strings;

const IX_CREATE_V1: u8 = 0;
const IX_CREATE_COLLECTION_V1: u8 = 1;
const IX_BURN_V1: u8 = 12;
const IX_TRANSFER_V1: u8 = 14;

/// Account discriminator of a `CollectionV1` account.
pub const KEY_COLLECTION_V1: u8 = 5;
/// Byte offset of the update authority in a `CollectionV1` account.
pub const COLLECTION_UPDATE_AUTHORITY_OFFSET: usize = 1;

/// Where the asset's data lives; only account state is supported on-chain.
#[derive(BorshSerialize, Debug, Clone, Copy, PartialEq, Eq)]
enum DataState {
    AccountState,
}

#[derive(BorshSerialize)]
struct CreateV1Args {
    data_state: DataState,
    name: String,
    uri: String,
    // Plugins are not used by the dashboard.
    plugins: Option<()>,
}

#[derive(BorshSerialize)]
struct CreateCollectionV1Args {
    name: String,
    uri: String,
    plugins: Option<()>,
}

#[derive(BorshSerialize)]
struct BurnV1Args {
    compression_proof: Option<()>,
}

#[derive(BorshSerialize)]
struct TransferV1Args {
    compression_proof: Option<()>,
}

fn encode<T: BorshSerialize>(index: u8, args: &T) -> Result<Vec<u8>, ProgramError> {
    let mut data = vec![index];
    args.serialize(&mut data)?;
    Ok(data)
}

fn optional(account: Option<&Address>, writable: bool, signer: bool) -> AccountMeta {
    match account {
        Some(key) if writable => AccountMeta::writable(*key, signer),
        Some(key) => AccountMeta::readonly(*key, signer),
        None => AccountMeta::readonly(MPL_CORE_PROGRAM_ID, false),
    }
}

/// `CreateV1`: create a core asset owned by `owner`. `asset` is a fresh
/// keypair and signs; `collection` places the asset inside a collection the
/// `authority` controls.
pub fn create_v1(
    asset: &Address,
    collection: Option<&Address>,
    authority: &Address,
    payer: &Address,
    owner: &Address,
    name: &str,
    uri: &str,
) -> Result<Instruction, ProgramError> {
    validate_metadata_strings(name, "", uri)?;

    let data = encode(
        IX_CREATE_V1,
        &CreateV1Args {
            data_state: DataState::AccountState,
            name: name.to_owned(),
            uri: uri.to_owned(),
            plugins: None,
        },
    )?;

    Ok(Instruction {
        program_id: MPL_CORE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*asset, true),
            optional(collection, true, false),
            AccountMeta::readonly(*authority, true),
            AccountMeta::writable(*payer, true),
            AccountMeta::readonly(*owner, false),
            optional(None, false, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            optional(None, false, false),
        ],
        data,
    })
}

/// `CreateCollectionV1`: `collection` is a fresh keypair and signs.
pub fn create_collection_v1(
    collection: &Address,
    update_authority: &Address,
    payer: &Address,
    name: &str,
    uri: &str,
) -> Result<Instruction, ProgramError> {
    validate_metadata_strings(name, "", uri)?;

    let data = encode(
        IX_CREATE_COLLECTION_V1,
        &CreateCollectionV1Args {
            name: name.to_owned(),
            uri: uri.to_owned(),
            plugins: None,
        },
    )?;

    Ok(Instruction {
        program_id: MPL_CORE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*collection, true),
            AccountMeta::readonly(*update_authority, false),
            AccountMeta::writable(*payer, true),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data,
    })
}

/// `BurnV1`. Assets inside a collection must name it so the collection's
/// size is kept in sync.
pub fn burn_v1(
    asset: &Address,
    collection: Option<&Address>,
    owner: &Address,
) -> Result<Instruction, ProgramError> {
    let data = encode(
        IX_BURN_V1,
        &BurnV1Args {
            compression_proof: None,
        },
    )?;

    Ok(Instruction {
        program_id: MPL_CORE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*asset, false),
            optional(collection, true, false),
            AccountMeta::writable(*owner, true),
            optional(None, false, false),
            optional(None, false, false),
            optional(None, false, false),
        ],
        data,
    })
}

/// `TransferV1` to `new_owner`, collection-aware like [`burn_v1`].
pub fn transfer_v1(
    asset: &Address,
    collection: Option<&Address>,
    owner: &Address,
    new_owner: &Address,
) -> Result<Instruction, ProgramError> {
    let data = encode(
        IX_TRANSFER_V1,
        &TransferV1Args {
            compression_proof: None,
        },
    )?;

    Ok(Instruction {
        program_id: MPL_CORE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*asset, false),
            optional(collection, false, false),
            AccountMeta::writable(*owner, true),
            optional(None, false, false),
            AccountMeta::readonly(*new_owner, false),
            optional(None, false, false),
            optional(None, false, false),
        ],
        data,
    })
}

// ---------------------------------------------------------------------------
// Account state
// ---------------------------------------------------------------------------

/// Base `CollectionV1` account data. Plugin data after it is ignored.
#[derive(BorshDeserialize, BorshSerialize, Debug, Clone, PartialEq, Eq)]
pub struct CollectionV1 {
    pub update_authority: Address,
    pub name: String,
    pub uri: String,
    pub num_minted: u32,
    pub current_size: u32,
}

impl CollectionV1 {
    pub fn decode(data: &[u8]) -> Result<Self, ProgramError> {
        match data.split_first() {
            Some((&KEY_COLLECTION_V1, mut rest)) => Ok(Self::deserialize(&mut rest)?),
            Some((key, _)) => Err(ProgramError::InvalidArgument(format!(
                "account key {key} is not a collection"
            ))),
            None => Err(ProgramError::InvalidArgument("empty collection account".into())),
        }
    }
}
