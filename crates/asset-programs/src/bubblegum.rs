//! Bubblegum instructions for compressed NFTs.
//!
//! Bubblegum is an Anchor program: every instruction starts with the first
//! eight bytes of `sha256("global:<name>")`. Leaves live in an SPL
//! concurrent Merkle tree, so burn and transfer carry the current root and
//! the leaf's proof path as trailing read-only accounts.

use borsh::BorshSerialize;
use sol_wire::{find_program_address, AccountMeta, Address, Instruction, SYSTEM_PROGRAM_ID};

use crate::error::ProgramError;
use crate::ids::{ACCOUNT_COMPRESSION_PROGRAM_ID, BUBBLEGUM_PROGRAM_ID, NOOP_PROGRAM_ID};
use crate::token_metadata::{
    validate_metadata_strings, validate_royalty, Collection, Creator, TokenStandard, Uses,
};

const BURN_DISCRIMINATOR: [u8; 8] = [116, 110, 29, 56, 107, 219, 42, 93];
const TRANSFER_DISCRIMINATOR: [u8; 8] = [163, 52, 200, 231, 140, 3, 69, 186];
const CREATE_TREE_DISCRIMINATOR: [u8; 8] = [165, 83, 136, 142, 89, 202, 47, 220];
const MINT_V1_DISCRIMINATOR: [u8; 8] = [145, 98, 192, 118, 184, 147, 118, 104];

/// Size of the concurrent Merkle tree account header.
const TREE_HEADER_SIZE: u64 = 56;

/// Byte size of a concurrent Merkle tree account.
///
/// Layout after the header: sequence number, active index and buffer size
/// (8 bytes each), `buffer` change logs of `32 * depth + 40` bytes, the
/// rightmost path (same size as a change log), then the canopy.
pub fn merkle_tree_account_size(max_depth: u32, max_buffer_size: u32, canopy_depth: u32) -> u64 {
    let path = 32 * max_depth as u64 + 40;
    let canopy = ((1u64 << (canopy_depth + 1)) - 2) * 32;
    TREE_HEADER_SIZE + 24 + (max_buffer_size as u64 + 1) * path + canopy
}

/// Tree config PDA: `[merkle_tree]` under Bubblegum.
pub fn tree_authority_pda(merkle_tree: &Address) -> Result<Address, ProgramError> {
    let (address, _) = find_program_address(&[merkle_tree.as_ref()], &BUBBLEGUM_PROGRAM_ID)?;
    Ok(address)
}

// ---------------------------------------------------------------------------
// Argument types
// ---------------------------------------------------------------------------

#[derive(BorshSerialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenProgramVersion {
    Original,
    Token2022,
}

/// Leaf metadata hashed into the tree by `mint_v1`.
#[derive(BorshSerialize, Debug, Clone, PartialEq, Eq)]
pub struct MetadataArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub primary_sale_happened: bool,
    pub is_mutable: bool,
    pub edition_nonce: Option<u8>,
    pub token_standard: Option<TokenStandard>,
    pub collection: Option<Collection>,
    pub uses: Option<Uses>,
    pub token_program_version: TokenProgramVersion,
    pub creators: Vec<Creator>,
}

impl MetadataArgs {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        uri: impl Into<String>,
        seller_fee_basis_points: u16,
        creators: Vec<Creator>,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            uri: uri.into(),
            seller_fee_basis_points,
            primary_sale_happened: false,
            is_mutable: true,
            edition_nonce: None,
            token_standard: Some(TokenStandard::NonFungible),
            collection: None,
            uses: None,
            token_program_version: TokenProgramVersion::Original,
            creators,
        }
    }
}

/// Everything needed to prove a leaf against the current tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafProof {
    pub root: [u8; 32],
    pub data_hash: [u8; 32],
    pub creator_hash: [u8; 32],
    pub nonce: u64,
    pub index: u32,
    /// Sibling nodes from the leaf upwards.
    pub proof: Vec<Address>,
}

#[derive(BorshSerialize)]
struct LeafArgs {
    root: [u8; 32],
    data_hash: [u8; 32],
    creator_hash: [u8; 32],
    nonce: u64,
    index: u32,
}

impl From<&LeafProof> for LeafArgs {
    fn from(p: &LeafProof) -> Self {
        Self {
            root: p.root,
            data_hash: p.data_hash,
            creator_hash: p.creator_hash,
            nonce: p.nonce,
            index: p.index,
        }
    }
}

#[derive(BorshSerialize)]
struct CreateTreeArgs {
    max_depth: u32,
    max_buffer_size: u32,
    public: Option<bool>,
}

fn encode<T: BorshSerialize>(discriminator: [u8; 8], args: &T) -> Result<Vec<u8>, ProgramError> {
    let mut data = discriminator.to_vec();
    args.serialize(&mut data)?;
    Ok(data)
}

fn proof_accounts(proof: &LeafProof) -> impl Iterator<Item = AccountMeta> + '_ {
    proof
        .proof
        .iter()
        .map(|node| AccountMeta::readonly(*node, false))
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// `create_tree`: initialize the tree config for a freshly allocated tree
/// account. Must follow a System `create_account` of
/// [`merkle_tree_account_size`] bytes owned by the compression program.
pub fn create_tree(
    merkle_tree: &Address,
    payer: &Address,
    tree_creator: &Address,
    max_depth: u32,
    max_buffer_size: u32,
    public: Option<bool>,
) -> Result<Instruction, ProgramError> {
    let data = encode(
        CREATE_TREE_DISCRIMINATOR,
        &CreateTreeArgs {
            max_depth,
            max_buffer_size,
            public,
        },
    )?;

    Ok(Instruction {
        program_id: BUBBLEGUM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(tree_authority_pda(merkle_tree)?, false),
            AccountMeta::writable(*merkle_tree, false),
            AccountMeta::writable(*payer, true),
            AccountMeta::readonly(*tree_creator, true),
            AccountMeta::readonly(NOOP_PROGRAM_ID, false),
            AccountMeta::readonly(ACCOUNT_COMPRESSION_PROGRAM_ID, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data,
    })
}

/// `mint_v1`: append one compressed NFT leaf for `leaf_owner`.
pub fn mint_v1(
    merkle_tree: &Address,
    leaf_owner: &Address,
    payer: &Address,
    tree_delegate: &Address,
    metadata: &MetadataArgs,
) -> Result<Instruction, ProgramError> {
    validate_metadata_strings(&metadata.name, &metadata.symbol, &metadata.uri)?;
    validate_royalty(metadata.seller_fee_basis_points)?;

    let share_total: u32 = metadata.creators.iter().map(|c| c.share as u32).sum();
    if !metadata.creators.is_empty() && share_total != 100 {
        return Err(ProgramError::InvalidArgument(format!(
            "creator shares sum to {share_total}, expected 100"
        )));
    }

    let data = encode(MINT_V1_DISCRIMINATOR, metadata)?;

    Ok(Instruction {
        program_id: BUBBLEGUM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(tree_authority_pda(merkle_tree)?, false),
            AccountMeta::readonly(*leaf_owner, false),
            AccountMeta::readonly(*leaf_owner, false),
            AccountMeta::writable(*merkle_tree, false),
            AccountMeta::writable(*payer, true),
            AccountMeta::readonly(*tree_delegate, true),
            AccountMeta::readonly(NOOP_PROGRAM_ID, false),
            AccountMeta::readonly(ACCOUNT_COMPRESSION_PROGRAM_ID, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data,
    })
}

/// `burn`: remove the leaf described by `proof`. The owner signs.
pub fn burn(
    merkle_tree: &Address,
    leaf_owner: &Address,
    leaf_delegate: &Address,
    proof: &LeafProof,
) -> Result<Instruction, ProgramError> {
    let data = encode(BURN_DISCRIMINATOR, &LeafArgs::from(proof))?;

    let mut accounts = vec![
        AccountMeta::readonly(tree_authority_pda(merkle_tree)?, false),
        AccountMeta::readonly(*leaf_owner, true),
        AccountMeta::readonly(*leaf_delegate, false),
        AccountMeta::writable(*merkle_tree, false),
        AccountMeta::readonly(NOOP_PROGRAM_ID, false),
        AccountMeta::readonly(ACCOUNT_COMPRESSION_PROGRAM_ID, false),
        AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
    ];
    accounts.extend(proof_accounts(proof));

    Ok(Instruction {
        program_id: BUBBLEGUM_PROGRAM_ID,
        accounts,
        data,
    })
}

/// `transfer`: move the leaf described by `proof` to `new_leaf_owner`.
pub fn transfer(
    merkle_tree: &Address,
    leaf_owner: &Address,
    leaf_delegate: &Address,
    new_leaf_owner: &Address,
    proof: &LeafProof,
) -> Result<Instruction, ProgramError> {
    let data = encode(TRANSFER_DISCRIMINATOR, &LeafArgs::from(proof))?;

    let mut accounts = vec![
        AccountMeta::readonly(tree_authority_pda(merkle_tree)?, false),
        AccountMeta::readonly(*leaf_owner, true),
        AccountMeta::readonly(*leaf_delegate, false),
        AccountMeta::readonly(*new_leaf_owner, false),
        AccountMeta::writable(*merkle_tree, false),
        AccountMeta::readonly(NOOP_PROGRAM_ID, false),
        AccountMeta::readonly(ACCOUNT_COMPRESSION_PROGRAM_ID, false),
        AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
    ];
    accounts.extend(proof_accounts(proof));

    Ok(Instruction {
        program_id: BUBBLEGUM_PROGRAM_ID,
        accounts,
        data,
    })
}
