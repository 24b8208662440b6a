//! SPL Token and Token-2022 instructions.
//!
//! Both programs share the same instruction layout for the operations used
//! here, so every builder takes the [`TokenProgram`] that owns the mint and
//! emits the instruction under that program's ID.

use serde::{Deserialize, Serialize};
use sol_wire::{AccountMeta, Address, Instruction};

use crate::error::ProgramError;
use crate::ids::{TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// Size of an SPL token account without extensions.
pub const TOKEN_ACCOUNT_LEN: usize = 165;

const IX_CLOSE_ACCOUNT: u8 = 9;
const IX_TRANSFER_CHECKED: u8 = 12;
const IX_APPROVE_CHECKED: u8 = 13;
const IX_BURN_CHECKED: u8 = 15;

/// The token program that owns a mint and all of its token accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenProgram {
    Legacy,
    Token2022,
}

impl TokenProgram {
    pub fn id(self) -> Address {
        match self {
            Self::Legacy => TOKEN_PROGRAM_ID,
            Self::Token2022 => TOKEN_2022_PROGRAM_ID,
        }
    }

    /// Map an account's owning program back to a token program, if it is one.
    pub fn from_owner(owner: &Address) -> Option<Self> {
        if *owner == TOKEN_PROGRAM_ID {
            Some(Self::Legacy)
        } else if *owner == TOKEN_2022_PROGRAM_ID {
            Some(Self::Token2022)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Checked instructions
// ---------------------------------------------------------------------------

fn checked_data(index: u8, amount: u64, decimals: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(10);
    data.push(index);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);
    data
}

fn require_amount(amount: u64, what: &str) -> Result<(), ProgramError> {
    if amount == 0 {
        return Err(ProgramError::InvalidArgument(format!(
            "{what} amount must be > 0"
        )));
    }
    Ok(())
}

/// `BurnChecked`: destroy `amount` base units from `account`.
///
/// Accounts: account (w), mint (w), owner (s).
pub fn burn_checked(
    program: TokenProgram,
    account: &Address,
    mint: &Address,
    owner: &Address,
    amount: u64,
    decimals: u8,
) -> Result<Instruction, ProgramError> {
    require_amount(amount, "burn")?;

    Ok(Instruction {
        program_id: program.id(),
        accounts: vec![
            AccountMeta::writable(*account, false),
            AccountMeta::writable(*mint, false),
            AccountMeta::readonly(*owner, true),
        ],
        data: checked_data(IX_BURN_CHECKED, amount, decimals),
    })
}

/// `TransferChecked`: move `amount` base units between two token accounts.
///
/// Accounts: source (w), mint, destination (w), owner (s).
pub fn transfer_checked(
    program: TokenProgram,
    source: &Address,
    mint: &Address,
    destination: &Address,
    owner: &Address,
    amount: u64,
    decimals: u8,
) -> Result<Instruction, ProgramError> {
    require_amount(amount, "transfer")?;

    Ok(Instruction {
        program_id: program.id(),
        accounts: vec![
            AccountMeta::writable(*source, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*owner, true),
        ],
        data: checked_data(IX_TRANSFER_CHECKED, amount, decimals),
    })
}

/// `ApproveChecked`: let `delegate` spend up to `amount` from `source`.
///
/// Accounts: source (w), mint, delegate, owner (s).
pub fn approve_checked(
    program: TokenProgram,
    source: &Address,
    mint: &Address,
    delegate: &Address,
    owner: &Address,
    amount: u64,
    decimals: u8,
) -> Result<Instruction, ProgramError> {
    require_amount(amount, "delegate")?;

    Ok(Instruction {
        program_id: program.id(),
        accounts: vec![
            AccountMeta::writable(*source, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::readonly(*delegate, false),
            AccountMeta::readonly(*owner, true),
        ],
        data: checked_data(IX_APPROVE_CHECKED, amount, decimals),
    })
}

/// `CloseAccount`: reclaim the rent of an empty token account.
///
/// Accounts: account (w), destination (w), owner (s).
pub fn close_account(
    program: TokenProgram,
    account: &Address,
    destination: &Address,
    owner: &Address,
) -> Instruction {
    Instruction {
        program_id: program.id(),
        accounts: vec![
            AccountMeta::writable(*account, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*owner, true),
        ],
        data: vec![IX_CLOSE_ACCOUNT],
    }
}

// ---------------------------------------------------------------------------
// Account layout
// ---------------------------------------------------------------------------

/// The leading fields of an SPL token account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountState {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
}

/// Parse the base token-account layout: mint `0..32`, owner `32..64`,
/// amount `64..72`. Token-2022 accounts carry extensions after byte 165,
/// which are ignored.
pub fn parse_token_account(data: &[u8]) -> Result<TokenAccountState, ProgramError> {
    if data.len() < TOKEN_ACCOUNT_LEN {
        return Err(ProgramError::InvalidArgument(format!(
            "token account data is {} bytes, expected at least {TOKEN_ACCOUNT_LEN}",
            data.len()
        )));
    }

    let mut mint = [0u8; 32];
    mint.copy_from_slice(&data[0..32]);
    let mut owner = [0u8; 32];
    owner.copy_from_slice(&data[32..64]);
    let mut amount = [0u8; 8];
    amount.copy_from_slice(&data[64..72]);

    Ok(TokenAccountState {
        mint: Address::new(mint),
        owner: Address::new(owner),
        amount: u64::from_le_bytes(amount),
    })
}
