//! Associated Token Account (ATA) derivation and creation.

use sol_wire::{find_program_address, AccountMeta, Address, Instruction, SYSTEM_PROGRAM_ID};

use crate::error::ProgramError;
use crate::ids::ASSOCIATED_TOKEN_PROGRAM_ID;
use crate::spl_token::TokenProgram;

const IX_CREATE_IDEMPOTENT: u8 = 1;

/// Derive the associated token account for a wallet + mint pair.
///
/// Seeds: `[wallet, token_program_id, mint]` under the ATA program. The
/// token program is part of the seeds, so legacy and Token-2022 accounts for
/// the same wallet and mint live at different addresses.
pub fn derive_associated_token_address(
    wallet: &Address,
    mint: &Address,
    program: TokenProgram,
) -> Result<Address, ProgramError> {
    let token_program = program.id();
    let (address, _bump) = find_program_address(
        &[wallet.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )?;
    Ok(address)
}

/// `CreateIdempotent`: create the ATA, succeeding if it already exists.
///
/// Accounts: payer (s, w), ata (w), wallet, mint, system program, token
/// program.
pub fn create_idempotent(
    payer: &Address,
    wallet: &Address,
    mint: &Address,
    program: TokenProgram,
) -> Result<Instruction, ProgramError> {
    let ata = derive_associated_token_address(wallet, mint, program)?;

    Ok(Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(ata, false),
            AccountMeta::readonly(*wallet, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(program.id(), false),
        ],
        data: vec![IX_CREATE_IDEMPOTENT],
    })
}
