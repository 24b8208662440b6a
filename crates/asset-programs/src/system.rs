//! System Program instructions.

use sol_wire::{AccountMeta, Address, Instruction, SYSTEM_PROGRAM_ID};

/// Build a System Program `CreateAccount` instruction.
///
/// Data: u32 LE index 0, lamports u64 LE, space u64 LE, owner (32 bytes).
/// Both `payer` and `new_account` must sign.
pub fn create_account(
    payer: &Address,
    new_account: &Address,
    lamports: u64,
    space: u64,
    owner: &Address,
) -> Instruction {
    let mut data = Vec::with_capacity(52);
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    data.extend_from_slice(&space.to_le_bytes());
    data.extend_from_slice(owner.as_bytes());

    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(*new_account, true),
        ],
        data,
    }
}
