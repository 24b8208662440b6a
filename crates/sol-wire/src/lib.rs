//! Solana wire primitives for the mintdesk workspace.
//!
//! Addresses, program-derived addresses, Ed25519 keypairs and the compact
//! binary transaction format, implemented by hand on top of `ed25519-dalek`,
//! `curve25519-dalek` and `bs58` instead of `solana-sdk`.

pub mod address;
pub mod error;
pub mod keypair;
pub mod pda;
pub mod transaction;

pub use address::Address;
pub use error::WireError;
pub use keypair::{Keypair, Signature};
pub use pda::{create_program_address, find_program_address, is_on_curve};
pub use transaction::{
    decode_compact_u16, encode_compact_u16, AccountMeta, CompiledInstruction, Hash, Instruction,
    Message, Transaction, SYSTEM_PROGRAM_ID,
};
