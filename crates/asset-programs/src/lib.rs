//! Instruction encoders for the on-chain programs the dashboard talks to.
//!
//! Each module builds [`sol_wire::Instruction`]s by hand: SPL Token and
//! Token-2022, the Associated Token Account program, the System program,
//! Metaplex Token Metadata, MPL Core and Bubblegum. Instruction arguments
//! are encoded with `borsh`, matching the programs' own layouts.

pub mod associated_token;
pub mod bubblegum;
pub mod error;
pub mod ids;
pub mod mpl_core;
pub mod spl_token;
pub mod system;
pub mod token_metadata;

pub use error::ProgramError;
pub use spl_token::TokenProgram;
