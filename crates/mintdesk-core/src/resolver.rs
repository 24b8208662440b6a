//! Token program resolution and token account derivation.

use std::sync::Arc;

use asset_programs::associated_token::derive_associated_token_address;
use asset_programs::spl_token::parse_token_account;
use asset_programs::TokenProgram;
use sol_wire::Address;
use tracing::debug;

use crate::asset::TokenAccount;
use crate::error::DeskError;
use crate::rpc::ChainClient;

/// Determines which token program owns a mint and where token accounts
/// live. Nothing is cached: every resolution is one account read.
#[derive(Clone)]
pub struct AddressResolver {
    chain: Arc<dyn ChainClient>,
}

impl AddressResolver {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Read the mint account and map its owner to a token program.
    pub async fn resolve_program_owner(&self, mint: &Address) -> Result<TokenProgram, DeskError> {
        let account = self
            .chain
            .get_account(mint)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("mint {mint}")))?;

        let program = TokenProgram::from_owner(&account.owner).ok_or(
            DeskError::InvalidAccountOwner {
                address: *mint,
                owner: account.owner,
            },
        )?;
        debug!(%mint, ?program, "resolved token program");
        Ok(program)
    }

    /// Associated token account of `owner` for `mint` under `program`.
    /// Pure; no network access.
    pub fn derive_account_address(
        &self,
        mint: &Address,
        owner: &Address,
        program: TokenProgram,
    ) -> Result<Address, DeskError> {
        Ok(derive_associated_token_address(owner, mint, program)?)
    }

    /// Resolve the program, derive `owner`'s token account and read its
    /// balance.
    pub async fn fetch_token_account(
        &self,
        mint: &Address,
        owner: &Address,
    ) -> Result<TokenAccount, DeskError> {
        let program = self.resolve_program_owner(mint).await?;
        let address = self.derive_account_address(mint, owner, program)?;

        let account = self
            .chain
            .get_account(&address)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("token account {address}")))?;
        if account.owner != program.id() {
            return Err(DeskError::InvalidAccountOwner {
                address,
                owner: account.owner,
            });
        }

        let state = parse_token_account(&account.data)?;
        Ok(TokenAccount {
            address,
            owner: state.owner,
            mint: state.mint,
            program,
            balance: state.amount,
        })
    }
}
