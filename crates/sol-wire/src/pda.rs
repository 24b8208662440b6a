//! Program Derived Address (PDA) derivation.

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::error::WireError;

/// The string appended to PDA derivation: "ProgramDerivedAddress".
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

const MAX_SEED_LEN: usize = 32;
const MAX_SEEDS: usize = 16;

/// Find a valid Program Derived Address for the given seeds and program.
///
/// Iterates bump seeds from 255 down to 0, computing
/// `SHA-256(seed_0 || seed_1 || ... || bump || program_id || "ProgramDerivedAddress")`
/// and returning the first result that is NOT a valid Ed25519 point.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), WireError> {
    for bump in (0u8..=255).rev() {
        match create_program_address(seeds, &[bump], program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(WireError::InvalidAddress(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(WireError::InvalidAddress(
        "could not find valid PDA bump seed".into(),
    ))
}

/// Create a PDA from seeds + bump + program id.
///
/// Fails with `InvalidAddress` when the hash lands on the curve, and with
/// `TransactionBuildError` when the seeds themselves are malformed.
pub fn create_program_address(
    seeds: &[&[u8]],
    bump_seed: &[u8],
    program_id: &Address,
) -> Result<Address, WireError> {
    if seeds.len() + 1 > MAX_SEEDS {
        return Err(WireError::TransactionBuildError(format!(
            "at most {MAX_SEEDS} seeds allowed, got {}",
            seeds.len() + 1
        )));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(WireError::TransactionBuildError(format!(
            "seed of {} bytes exceeds {MAX_SEED_LEN}",
            seed.len()
        )));
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(bump_seed);
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        return Err(WireError::InvalidAddress("derived address is on curve".into()));
    }

    Ok(Address::new(hash))
}

/// Check if 32 bytes represent a valid Ed25519 curve point.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}
