//! Solana legacy transaction wire format and multi-signer signing.
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```

use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::error::WireError;
use crate::keypair::{Keypair, Signature};

/// The System Program: 32 zero bytes, `11111111111111111111111111111111`.
pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

/// Message account keys are addressed by a u8 index.
const MAX_ACCOUNT_KEYS: usize = 256;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value from a byte slice.
///
/// Returns `(value, bytes_consumed)` or an error if the data is truncated.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), WireError> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            WireError::SerializationError(
                "unexpected end of data while decoding compact-u16".into(),
            )
        })?;
        consumed += 1;

        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;

        if byte & 0x80 == 0 || consumed >= 3 {
            break;
        }
    }

    if value > u16::MAX as u32 {
        return Err(WireError::SerializationError(
            "compact-u16 value overflow".into(),
        ));
    }

    Ok((value as u16, consumed))
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A 32-byte hash, in practice a recent blockhash.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address: Address = s
            .parse()
            .map_err(|e| WireError::SerializationError(format!("invalid hash: {e}")))?;
        Ok(Self(address.to_bytes()))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

/// A single account reference in an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// An instruction before it is compiled into a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled instruction where account references are replaced by u8
/// indices into the message's `account_keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// A compiled legacy message: the bytes every signer signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// All account keys, in canonical order:
    ///   1. writable signers (fee payer first)
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<Address>,
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions into a message with a single fee payer at index 0.
    pub fn compile(
        instructions: &[Instruction],
        fee_payer: &Address,
        recent_blockhash: Hash,
    ) -> Result<Self, WireError> {
        if instructions.is_empty() {
            return Err(WireError::TransactionBuildError(
                "a transaction needs at least one instruction".into(),
            ));
        }

        struct AccountEntry {
            pubkey: Address,
            is_signer: bool,
            is_writable: bool,
        }

        let mut entries: Vec<AccountEntry> = Vec::new();

        let mut upsert = |pubkey: Address, signer: bool, writable: bool| {
            if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
                entry.is_signer |= signer;
                entry.is_writable |= writable;
            } else {
                entries.push(AccountEntry {
                    pubkey,
                    is_signer: signer,
                    is_writable: writable,
                });
            }
        };

        upsert(*fee_payer, true, true);

        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        if entries.len() > MAX_ACCOUNT_KEYS {
            return Err(WireError::TransactionBuildError(format!(
                "{} accounts exceed the {MAX_ACCOUNT_KEYS} key limit",
                entries.len()
            )));
        }

        // Stable sort: insertion order is kept within a category, so the fee
        // payer stays at index 0.
        entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
            (true, true) => 0u8,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        });

        let num_signers = entries.iter().filter(|e| e.is_signer).count() as u8;
        let num_readonly_signed = entries
            .iter()
            .filter(|e| e.is_signer && !e.is_writable)
            .count() as u8;
        let num_readonly_unsigned = entries
            .iter()
            .filter(|e| !e.is_signer && !e.is_writable)
            .count() as u8;

        let account_keys: Vec<Address> = entries.iter().map(|e| e.pubkey).collect();

        let index_of = |key: &Address| -> Result<u8, WireError> {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or_else(|| {
                    WireError::TransactionBuildError(format!("{key} not in account keys"))
                })
        };

        let mut compiled = Vec::with_capacity(instructions.len());
        for ix in instructions {
            let program_id_index = index_of(&ix.program_id)?;
            let account_indices = ix
                .accounts
                .iter()
                .map(|meta| index_of(&meta.pubkey))
                .collect::<Result<Vec<u8>, _>>()?;

            compiled.push(CompiledInstruction {
                program_id_index,
                account_indices,
                data: ix.data.clone(),
            });
        }

        Ok(Self {
            account_keys,
            num_required_signatures: num_signers,
            num_readonly_signed,
            num_readonly_unsigned,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// The accounts whose signatures this message requires, in slot order.
    pub fn signer_keys(&self) -> &[Address] {
        let n = (self.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn fee_payer(&self) -> Option<&Address> {
        self.account_keys.first()
    }

    /// Program id of the compiled instruction at `index`.
    pub fn program_id(&self, index: usize) -> Option<&Address> {
        let ix = self.instructions.get(index)?;
        self.account_keys.get(ix.program_id_index as usize)
    }

    /// Serialize the message (the bytes that get signed).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        buf.push(self.num_required_signatures);
        buf.push(self.num_readonly_signed);
        buf.push(self.num_readonly_unsigned);

        buf.extend_from_slice(&encode_compact_u16(self.account_keys.len() as u16));
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }

        buf.extend_from_slice(self.recent_blockhash.as_bytes());

        buf.extend_from_slice(&encode_compact_u16(self.instructions.len() as u16));
        for ix in &self.instructions {
            buf.push(ix.program_id_index);

            buf.extend_from_slice(&encode_compact_u16(ix.account_indices.len() as u16));
            buf.extend_from_slice(&ix.account_indices);

            buf.extend_from_slice(&encode_compact_u16(ix.data.len() as u16));
            buf.extend_from_slice(&ix.data);
        }

        buf
    }

    /// Parse a serialized message. Returns the message and the number of
    /// bytes consumed.
    pub fn deserialize(data: &[u8]) -> Result<(Self, usize), WireError> {
        let mut reader = Reader::new(data);

        let num_required_signatures = reader.u8()?;
        let num_readonly_signed = reader.u8()?;
        let num_readonly_unsigned = reader.u8()?;

        let num_accounts = reader.compact_u16()?;
        let mut account_keys = Vec::with_capacity(num_accounts as usize);
        for _ in 0..num_accounts {
            account_keys.push(Address::new(reader.array32()?));
        }

        let recent_blockhash = Hash::new(reader.array32()?);

        let num_instructions = reader.compact_u16()?;
        let mut instructions = Vec::with_capacity(num_instructions as usize);
        for _ in 0..num_instructions {
            let program_id_index = reader.u8()?;
            let n = reader.compact_u16()? as usize;
            let account_indices = reader.bytes(n)?.to_vec();
            let len = reader.compact_u16()? as usize;
            let data = reader.bytes(len)?.to_vec();

            let out_of_range = std::iter::once(&program_id_index)
                .chain(account_indices.iter())
                .any(|i| *i as usize >= account_keys.len());
            if out_of_range {
                return Err(WireError::SerializationError(
                    "instruction references an unknown account index".into(),
                ));
            }

            instructions.push(CompiledInstruction {
                program_id_index,
                account_indices,
                data,
            });
        }

        Ok((
            Self {
                account_keys,
                num_required_signatures,
                num_readonly_signed,
                num_readonly_unsigned,
                recent_blockhash,
                instructions,
            },
            reader.pos,
        ))
    }
}

/// A message plus one signature slot per required signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// A transaction with every signature slot still empty.
    pub fn new_unsigned(message: Message) -> Self {
        let slots = message.num_required_signatures as usize;
        Self {
            signatures: vec![Signature::default(); slots],
            message,
        }
    }

    /// Sign the message with `keypair` and place the signature in its slot.
    ///
    /// Fails if the keypair is not one of the message's required signers.
    pub fn partial_sign(&mut self, keypair: &Keypair) -> Result<(), WireError> {
        let signature = keypair.sign_message(&self.message.serialize());
        self.add_signature(&keypair.address(), signature)
    }

    /// Place an externally produced signature (e.g. from a wallet) in the slot
    /// belonging to `signer`.
    pub fn add_signature(&mut self, signer: &Address, signature: Signature) -> Result<(), WireError> {
        let slot = self
            .message
            .signer_keys()
            .iter()
            .position(|k| k == signer)
            .ok_or_else(|| {
                WireError::SigningError(format!("{signer} not found in transaction signers"))
            })?;

        self.signatures[slot] = signature;
        Ok(())
    }

    /// Signers whose slot is still empty.
    pub fn missing_signers(&self) -> Vec<Address> {
        self.message
            .signer_keys()
            .iter()
            .zip(&self.signatures)
            .filter(|(_, sig)| sig.is_placeholder())
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.missing_signers().is_empty()
    }

    /// Check every signature against its signer and the message bytes.
    pub fn verify(&self) -> bool {
        let message = self.message.serialize();
        self.signatures.len() == self.message.signer_keys().len()
            && self
                .message
                .signer_keys()
                .iter()
                .zip(&self.signatures)
                .all(|(key, sig)| sig.verify(key, &message))
    }

    /// The transaction id: its first (fee payer) signature.
    pub fn id(&self) -> Option<Signature> {
        self.signatures.first().copied()
    }

    /// Serialize into the wire format accepted by `sendTransaction`.
    pub fn serialize(&self) -> Vec<u8> {
        let message = self.message.serialize();
        let mut wire = Vec::with_capacity(3 + 64 * self.signatures.len() + message.len());

        wire.extend_from_slice(&encode_compact_u16(self.signatures.len() as u16));
        for sig in &self.signatures {
            wire.extend_from_slice(sig.as_bytes());
        }
        wire.extend_from_slice(&message);

        wire
    }

    /// Parse a wire-format transaction.
    pub fn deserialize(raw: &[u8]) -> Result<Self, WireError> {
        let (num_sigs, compact_len) = decode_compact_u16(raw)?;

        if num_sigs == 0 {
            return Err(WireError::SerializationError(
                "transaction has zero signatures".into(),
            ));
        }

        let sigs_end = compact_len + (num_sigs as usize) * 64;
        if sigs_end > raw.len() {
            return Err(WireError::SerializationError(
                "transaction too short: signature slots exceed length".into(),
            ));
        }

        let signatures = raw[compact_len..sigs_end]
            .chunks_exact(64)
            .map(|chunk| {
                let mut arr = [0u8; 64];
                arr.copy_from_slice(chunk);
                Signature::new(arr)
            })
            .collect::<Vec<_>>();

        let (message, consumed) = Message::deserialize(&raw[sigs_end..])?;
        if sigs_end + consumed != raw.len() {
            return Err(WireError::SerializationError(
                "trailing bytes after transaction message".into(),
            ));
        }
        if message.num_required_signatures as usize != signatures.len() {
            return Err(WireError::SerializationError(format!(
                "message requires {} signatures, transaction carries {}",
                message.num_required_signatures,
                signatures.len()
            )));
        }

        Ok(Self {
            signatures,
            message,
        })
    }
}

/// Cursor over a byte slice with truncation-aware reads.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos + n;
        let out = self.data.get(self.pos..end).ok_or_else(|| {
            WireError::SerializationError("transaction message too short".into())
        })?;
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.bytes(1)?[0])
    }

    fn array32(&mut self) -> Result<[u8; 32], WireError> {
        let mut arr = [0u8; 32];
        arr.copy_from_slice(self.bytes(32)?);
        Ok(arr)
    }

    fn compact_u16(&mut self) -> Result<u16, WireError> {
        let (value, used) = decode_compact_u16(&self.data[self.pos.min(self.data.len())..])?;
        self.pos += used;
        Ok(value)
    }
}
