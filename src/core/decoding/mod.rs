//! Binary instruction decoders.
//!
//! Pure functions from an instruction's byte payload to a typed record.
//! Decoders never fail: truncated payloads produce the recognized variant
//! with zero-valued fields, and unknown discriminators produce an explicit
//! `Unrecognized` variant that callers treat as "not a transfer".

pub mod associated_token;
pub mod system;
pub mod token;

pub use associated_token::AssociatedTokenInstruction;
pub use system::SystemInstruction;
pub use token::TokenInstruction;

use crate::types::protocol::{ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, is_token_program};

/// Result of decoding one instruction against its owning program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedInstruction {
    System(SystemInstruction),
    Token(TokenInstruction),
    AssociatedToken(AssociatedTokenInstruction),
    /// The program has no decoder here.
    NotApplicable,
}

/// Dispatches on the program address.
#[must_use]
pub fn decode_instruction(program_id: &str, data: &[u8]) -> DecodedInstruction {
    if program_id == SYSTEM_PROGRAM_ID {
        DecodedInstruction::System(system::decode(data))
    } else if is_token_program(program_id) {
        DecodedInstruction::Token(token::decode(data))
    } else if program_id == ASSOCIATED_TOKEN_PROGRAM_ID {
        DecodedInstruction::AssociatedToken(associated_token::decode(data))
    } else {
        DecodedInstruction::NotApplicable
    }
}

pub(crate) fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

pub(crate) fn read_address(data: &[u8], offset: usize) -> Option<String> {
    let bytes = data.get(offset..offset.checked_add(32)?)?;
    Some(bs58::encode(bytes).into_string())
}
