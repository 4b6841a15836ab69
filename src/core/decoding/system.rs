//! System program instructions (bincode layout, u32 little-endian tag).

use super::{read_address, read_u64};

const CREATE_ACCOUNT: u32 = 0;
const ASSIGN: u32 = 1;
const TRANSFER: u32 = 2;
const ALLOCATE: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemInstruction {
    CreateAccount {
        lamports: u64,
        space: u64,
        owner: String,
    },
    Assign {
        owner: String,
    },
    Transfer {
        lamports: u64,
    },
    Allocate {
        space: u64,
    },
    Unrecognized {
        discriminator: Option<u32>,
    },
}

/// Decodes a system program payload.
#[must_use]
pub fn decode(data: &[u8]) -> SystemInstruction {
    if data.is_empty() {
        return SystemInstruction::Unrecognized {
            discriminator: None,
        };
    }
    // Short tags are zero-padded so a lone leading byte still identifies the kind.
    let mut tag = [0u8; 4];
    let tag_len = data.len().min(4);
    tag[..tag_len].copy_from_slice(&data[..tag_len]);
    let discriminator = u32::from_le_bytes(tag);

    match discriminator {
        CREATE_ACCOUNT => SystemInstruction::CreateAccount {
            lamports: read_u64(data, 4).unwrap_or_default(),
            space: read_u64(data, 12).unwrap_or_default(),
            owner: read_address(data, 20).unwrap_or_default(),
        },
        ASSIGN => SystemInstruction::Assign {
            owner: read_address(data, 4).unwrap_or_default(),
        },
        TRANSFER => SystemInstruction::Transfer {
            lamports: read_u64(data, 4).unwrap_or_default(),
        },
        ALLOCATE => SystemInstruction::Allocate {
            space: read_u64(data, 4).unwrap_or_default(),
        },
        other => SystemInstruction::Unrecognized {
            discriminator: Some(other),
        },
    }
}
