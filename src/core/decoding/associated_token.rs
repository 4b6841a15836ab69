//! Associated Token Account program.
//!
//! Accounts for `Create` / `CreateIdempotent`: funding, associated account,
//! wallet, mint, system program, token program.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociatedTokenInstruction {
    Create,
    CreateIdempotent,
    RecoverNested,
    Unrecognized { discriminator: u8 },
}

impl AssociatedTokenInstruction {
    #[must_use]
    pub fn creates_account(self) -> bool {
        matches!(self, Self::Create | Self::CreateIdempotent)
    }
}

/// Decodes an ATA payload. The legacy create instruction has empty data.
#[must_use]
pub fn decode(data: &[u8]) -> AssociatedTokenInstruction {
    match data.first() {
        None | Some(0) => AssociatedTokenInstruction::Create,
        Some(1) => AssociatedTokenInstruction::CreateIdempotent,
        Some(2) => AssociatedTokenInstruction::RecoverNested,
        Some(&other) => AssociatedTokenInstruction::Unrecognized {
            discriminator: other,
        },
    }
}
