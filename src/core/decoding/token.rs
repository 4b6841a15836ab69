//! SPL Token (and Token-2022 base) instructions. One-byte tag.

use super::{read_address, read_u64};

const INITIALIZE_MINT: u8 = 0;
const INITIALIZE_ACCOUNT: u8 = 1;
const TRANSFER: u8 = 3;
const SET_AUTHORITY: u8 = 6;
const MINT_TO: u8 = 7;
const BURN: u8 = 8;
const TRANSFER_CHECKED: u8 = 12;
const MINT_TO_CHECKED: u8 = 14;
const BURN_CHECKED: u8 = 15;
const INITIALIZE_ACCOUNT_2: u8 = 16;
const INITIALIZE_ACCOUNT_3: u8 = 18;
const INITIALIZE_MINT_2: u8 = 20;

/// Account layouts (by position in the instruction's account list):
///
/// | Variant                  | Accounts                               |
/// |--------------------------|----------------------------------------|
/// | `Transfer`               | source, destination, authority         |
/// | `TransferChecked`        | source, mint, destination, authority   |
/// | `MintTo(Checked)`        | mint, account, authority               |
/// | `Burn(Checked)`          | account, mint, authority               |
/// | `InitializeAccount`      | account, mint, owner, rent sysvar      |
/// | `InitializeAccount2/3`   | account, mint (owner in data)          |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenInstruction {
    InitializeMint {
        decimals: u8,
        mint_authority: String,
    },
    InitializeAccount,
    InitializeAccount2 {
        owner: String,
    },
    InitializeAccount3 {
        owner: String,
    },
    Transfer {
        amount: u64,
    },
    TransferChecked {
        amount: u64,
        decimals: u8,
    },
    MintTo {
        amount: u64,
    },
    MintToChecked {
        amount: u64,
        decimals: u8,
    },
    Burn {
        amount: u64,
    },
    BurnChecked {
        amount: u64,
        decimals: u8,
    },
    SetAuthority {
        authority_type: u8,
        new_authority: Option<String>,
    },
    Unrecognized {
        discriminator: Option<u8>,
    },
}

impl TokenInstruction {
    /// `true` for the three account-initialization variants.
    #[must_use]
    pub fn initializes_account(&self) -> bool {
        matches!(
            self,
            Self::InitializeAccount | Self::InitializeAccount2 { .. } | Self::InitializeAccount3 { .. }
        )
    }
}

/// Decodes a token program payload.
#[must_use]
pub fn decode(data: &[u8]) -> TokenInstruction {
    let Some(&discriminator) = data.first() else {
        return TokenInstruction::Unrecognized {
            discriminator: None,
        };
    };
    let amount = || read_u64(data, 1).unwrap_or_default();
    let checked_decimals = || data.get(9).copied().unwrap_or_default();

    match discriminator {
        INITIALIZE_MINT | INITIALIZE_MINT_2 => TokenInstruction::InitializeMint {
            decimals: data.get(1).copied().unwrap_or_default(),
            mint_authority: read_address(data, 2).unwrap_or_default(),
        },
        INITIALIZE_ACCOUNT => TokenInstruction::InitializeAccount,
        INITIALIZE_ACCOUNT_2 => TokenInstruction::InitializeAccount2 {
            owner: read_address(data, 1).unwrap_or_default(),
        },
        INITIALIZE_ACCOUNT_3 => TokenInstruction::InitializeAccount3 {
            owner: read_address(data, 1).unwrap_or_default(),
        },
        TRANSFER => TokenInstruction::Transfer { amount: amount() },
        TRANSFER_CHECKED => TokenInstruction::TransferChecked {
            amount: amount(),
            decimals: checked_decimals(),
        },
        MINT_TO => TokenInstruction::MintTo { amount: amount() },
        MINT_TO_CHECKED => TokenInstruction::MintToChecked {
            amount: amount(),
            decimals: checked_decimals(),
        },
        BURN => TokenInstruction::Burn { amount: amount() },
        BURN_CHECKED => TokenInstruction::BurnChecked {
            amount: amount(),
            decimals: checked_decimals(),
        },
        SET_AUTHORITY => TokenInstruction::SetAuthority {
            authority_type: data.get(1).copied().unwrap_or_default(),
            new_authority: match data.get(2) {
                Some(1) => read_address(data, 3),
                _ => None,
            },
        },
        other => TokenInstruction::Unrecognized {
            discriminator: Some(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_amount(tag: u8, amount: u64) -> Vec<u8> {
        let mut data = vec![tag];
        data.extend_from_slice(&amount.to_le_bytes());
        data
    }

    #[test]
    fn test_transfer_variants() {
        assert_eq!(
            decode(&with_amount(TRANSFER, 50_000_000)),
            TokenInstruction::Transfer { amount: 50_000_000 }
        );

        let mut checked = with_amount(TRANSFER_CHECKED, 1_500);
        checked.push(6);
        assert_eq!(
            decode(&checked),
            TokenInstruction::TransferChecked {
                amount: 1_500,
                decimals: 6
            }
        );
    }

    #[test]
    fn test_mint_and_burn() {
        assert_eq!(decode(&with_amount(MINT_TO, 10)), TokenInstruction::MintTo { amount: 10 });
        assert_eq!(decode(&with_amount(BURN, 11)), TokenInstruction::Burn { amount: 11 });

        let mut burn_checked = with_amount(BURN_CHECKED, 12);
        burn_checked.push(9);
        assert_eq!(
            decode(&burn_checked),
            TokenInstruction::BurnChecked {
                amount: 12,
                decimals: 9
            }
        );
    }

    #[test]
    fn test_initialize_variants() {
        assert_eq!(decode(&[INITIALIZE_ACCOUNT]), TokenInstruction::InitializeAccount);

        let mut init3 = vec![INITIALIZE_ACCOUNT_3];
        init3.extend_from_slice(&[0u8; 32]);
        let decoded = decode(&init3);
        assert!(decoded.initializes_account());
        assert_eq!(
            decoded,
            TokenInstruction::InitializeAccount3 {
                owner: "11111111111111111111111111111111".to_string()
            }
        );

        let mut mint = vec![INITIALIZE_MINT, 6];
        mint.extend_from_slice(&[0u8; 32]);
        assert_eq!(
            decode(&mint),
            TokenInstruction::InitializeMint {
                decimals: 6,
                mint_authority: "11111111111111111111111111111111".to_string()
            }
        );
    }

    #[test]
    fn test_set_authority() {
        let mut data = vec![SET_AUTHORITY, 2, 1];
        data.extend_from_slice(&[0u8; 32]);
        assert_eq!(
            decode(&data),
            TokenInstruction::SetAuthority {
                authority_type: 2,
                new_authority: Some("11111111111111111111111111111111".to_string())
            }
        );
        assert_eq!(
            decode(&[SET_AUTHORITY, 2, 0]),
            TokenInstruction::SetAuthority {
                authority_type: 2,
                new_authority: None
            }
        );
    }

    #[test]
    fn test_truncated_payloads_are_zero_valued() {
        assert_eq!(decode(&[TRANSFER, 1, 2]), TokenInstruction::Transfer { amount: 0 });
        assert_eq!(
            decode(&[TRANSFER_CHECKED]),
            TokenInstruction::TransferChecked {
                amount: 0,
                decimals: 0
            }
        );
        assert_eq!(
            decode(&[INITIALIZE_ACCOUNT_2, 1]),
            TokenInstruction::InitializeAccount2 {
                owner: String::new()
            }
        );
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(
            decode(&[99]),
            TokenInstruction::Unrecognized {
                discriminator: Some(99)
            }
        );
        assert_eq!(
            decode(&[]),
            TokenInstruction::Unrecognized {
                discriminator: None
            }
        );
    }
}
