//! Anchor event layouts the matchers decode.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};

/// Anchor `emit_cpi!` instruction tag (`EVENT_IX_TAG_LE`).
pub const EVENT_CPI_TAG: [u8; 8] = [0xe4, 0x45, 0xa5, 0x2e, 0x51, 0xcb, 0x9a, 0x1d];

/// Calculates the 8-byte discriminator for an event type.
///
/// The discriminator is the first 8 bytes of `sha256("event:" + name)`,
/// matching Anchor's event discriminator calculation.
///
/// # Example
///
/// ```
/// use solana_swap_indexer::calculate_discriminator;
///
/// let discriminator = calculate_discriminator("TradeEvent");
/// assert_eq!(discriminator, [189, 219, 127, 211, 78, 230, 97, 238]);
/// ```
#[must_use]
pub fn calculate_discriminator(event_name: &str) -> [u8; 8] {
    let preimage = format!("event:{event_name}");
    let hash = Sha256::digest(preimage.as_bytes());
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Types that carry a fixed Anchor event discriminator.
pub trait EventDiscriminator {
    fn discriminator() -> [u8; 8];
}

/// PumpFun bonding-curve trade event (leading fields only; newer program
/// versions append more, which the decoder ignores).
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PumpTradeEvent {
    pub mint: [u8; 32],
    pub sol_amount: u64,
    pub token_amount: u64,
    pub is_buy: bool,
    pub user: [u8; 32],
}

impl EventDiscriminator for PumpTradeEvent {
    fn discriminator() -> [u8; 8] {
        calculate_discriminator("TradeEvent")
    }
}

impl PumpTradeEvent {
    /// Decodes the event body that follows the discriminator.
    /// Trailing bytes are ignored; truncated bodies yield `None`.
    #[must_use]
    pub fn decode(body: &[u8]) -> Option<Self> {
        let mut reader = body;
        Self::deserialize(&mut reader).ok()
    }

    #[must_use]
    pub fn mint_address(&self) -> String {
        bs58::encode(self.mint).into_string()
    }

    #[must_use]
    pub fn user_address(&self) -> String {
        bs58::encode(self.user).into_string()
    }
}
