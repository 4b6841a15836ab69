//! Transfers, swap candidates and the persisted swap log.

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

use super::protocol::Protocol;

/// Scales a raw integer amount by `decimals` without any float rounding.
#[must_use]
pub fn scale_amount(raw: u64, decimals: u8) -> BigDecimal {
    BigDecimal::new(BigInt::from(raw), i64::from(decimals))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Native,
    Token,
    Mint,
    Burn,
}

/// Where an instruction sits in a transaction: outer index plus optional
/// inner index. Orders top-level before its own inner instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstructionPosition {
    pub outer: usize,
    pub inner: Option<usize>,
}

impl InstructionPosition {
    #[must_use]
    pub fn top_level(outer: usize) -> Self {
        Self { outer, inner: None }
    }

    #[must_use]
    pub fn inner(outer: usize, inner: usize) -> Self {
        Self {
            outer,
            inner: Some(inner),
        }
    }
}

/// One atomic value movement.
///
/// `source` and `destination` are wallets, not token accounts. An empty
/// `mint` is the native asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub position: InstructionPosition,
    pub source: String,
    pub destination: String,
    /// Signer of the transfer instruction.
    pub authority: String,
    pub mint: String,
    pub amount: BigDecimal,
    pub kind: TransferKind,
}

impl Transfer {
    /// Only native and token movements count as swap legs.
    #[must_use]
    pub fn is_leg(&self) -> bool {
        matches!(self.kind, TransferKind::Native | TransferKind::Token)
    }
}

/// An unconfirmed swap produced by a protocol matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCandidate {
    pub protocol: Protocol,
    pub wallet: String,
    pub pair: String,
    pub token_out: String,
    pub amount_out: BigDecimal,
    pub token_in: String,
    pub amount_in: BigDecimal,
}

impl SwapCandidate {
    /// Builds a candidate from an out leg and an in leg.
    #[must_use]
    pub fn from_legs(protocol: Protocol, wallet: &str, pair: &str, out: &Transfer, inn: &Transfer) -> Self {
        Self {
            protocol,
            wallet: wallet.to_string(),
            pair: pair.to_string(),
            token_out: out.mint.clone(),
            amount_out: out.amount.clone(),
            token_in: inn.mint.clone(),
            amount_in: inn.amount.clone(),
        }
    }

    #[must_use]
    pub fn has_positive_amounts(&self) -> bool {
        self.amount_out > BigDecimal::zero() && self.amount_in > BigDecimal::zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwapAction {
    Buy,
    Sell,
}

impl SwapAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// A validated swap, ready for persistence and fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapLog {
    /// Transaction signature.
    pub id: String,
    pub wallet: String,
    /// Protocol label, see [`Protocol::as_str`].
    pub source: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub action: SwapAction,
    pub pair: String,
    /// The non-quote side of the trade.
    pub token: String,
    pub amount_in: BigDecimal,
    pub amount_out: BigDecimal,
    pub processed: bool,
}
