//! Protocol swap matchers.
//!
//! Each supported exchange program maps to a pure [`MatchFn`] through the
//! [`ProtocolRegistry`]. A matcher sees the transfers inside the invocation
//! subtree of one swap instruction (starting at the caller's scope cursor)
//! and reports at most one [`SwapCandidate`] plus how many of those
//! transfers it consumed.

pub mod account_role;
pub mod meteora;
pub mod pumpfun;
pub mod simple;

use std::collections::HashMap;

use crate::types::protocol::{Protocol, TOKEN_PROGRAM_ID};
use crate::types::swap::{InstructionPosition, SwapCandidate, Transfer};
use crate::types::transaction::{AccountKeyTable, RawInstruction};

/// Signature every protocol matcher implements.
pub type MatchFn = fn(&MatchContext<'_>) -> MatchOutcome;

/// Everything a matcher may look at for one swap instruction.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub protocol: Protocol,
    pub keys: &'a AccountKeyTable<'a>,
    pub instruction: &'a RawInstruction,
    /// Outer index of the instruction.
    pub outer: usize,
    /// Inner index, `None` when the program was invoked at the top level.
    pub inner: Option<usize>,
    /// Unclaimed transfers produced inside this instruction's invocation.
    pub window: &'a [Transfer],
    /// Inner instructions invoked by this instruction.
    pub invoked: &'a [RawInstruction],
    /// Inner index of `invoked[0]`.
    pub invoked_start: usize,
}

impl<'a> MatchContext<'a> {
    /// Address at `position` in the swap instruction's account list.
    #[must_use]
    pub fn account(&self, position: usize) -> Option<&'a str> {
        self.instruction.account(self.keys, position)
    }

    /// Where the swap instruction itself sits.
    #[must_use]
    pub fn position(&self) -> InstructionPosition {
        InstructionPosition {
            outer: self.outer,
            inner: self.inner,
        }
    }

    /// Window transfers executed after the swap instruction, with their offsets.
    pub fn transfers_after(&self) -> impl Iterator<Item = (usize, &'a Transfer)> + use<'a> {
        let position = self.position();
        let window: &'a [Transfer] = self.window;
        window.iter().enumerate().filter(move |(_, t)| t.position > position)
    }

    /// Invoked instructions paired with their positions.
    pub fn invoked_with_positions(
        &self,
    ) -> impl Iterator<Item = (InstructionPosition, &'a RawInstruction)> + '_ {
        self.invoked
            .iter()
            .enumerate()
            .map(|(offset, ix)| (InstructionPosition::inner(self.outer, self.invoked_start + offset), ix))
    }
}

/// Matcher result. `consumed` counts transfers from the start of the window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    pub candidate: Option<SwapCandidate>,
    pub consumed: usize,
}

impl MatchOutcome {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn matched(candidate: SwapCandidate, consumed: usize) -> Self {
        Self {
            candidate: Some(candidate),
            consumed,
        }
    }
}

/// Structural precondition on the swap instruction's account list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountGate {
    /// Accepted account counts; empty accepts any.
    pub valid_counts: &'static [usize],
    /// Required address of the first account, if any.
    pub first_account: Option<&'static str>,
}

impl AccountGate {
    pub const OPEN: Self = Self {
        valid_counts: &[],
        first_account: None,
    };

    #[must_use]
    pub fn permits(&self, instruction: &RawInstruction, keys: &AccountKeyTable<'_>) -> bool {
        if !self.valid_counts.is_empty() && !self.valid_counts.contains(&instruction.accounts.len()) {
            return false;
        }
        match self.first_account {
            Some(expected) => instruction.account(keys, 0) == Some(expected),
            None => true,
        }
    }
}

/// One registry entry.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolMatcher {
    pub protocol: Protocol,
    pub matcher: MatchFn,
    pub gate: AccountGate,
}

impl ProtocolMatcher {
    /// Built-in matcher and gate for `protocol`.
    #[must_use]
    pub fn builtin(protocol: Protocol) -> Self {
        let (matcher, gate): (MatchFn, AccountGate) = match protocol {
            Protocol::Orca => (simple::orca, AccountGate::OPEN),
            Protocol::RaydiumV4 => (
                simple::raydium_v4,
                AccountGate {
                    valid_counts: &[17, 18],
                    first_account: Some(TOKEN_PROGRAM_ID),
                },
            ),
            Protocol::Phoenix => (simple::phoenix, AccountGate::OPEN),
            Protocol::Lifinity => (simple::lifinity, AccountGate::OPEN),
            Protocol::Fluxbeam => (simple::fluxbeam, AccountGate::OPEN),
            Protocol::MeteoraDlmm => (meteora::dlmm, AccountGate::OPEN),
            Protocol::MeteoraPools => (meteora::pools, AccountGate::OPEN),
            Protocol::PumpFun => (pumpfun::bonding_curve, AccountGate::OPEN),
            Protocol::PumpFunAmm => (
                account_role::pumpfun_amm,
                AccountGate {
                    valid_counts: &[17, 18, 19, 21, 23],
                    first_account: None,
                },
            ),
            Protocol::RaydiumClmm => (account_role::raydium_clmm, AccountGate::OPEN),
            Protocol::RaydiumCpmm => (
                account_role::raydium_cpmm,
                AccountGate {
                    valid_counts: &[13],
                    first_account: None,
                },
            ),
        };
        Self {
            protocol,
            matcher,
            gate,
        }
    }
}

/// Program address to matcher lookup table.
#[derive(Debug, Clone)]
pub struct ProtocolRegistry {
    matchers: HashMap<String, ProtocolMatcher>,
}

impl ProtocolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            matchers: HashMap::new(),
        }
    }

    /// Registry with every built-in protocol.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for protocol in Protocol::ALL {
            registry.register(protocol.program_id(), ProtocolMatcher::builtin(protocol));
        }
        registry
    }

    /// Adds or replaces the matcher for `program_id`.
    pub fn register(&mut self, program_id: impl Into<String>, matcher: ProtocolMatcher) {
        self.matchers.insert(program_id.into(), matcher);
    }

    #[must_use]
    pub fn get(&self, program_id: &str) -> Option<&ProtocolMatcher> {
        self.matchers.get(program_id)
    }

    #[must_use]
    pub fn supports(&self, program_id: &str) -> bool {
        self.matchers.contains_key(program_id)
    }

    /// `true` when any key of the transaction belongs to a supported program.
    #[must_use]
    pub fn touches_supported(&self, keys: &AccountKeyTable<'_>) -> bool {
        keys.iter().any(|key| self.supports(key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Swap legs (native or token) after the swap instruction, with their window offsets.
pub(crate) fn legs<'a>(ctx: &MatchContext<'a>) -> impl Iterator<Item = (usize, &'a Transfer)> + use<'a> {
    ctx.transfers_after().filter(|(_, t)| t.is_leg())
}
