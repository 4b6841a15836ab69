//! Swap handler: runs protocol matchers over one transaction and turns the
//! surviving candidates into [`SwapLog`]s.

use std::sync::Arc;

use crate::core::matchers::{MatchContext, MatchOutcome, ProtocolRegistry};
use crate::types::events::EVENT_CPI_TAG;
use crate::types::protocol::is_quote_asset;
use crate::types::swap::{InstructionPosition, SwapAction, SwapCandidate, SwapLog, Transfer};
use crate::types::traits::MetadataQueue;
use crate::types::transaction::{AccountKeyTable, InvocationTree, RawInstruction, RawTransaction};

/// Orchestrates matchers across a transaction's instructions.
///
/// Holds no per-transaction state, so running it twice over the same input
/// yields the same swaps.
pub struct SwapHandler {
    registry: ProtocolRegistry,
    metadata: Option<Arc<dyn MetadataQueue>>,
}

impl SwapHandler {
    #[must_use]
    pub fn new(registry: ProtocolRegistry) -> Self {
        Self {
            registry,
            metadata: None,
        }
    }

    /// Every accepted swap pushes its token and pair onto `queue`.
    #[must_use]
    pub fn with_metadata_queue(mut self, queue: Arc<dyn MetadataQueue>) -> Self {
        self.metadata = Some(queue);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    /// Detects the swaps in `tx`.
    ///
    /// `transfers` must be in execution order, as produced by
    /// [`TransferReconstructor`](crate::core::transfers::TransferReconstructor).
    #[must_use]
    pub fn handle_swaps(
        &self,
        transfers: &[Transfer],
        tx: &RawTransaction,
        block_time: i64,
        block_number: u64,
    ) -> Vec<SwapLog> {
        let keys = tx.account_key_table();
        if !self.registry.touches_supported(&keys) {
            return Vec::new();
        }

        let mut swaps = Vec::new();
        for candidate in self.collect_candidates(transfers, tx, &keys) {
            if let Some(swap) = classify(candidate, tx, block_time, block_number) {
                if let Some(queue) = &self.metadata {
                    queue.add_to_queue(&swap.token);
                    queue.add_to_queue(&swap.pair);
                }
                swaps.push(swap);
            }
        }

        if !swaps.is_empty() {
            tracing::debug!(
                signature = %tx.signature,
                slot = block_number,
                swaps = swaps.len(),
                "Detected swaps"
            );
        }
        swaps
    }

    fn collect_candidates(
        &self,
        transfers: &[Transfer],
        tx: &RawTransaction,
        keys: &AccountKeyTable<'_>,
    ) -> Vec<SwapCandidate> {
        let mut candidates = Vec::new();

        for (outer, instruction) in tx.instructions.iter().enumerate() {
            let scope_end = transfers.partition_point(|t| t.position.outer <= outer);
            let mut cursor = transfers.partition_point(|t| t.position.outer < outer);
            let inner = tx.inner_instructions_for(outer);

            let window = &transfers[cursor..scope_end];
            if let Some(outcome) = self.run_matcher(keys, instruction, outer, None, inner, 0, window) {
                cursor += outcome.consumed.min(window.len());
                candidates.extend(outcome.candidate);
            }

            let tree = InvocationTree::build(inner);
            for (index, instruction) in inner.iter().enumerate() {
                let invoked = tree.descendants(index);
                let first = InstructionPosition::inner(outer, invoked.start);
                let past = InstructionPosition::inner(outer, invoked.end);
                let start = transfers.partition_point(|t| t.position < first).max(cursor);
                let end = transfers.partition_point(|t| t.position < past).max(start);
                let window = &transfers[start..end];

                if let Some(outcome) = self.run_matcher(
                    keys,
                    instruction,
                    outer,
                    Some(index),
                    &inner[invoked.clone()],
                    invoked.start,
                    window,
                ) {
                    if outcome.consumed > 0 {
                        cursor = start + outcome.consumed.min(window.len());
                    }
                    candidates.extend(outcome.candidate);
                }
            }
        }

        candidates
    }

    #[allow(clippy::too_many_arguments)]
    fn run_matcher(
        &self,
        keys: &AccountKeyTable<'_>,
        instruction: &RawInstruction,
        outer: usize,
        inner: Option<usize>,
        invoked: &[RawInstruction],
        invoked_start: usize,
        window: &[Transfer],
    ) -> Option<MatchOutcome> {
        let program = instruction.program_id(keys)?;
        let entry = self.registry.get(program)?;
        if !entry.gate.permits(instruction, keys) {
            tracing::trace!(
                protocol = %entry.protocol,
                accounts = instruction.accounts.len(),
                "Account gate rejected instruction"
            );
            return None;
        }
        // Self-invoked event logs are not swaps.
        if instruction.data_bytes().starts_with(&EVENT_CPI_TAG) {
            return None;
        }

        let ctx = MatchContext {
            protocol: entry.protocol,
            keys,
            instruction,
            outer,
            inner,
            window,
            invoked,
            invoked_start,
        };
        Some((entry.matcher)(&ctx))
    }
}

impl Default for SwapHandler {
    fn default() -> Self {
        Self::new(ProtocolRegistry::new())
    }
}

/// Validates a candidate and decides its direction against the quote assets.
fn classify(
    candidate: SwapCandidate,
    tx: &RawTransaction,
    block_time: i64,
    block_number: u64,
) -> Option<SwapLog> {
    if candidate.wallet.is_empty() || candidate.pair.is_empty() || !candidate.has_positive_amounts() {
        return None;
    }

    let (action, token) = match (
        is_quote_asset(&candidate.token_out),
        is_quote_asset(&candidate.token_in),
    ) {
        (true, false) => (SwapAction::Buy, candidate.token_in),
        (false, true) => (SwapAction::Sell, candidate.token_out),
        _ => return None,
    };

    Some(SwapLog {
        id: tx.signature.clone(),
        wallet: candidate.wallet,
        source: candidate.protocol.as_str().to_string(),
        block_number,
        timestamp: block_time,
        action,
        pair: candidate.pair,
        token,
        amount_in: candidate.amount_in,
        amount_out: candidate.amount_out,
        processed: false,
    })
}
