//! Meteora pools emit a variable number of fee and bookkeeping movements
//! around the trade, so the legs are the first two plain token transfers.

use super::{MatchContext, MatchOutcome};
use crate::types::swap::{SwapCandidate, TransferKind};

pub fn dlmm(ctx: &MatchContext<'_>) -> MatchOutcome {
    first_two_token_transfers(ctx, 0)
}

pub fn pools(ctx: &MatchContext<'_>) -> MatchOutcome {
    first_two_token_transfers(ctx, 0)
}

fn first_two_token_transfers(ctx: &MatchContext<'_>, pair_index: usize) -> MatchOutcome {
    let mut tokens = ctx
        .transfers_after()
        .filter(|(_, t)| t.kind == TransferKind::Token);
    let (Some((_, out)), Some((in_offset, inn))) = (tokens.next(), tokens.next()) else {
        return MatchOutcome::none();
    };
    let pair = ctx.account(pair_index).unwrap_or_default();
    MatchOutcome::matched(
        SwapCandidate::from_legs(ctx.protocol, &out.source, pair, out, inn),
        in_offset + 1,
    )
}
