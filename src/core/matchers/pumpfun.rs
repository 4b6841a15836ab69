//! PumpFun bonding-curve trades.
//!
//! The program moves SOL by direct lamport edits, so there are no usable
//! transfers. The trade is recovered from the `TradeEvent` the program
//! self-invokes with `emit_cpi!`.

use super::{MatchContext, MatchOutcome};
use crate::types::events::{EventDiscriminator, PumpTradeEvent};
use crate::types::protocol::WSOL_MINT;
use crate::types::swap::{InstructionPosition, SwapCandidate, scale_amount};

const SOL_DECIMALS: u8 = 9;
const PUMP_TOKEN_DECIMALS: u8 = 6;
const BONDING_CURVE_ACCOUNT: usize = 3;

pub fn bonding_curve(ctx: &MatchContext<'_>) -> MatchOutcome {
    let needle = hex::encode(PumpTradeEvent::discriminator());

    for (position, ix) in ctx.invoked_with_positions() {
        let Some(body) = event_body(&ix.data_bytes(), &needle) else {
            continue;
        };
        let Some(event) = PumpTradeEvent::decode(&body) else {
            return MatchOutcome::none();
        };
        let pair = ctx.account(BONDING_CURVE_ACCOUNT).unwrap_or_default();
        return MatchOutcome::matched(candidate(ctx, &event, pair), consumed_through(ctx, position));
    }

    MatchOutcome::none()
}

/// Bytes after the first discriminator occurrence at a byte boundary of the hex dump.
fn event_body(data: &[u8], needle: &str) -> Option<Vec<u8>> {
    let encoded = hex::encode(data);
    let (offset, _) = encoded
        .match_indices(needle)
        .find(|(offset, _)| offset % 2 == 0)?;
    let start = (offset + needle.len()) / 2;
    data.get(start..).map(<[u8]>::to_vec)
}

fn candidate(ctx: &MatchContext<'_>, event: &PumpTradeEvent, pair: &str) -> SwapCandidate {
    let sol = scale_amount(event.sol_amount, SOL_DECIMALS);
    let token = scale_amount(event.token_amount, PUMP_TOKEN_DECIMALS);
    let mint = event.mint_address();

    let (token_out, amount_out, token_in, amount_in) = if event.is_buy {
        (WSOL_MINT.to_string(), sol, mint, token)
    } else {
        (mint, token, WSOL_MINT.to_string(), sol)
    };

    SwapCandidate {
        protocol: ctx.protocol,
        wallet: event.user_address(),
        pair: pair.to_string(),
        token_out,
        amount_out,
        token_in,
        amount_in,
    }
}

fn consumed_through(ctx: &MatchContext<'_>, event_position: InstructionPosition) -> usize {
    ctx.window
        .iter()
        .take_while(|t| t.position <= event_position)
        .count()
}
