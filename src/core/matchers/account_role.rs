//! Protocols whose wallet and pool sit at fixed positions in the swap
//! instruction's account list. Leg direction comes from transfer authority:
//! the wallet signs the out leg.

use super::{MatchContext, MatchOutcome, legs};
use crate::types::swap::SwapCandidate;

pub fn pumpfun_amm(ctx: &MatchContext<'_>) -> MatchOutcome {
    by_role(ctx, 1, 0)
}

pub fn raydium_clmm(ctx: &MatchContext<'_>) -> MatchOutcome {
    by_role(ctx, 0, 2)
}

pub fn raydium_cpmm(ctx: &MatchContext<'_>) -> MatchOutcome {
    by_role(ctx, 0, 3)
}

fn by_role(ctx: &MatchContext<'_>, wallet_index: usize, pair_index: usize) -> MatchOutcome {
    let (Some(wallet), Some(pair)) = (ctx.account(wallet_index), ctx.account(pair_index)) else {
        return MatchOutcome::none();
    };
    let mut legs = legs(ctx);
    let (Some((_, first)), Some((second_offset, second))) = (legs.next(), legs.next()) else {
        return MatchOutcome::none();
    };
    let (out, inn) = if first.authority == wallet {
        (first, second)
    } else {
        (second, first)
    };
    MatchOutcome::matched(
        SwapCandidate::from_legs(ctx.protocol, wallet, pair, out, inn),
        second_offset + 1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matchers::test_support::{instruction, transfer};
    use crate::types::protocol::{Protocol, WSOL_MINT};
    use crate::types::swap::{Transfer, TransferKind};
    use crate::types::transaction::RawTransaction;

    fn outcome(window: &[Transfer]) -> MatchOutcome {
        let tx = RawTransaction {
            signature: "sig".into(),
            account_keys: vec!["Payer".into(), "Config".into(), "PoolState".into()],
            loaded_writable: vec![],
            loaded_readonly: vec![],
            instructions: vec![],
            inner_instructions: vec![],
            pre_balances: vec![],
            post_balances: vec![],
            pre_token_balances: vec![],
            post_token_balances: vec![],
        };
        let keys = tx.account_key_table();
        let ix = instruction(1, vec![0, 1, 2]);
        let ctx = MatchContext {
            protocol: Protocol::RaydiumClmm,
            keys: &keys,
            instruction: &ix,
            outer: 0,
            inner: None,
            window,
            invoked: &[],
            invoked_start: 0,
        };
        raydium_clmm(&ctx)
    }

    #[test]
    fn test_wallet_signed_leg_is_out() {
        let window = vec![
            transfer(0, "Payer", "vault", WSOL_MINT, "1", TransferKind::Token),
            transfer(1, "PoolState", "Payer", "M", "20", TransferKind::Token),
        ];
        let candidate = outcome(&window).candidate.unwrap();
        assert_eq!(candidate.token_out, WSOL_MINT);
        assert_eq!(candidate.wallet, "Payer");
        assert_eq!(candidate.pair, "PoolState");
    }

    #[test]
    fn test_legs_swapped_when_pool_pays_first() {
        let window = vec![
            transfer(0, "PoolState", "Payer", "M", "20", TransferKind::Token),
            transfer(1, "Payer", "vault", WSOL_MINT, "1", TransferKind::Token),
        ];
        let result = outcome(&window);
        assert_eq!(result.consumed, 2);
        let candidate = result.candidate.unwrap();
        assert_eq!(candidate.token_out, WSOL_MINT);
        assert_eq!(candidate.token_in, "M");
    }
}
