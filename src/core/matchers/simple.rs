//! Two-transfer protocols: the first leg after the swap instruction is the
//! out leg, the next leg is the in leg. Mint and burn transfers in between
//! are skipped.

use super::{MatchContext, MatchOutcome, legs};
use crate::types::swap::SwapCandidate;

pub fn orca(ctx: &MatchContext<'_>) -> MatchOutcome {
    two_leg(ctx, 2)
}

pub fn raydium_v4(ctx: &MatchContext<'_>) -> MatchOutcome {
    two_leg(ctx, 1)
}

pub fn phoenix(ctx: &MatchContext<'_>) -> MatchOutcome {
    two_leg(ctx, 2)
}

pub fn lifinity(ctx: &MatchContext<'_>) -> MatchOutcome {
    two_leg(ctx, 1)
}

pub fn fluxbeam(ctx: &MatchContext<'_>) -> MatchOutcome {
    two_leg(ctx, 0)
}

fn two_leg(ctx: &MatchContext<'_>, pair_index: usize) -> MatchOutcome {
    let mut legs = legs(ctx);
    let (Some((_, out)), Some((in_offset, inn))) = (legs.next(), legs.next()) else {
        return MatchOutcome::none();
    };
    let pair = ctx.account(pair_index).unwrap_or_default();
    MatchOutcome::matched(
        SwapCandidate::from_legs(ctx.protocol, &out.source, pair, out, inn),
        in_offset + 1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matchers::test_support::{instruction, transfer};
    use crate::types::protocol::{Protocol, WSOL_MINT};
    use crate::types::swap::TransferKind;
    use crate::types::transaction::RawTransaction;

    fn tx() -> RawTransaction {
        RawTransaction {
            signature: "sig".into(),
            account_keys: vec!["Prog".into(), "Auth".into(), "Pool".into()],
            loaded_writable: vec![],
            loaded_readonly: vec![],
            instructions: vec![],
            inner_instructions: vec![],
            pre_balances: vec![],
            post_balances: vec![],
            pre_token_balances: vec![],
            post_token_balances: vec![],
        }
    }

    #[test]
    fn test_skips_mint_between_legs() {
        let tx = tx();
        let keys = tx.account_key_table();
        let ix = instruction(0, vec![0, 1, 2]);
        let window = vec![
            transfer(0, "wallet", "pool", WSOL_MINT, "1", TransferKind::Token),
            transfer(1, "pool", "wallet", "LP", "3", TransferKind::Mint),
            transfer(2, "pool", "wallet", "M", "50", TransferKind::Token),
            transfer(3, "wallet", "other", WSOL_MINT, "9", TransferKind::Token),
        ];
        let ctx = MatchContext {
            protocol: Protocol::Orca,
            keys: &keys,
            instruction: &ix,
            outer: 0,
            inner: None,
            window: &window,
            invoked: &[],
            invoked_start: 0,
        };

        let outcome = orca(&ctx);
        let candidate = outcome.candidate.unwrap();
        assert_eq!(outcome.consumed, 3);
        assert_eq!(candidate.wallet, "wallet");
        assert_eq!(candidate.pair, "Pool");
        assert_eq!(candidate.token_out, WSOL_MINT);
        assert_eq!(candidate.token_in, "M");
    }

    #[test]
    fn test_burn_between_legs_is_skipped() {
        let tx = tx();
        let keys = tx.account_key_table();
        let ix = instruction(0, vec![0, 1, 2]);
        let window = vec![
            transfer(0, "wallet", "pool", WSOL_MINT, "1", TransferKind::Token),
            transfer(1, "wallet", "", "LP", "3", TransferKind::Burn),
            transfer(2, "pool", "wallet", "M", "50", TransferKind::Token),
        ];
        let ctx = MatchContext {
            protocol: Protocol::Phoenix,
            keys: &keys,
            instruction: &ix,
            outer: 0,
            inner: None,
            window: &window,
            invoked: &[],
            invoked_start: 0,
        };

        let outcome = phoenix(&ctx);
        assert_eq!(outcome.consumed, 3);
        assert_eq!(outcome.candidate.unwrap().token_in, "M");
    }

    #[test]
    fn test_legs_start_after_the_swap_instruction() {
        let tx = tx();
        let keys = tx.account_key_table();
        let ix = instruction(0, vec![0, 1, 2]);
        let window = vec![
            transfer(0, "wallet", "router", WSOL_MINT, "5", TransferKind::Token),
            transfer(2, "wallet", "pool", WSOL_MINT, "1", TransferKind::Token),
            transfer(3, "pool", "wallet", "M", "50", TransferKind::Token),
        ];
        let ctx = MatchContext {
            protocol: Protocol::Lifinity,
            keys: &keys,
            instruction: &ix,
            outer: 0,
            inner: Some(1),
            window: &window,
            invoked: &[],
            invoked_start: 2,
        };

        let outcome = lifinity(&ctx);
        assert_eq!(outcome.consumed, 3);
        let candidate = outcome.candidate.unwrap();
        assert_eq!(candidate.token_out, WSOL_MINT);
        assert_eq!(candidate.amount_out.to_string(), "1");
        assert_eq!(candidate.token_in, "M");
        assert_eq!(candidate.pair, "Auth");
    }

    #[test]
    fn test_single_leg_is_no_match() {
        let tx = tx();
        let keys = tx.account_key_table();
        let ix = instruction(0, vec![0, 1, 2]);
        let window = vec![transfer(0, "wallet", "pool", WSOL_MINT, "1", TransferKind::Token)];
        let ctx = MatchContext {
            protocol: Protocol::Fluxbeam,
            keys: &keys,
            instruction: &ix,
            outer: 0,
            inner: None,
            window: &window,
            invoked: &[],
            invoked_start: 0,
        };
        assert_eq!(fluxbeam(&ctx), MatchOutcome::none());
    }
}
