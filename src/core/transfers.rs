//! Transfer reconstruction.
//!
//! Turns one [`RawTransaction`] into the ordered list of value movements its
//! System and Token program instructions performed. Token-account addresses
//! are resolved to owning wallets, first through the balance-diff table and
//! then through account-initialization instructions in the same transaction
//! (a token account created in this transaction has no prior balance).

use bigdecimal::Zero;
use std::collections::HashMap;

use crate::core::decoding::{DecodedInstruction, SystemInstruction, TokenInstruction, decode_instruction};
use crate::types::swap::{InstructionPosition, Transfer, TransferKind, scale_amount};
use crate::types::transaction::{AccountKeyTable, RawInstruction, RawTransaction};

const NATIVE_DECIMALS: u8 = 9;

/// Post-minus-pre change of one token account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDiff {
    pub mint: String,
    pub owner: String,
    pub decimals: u8,
    pub delta: i128,
}

/// Per-account-index balance changes of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceDiffs {
    token: HashMap<u8, TokenDiff>,
    native: HashMap<u8, i128>,
}

impl BalanceDiffs {
    /// Token entries without a post balance are dropped; a missing pre balance
    /// counts as zero. Native diffs exist only where both sides are present.
    #[must_use]
    pub fn build(tx: &RawTransaction) -> Self {
        let mut token = HashMap::new();
        for post in &tx.post_token_balances {
            let Ok(post_amount) = post.amount.parse::<u128>() else {
                continue;
            };
            let pre_amount = tx
                .pre_token_balances
                .iter()
                .find(|pre| pre.account_index == post.account_index)
                .and_then(|pre| pre.amount.parse::<u128>().ok())
                .unwrap_or_default();
            let delta = post_amount as i128 - pre_amount as i128;
            token.insert(
                post.account_index,
                TokenDiff {
                    mint: post.mint.clone(),
                    owner: post.owner.clone(),
                    decimals: post.decimals,
                    delta,
                },
            );
        }

        let native = tx
            .pre_balances
            .iter()
            .zip(tx.post_balances.iter())
            .enumerate()
            .filter_map(|(index, (pre, post))| {
                let index = u8::try_from(index).ok()?;
                Some((index, i128::from(*post) - i128::from(*pre)))
            })
            .collect();

        Self { token, native }
    }

    #[must_use]
    pub fn token(&self, account_index: u8) -> Option<&TokenDiff> {
        self.token.get(&account_index)
    }

    #[must_use]
    pub fn native_delta(&self, account_index: u8) -> Option<i128> {
        self.native.get(&account_index).copied()
    }
}

/// Owner and mint established for a token account by an init instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AccountInit {
    owner: String,
    mint: String,
}

/// Stateless reconstructor; all state lives in a per-call context.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransferReconstructor;

impl TransferReconstructor {
    /// Reconstructs transfers in execution order. Never fails: instructions
    /// that cannot be classified are skipped.
    #[must_use]
    pub fn reconstruct(tx: &RawTransaction) -> Vec<Transfer> {
        let ctx = Context::new(tx);
        let mut transfers = Vec::new();

        for (outer, instruction) in tx.instructions.iter().enumerate() {
            if let Some(transfer) = ctx.classify(instruction, InstructionPosition::top_level(outer)) {
                transfers.push(transfer);
            }
            for (inner, instruction) in tx.inner_instructions_for(outer).iter().enumerate() {
                if let Some(transfer) =
                    ctx.classify(instruction, InstructionPosition::inner(outer, inner))
                {
                    transfers.push(transfer);
                }
            }
        }

        transfers
    }
}

struct Context<'a> {
    tx: &'a RawTransaction,
    keys: AccountKeyTable<'a>,
    diffs: BalanceDiffs,
    inits: HashMap<String, AccountInit>,
}

impl<'a> Context<'a> {
    fn new(tx: &'a RawTransaction) -> Self {
        let keys = tx.account_key_table();
        let inits = scan_account_inits(tx, &keys);
        Self {
            tx,
            keys,
            diffs: BalanceDiffs::build(tx),
            inits,
        }
    }

    fn classify(&self, ix: &RawInstruction, position: InstructionPosition) -> Option<Transfer> {
        let program = ix.program_id(&self.keys)?;
        let transfer = match decode_instruction(program, &ix.data_bytes()) {
            DecodedInstruction::System(SystemInstruction::Transfer { lamports }) => {
                self.native_transfer(ix, position, lamports)
            }
            DecodedInstruction::Token(token) => self.token_transfer(ix, position, &token),
            _ => None,
        }?;

        if transfer.amount.is_zero() {
            return None;
        }
        Some(transfer)
    }

    fn native_transfer(
        &self,
        ix: &RawInstruction,
        position: InstructionPosition,
        lamports: u64,
    ) -> Option<Transfer> {
        if ix.accounts.len() < 2 {
            return None;
        }
        let source = ix.account(&self.keys, 0)?;
        let destination = ix.account(&self.keys, 1)?;
        if let Some(delta) = self.diffs.native_delta(ix.accounts[1])
            && delta < i128::from(lamports)
        {
            tracing::trace!(
                signature = %self.tx.signature,
                destination,
                lamports,
                delta,
                "Decoded lamports exceed the destination's balance change"
            );
        }
        Some(Transfer {
            position,
            source: source.to_string(),
            destination: destination.to_string(),
            authority: source.to_string(),
            mint: String::new(),
            amount: scale_amount(lamports, NATIVE_DECIMALS),
            kind: TransferKind::Native,
        })
    }

    fn token_transfer(
        &self,
        ix: &RawInstruction,
        position: InstructionPosition,
        instruction: &TokenInstruction,
    ) -> Option<Transfer> {
        match *instruction {
            TokenInstruction::Transfer { amount } => {
                let source = *ix.accounts.first()?;
                let destination = *ix.accounts.get(1)?;
                let (mint, decimals) = self
                    .mint_of(source)
                    .or_else(|| self.mint_of(destination))?;
                Some(Transfer {
                    position,
                    source: self.owner_of(source)?,
                    destination: self.owner_of(destination)?,
                    authority: ix.account(&self.keys, 2)?.to_string(),
                    mint,
                    amount: scale_amount(amount, decimals),
                    kind: TransferKind::Token,
                })
            }
            TokenInstruction::TransferChecked { amount, decimals } => {
                let source = *ix.accounts.first()?;
                let destination = *ix.accounts.get(2)?;
                Some(Transfer {
                    position,
                    source: self.owner_of(source)?,
                    destination: self.owner_of(destination)?,
                    authority: ix.account(&self.keys, 3)?.to_string(),
                    mint: ix.account(&self.keys, 1)?.to_string(),
                    amount: scale_amount(amount, decimals),
                    kind: TransferKind::Token,
                })
            }
            TokenInstruction::MintTo { amount } | TokenInstruction::MintToChecked { amount, .. } => {
                let mint = ix.account(&self.keys, 0)?;
                let account = *ix.accounts.get(1)?;
                let decimals = match *instruction {
                    TokenInstruction::MintToChecked { decimals, .. } => decimals,
                    _ => self.decimals_of_mint(mint)?,
                };
                let authority = ix.account(&self.keys, 2).unwrap_or_default();
                Some(Transfer {
                    position,
                    source: authority.to_string(),
                    destination: self
                        .owner_of(account)
                        .or_else(|| self.keys.get(account).map(String::from))?,
                    authority: authority.to_string(),
                    mint: mint.to_string(),
                    amount: scale_amount(amount, decimals),
                    kind: TransferKind::Mint,
                })
            }
            TokenInstruction::Burn { amount } | TokenInstruction::BurnChecked { amount, .. } => {
                let account = *ix.accounts.first()?;
                let mint = ix.account(&self.keys, 1)?;
                let decimals = match *instruction {
                    TokenInstruction::BurnChecked { decimals, .. } => decimals,
                    _ => self.decimals_of_mint(mint)?,
                };
                let authority = ix.account(&self.keys, 2).unwrap_or_default();
                Some(Transfer {
                    position,
                    source: self
                        .owner_of(account)
                        .unwrap_or_else(|| authority.to_string()),
                    destination: String::new(),
                    authority: authority.to_string(),
                    mint: mint.to_string(),
                    amount: scale_amount(amount, decimals),
                    kind: TransferKind::Burn,
                })
            }
            _ => None,
        }
    }

    /// Owning wallet of a token account: diff table first, then init scan.
    fn owner_of(&self, account_index: u8) -> Option<String> {
        if let Some(diff) = self.diffs.token(account_index)
            && !diff.owner.is_empty()
        {
            return Some(diff.owner.clone());
        }
        let address = self.keys.get(account_index)?;
        self.inits
            .get(address)
            .filter(|init| !init.owner.is_empty())
            .map(|init| init.owner.clone())
    }

    fn mint_of(&self, account_index: u8) -> Option<(String, u8)> {
        if let Some(diff) = self.diffs.token(account_index) {
            return Some((diff.mint.clone(), diff.decimals));
        }
        let address = self.keys.get(account_index)?;
        let init = self.inits.get(address)?;
        let decimals = self.decimals_of_mint(&init.mint)?;
        Some((init.mint.clone(), decimals))
    }

    /// Decimals of a mint, from any balance entry or an `InitializeMint` in the transaction.
    fn decimals_of_mint(&self, mint: &str) -> Option<u8> {
        if let Some(balance) = self
            .tx
            .post_token_balances
            .iter()
            .chain(self.tx.pre_token_balances.iter())
            .find(|balance| balance.mint == mint)
        {
            return Some(balance.decimals);
        }
        all_instructions(self.tx).find_map(|ix| {
            let program = ix.program_id(&self.keys)?;
            match decode_instruction(program, &ix.data_bytes()) {
                DecodedInstruction::Token(TokenInstruction::InitializeMint { decimals, .. })
                    if ix.account(&self.keys, 0) == Some(mint) =>
                {
                    Some(decimals)
                }
                _ => None,
            }
        })
    }
}

fn all_instructions(tx: &RawTransaction) -> impl Iterator<Item = &RawInstruction> {
    tx.instructions.iter().chain(
        tx.inner_instructions
            .iter()
            .flat_map(|group| group.instructions.iter()),
    )
}

/// Collects owner/mint for token accounts created by ATA creation or
/// `InitializeAccount*` anywhere in the transaction.
fn scan_account_inits(tx: &RawTransaction, keys: &AccountKeyTable<'_>) -> HashMap<String, AccountInit> {
    let mut inits = HashMap::new();
    for ix in all_instructions(tx) {
        let Some(program) = ix.program_id(keys) else {
            continue;
        };
        let account = |position: usize| ix.account(keys, position).map(String::from);
        let entry = match decode_instruction(program, &ix.data_bytes()) {
            DecodedInstruction::AssociatedToken(ata) if ata.creates_account() => {
                account(1).zip(account(2)).zip(account(3))
            }
            DecodedInstruction::Token(token) if token.initializes_account() => match token {
                TokenInstruction::InitializeAccount2 { owner }
                | TokenInstruction::InitializeAccount3 { owner } => account(0).zip(Some(owner)).zip(account(1)),
                _ => account(0).zip(account(2)).zip(account(1)),
            },
            _ => None,
        };
        if let Some(((address, owner), mint)) = entry {
            inits.entry(address).or_insert(AccountInit { owner, mint });
        }
    }
    inits
}
