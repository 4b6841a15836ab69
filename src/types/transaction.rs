//! Raw ledger transaction model.
//!
//! `RawTransaction` is the worker-owned, immutable copy of one transaction as
//! returned by the node in JSON encoding. Everything downstream (transfer
//! reconstruction, swap matching) reads from it and never mutates it.

use serde::{Deserialize, Serialize};
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedTransaction, EncodedTransactionWithStatusMeta, UiInstruction, UiLoadedAddresses,
    UiMessage, UiTransactionTokenBalance,
};
use std::ops::Range;

use crate::utils::error::SwapIndexerError;

/// One compiled instruction. `data` stays base58 as delivered by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: String,
    #[serde(default)]
    pub stack_height: Option<u32>,
}

impl RawInstruction {
    /// Decoded instruction payload; garbled base58 yields an empty buffer.
    #[must_use]
    pub fn data_bytes(&self) -> Vec<u8> {
        bs58::decode(&self.data).into_vec().unwrap_or_default()
    }

    /// Program address, resolved through the key table.
    #[must_use]
    pub fn program_id<'a>(&self, keys: &AccountKeyTable<'a>) -> Option<&'a str> {
        keys.get(self.program_id_index)
    }

    /// Address of the `position`-th account this instruction references.
    #[must_use]
    pub fn account<'a>(&self, keys: &AccountKeyTable<'a>, position: usize) -> Option<&'a str> {
        self.accounts.get(position).and_then(|&index| keys.get(index))
    }
}

/// Inner instructions emitted while executing top-level instruction `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerInstructionGroup {
    pub index: u8,
    pub instructions: Vec<RawInstruction>,
}

/// A token-account balance snapshot; `amount` is the raw integer string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub account_index: u8,
    pub mint: String,
    pub owner: String,
    pub amount: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub signature: String,
    pub account_keys: Vec<String>,
    #[serde(default)]
    pub loaded_writable: Vec<String>,
    #[serde(default)]
    pub loaded_readonly: Vec<String>,
    pub instructions: Vec<RawInstruction>,
    #[serde(default)]
    pub inner_instructions: Vec<InnerInstructionGroup>,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub pre_token_balances: Vec<TokenBalance>,
    #[serde(default)]
    pub post_token_balances: Vec<TokenBalance>,
}

impl RawTransaction {
    /// Builds the account key table. Called fresh on every use.
    #[must_use]
    pub fn account_key_table(&self) -> AccountKeyTable<'_> {
        AccountKeyTable::new(self)
    }

    /// Inner instructions nested under top-level instruction `outer`.
    #[must_use]
    pub fn inner_instructions_for(&self, outer: usize) -> &[RawInstruction] {
        self.inner_instructions
            .iter()
            .find(|group| usize::from(group.index) == outer)
            .map_or(&[], |group| group.instructions.as_slice())
    }
}

/// Static keys, then loaded writable keys, then loaded readonly keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKeyTable<'a> {
    keys: Vec<&'a str>,
}

impl<'a> AccountKeyTable<'a> {
    #[must_use]
    pub fn new(tx: &'a RawTransaction) -> Self {
        let keys = tx
            .account_keys
            .iter()
            .chain(tx.loaded_writable.iter())
            .chain(tx.loaded_readonly.iter())
            .map(String::as_str)
            .collect();
        Self { keys }
    }

    #[must_use]
    pub fn get(&self, index: u8) -> Option<&'a str> {
        self.keys.get(usize::from(index)).copied()
    }

    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.keys.iter().any(|key| *key == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.keys.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Parent links of one inner-instruction group, derived from stack heights.
///
/// Built iteratively with an index stack: each instruction's parent is the
/// nearest earlier instruction with a strictly smaller stack height. Groups
/// without stack heights (older nodes) have no parent links at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationTree {
    parents: Vec<Option<usize>>,
    heights: Vec<Option<u32>>,
}

impl InvocationTree {
    #[must_use]
    pub fn build(instructions: &[RawInstruction]) -> Self {
        let mut parents = Vec::with_capacity(instructions.len());
        let mut heights = Vec::with_capacity(instructions.len());
        let mut stack: Vec<(usize, u32)> = Vec::new();

        for (index, instruction) in instructions.iter().enumerate() {
            heights.push(instruction.stack_height);
            let Some(height) = instruction.stack_height else {
                parents.push(None);
                continue;
            };
            while stack.last().is_some_and(|&(_, top)| top >= height) {
                stack.pop();
            }
            parents.push(stack.last().map(|&(parent, _)| parent));
            stack.push((index, height));
        }

        Self { parents, heights }
    }

    #[must_use]
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Indices of the instructions invoked (directly or transitively) by `index`.
    ///
    /// Without stack height information the rest of the group is assumed.
    #[must_use]
    pub fn descendants(&self, index: usize) -> Range<usize> {
        let len = self.parents.len();
        let start = (index + 1).min(len);
        if self.heights.get(index).copied().flatten().is_none() {
            return start..len;
        }
        let mut end = start;
        while end < len && self.is_descendant(end, index) {
            end += 1;
        }
        start..end
    }

    fn is_descendant(&self, mut index: usize, ancestor: usize) -> bool {
        while let Some(parent) = self.parent(index) {
            if parent == ancestor {
                return true;
            }
            index = parent;
        }
        false
    }
}

/// `true` when status metadata is present and reports no error.
#[must_use]
pub fn transaction_succeeded(tx: &EncodedTransactionWithStatusMeta) -> bool {
    tx.meta.as_ref().is_some_and(|meta| meta.err.is_none())
}

fn option_vec<T: Clone>(value: &OptionSerializer<Vec<T>>) -> Vec<T> {
    Option::<&Vec<T>>::from(value.as_ref())
        .cloned()
        .unwrap_or_default()
}

fn token_balances(balances: &OptionSerializer<Vec<UiTransactionTokenBalance>>) -> Vec<TokenBalance> {
    option_vec(balances)
        .into_iter()
        .map(|b| TokenBalance {
            account_index: b.account_index,
            owner: Option::<String>::from(b.owner).unwrap_or_default(),
            mint: b.mint,
            amount: b.ui_token_amount.amount,
            decimals: b.ui_token_amount.decimals,
        })
        .collect()
}

impl TryFrom<&EncodedTransactionWithStatusMeta> for RawTransaction {
    type Error = SwapIndexerError;

    fn try_from(value: &EncodedTransactionWithStatusMeta) -> Result<Self, Self::Error> {
        let EncodedTransaction::Json(ui_tx) = &value.transaction else {
            return Err(SwapIndexerError::DecodingError(
                "transaction is not JSON encoded".to_string(),
            ));
        };
        let UiMessage::Raw(message) = &ui_tx.message else {
            return Err(SwapIndexerError::DecodingError(
                "parsed messages are not supported".to_string(),
            ));
        };
        let signature = ui_tx
            .signatures
            .first()
            .cloned()
            .ok_or_else(|| SwapIndexerError::DecodingError("transaction has no signature".into()))?;
        let meta = value.meta.as_ref().ok_or_else(|| {
            SwapIndexerError::DecodingError(format!("transaction {signature} has no status meta"))
        })?;

        let (loaded_writable, loaded_readonly) =
            match Option::<&UiLoadedAddresses>::from(meta.loaded_addresses.as_ref()) {
                Some(loaded) => (loaded.writable.clone(), loaded.readonly.clone()),
                None => (Vec::new(), Vec::new()),
            };

        let instructions = message
            .instructions
            .iter()
            .map(|ix| RawInstruction {
                program_id_index: ix.program_id_index,
                accounts: ix.accounts.clone(),
                data: ix.data.clone(),
                stack_height: ix.stack_height,
            })
            .collect();

        let inner_instructions = option_vec(&meta.inner_instructions)
            .into_iter()
            .map(|group| InnerInstructionGroup {
                index: group.index,
                instructions: group
                    .instructions
                    .into_iter()
                    .filter_map(|ix| match ix {
                        UiInstruction::Compiled(ix) => Some(RawInstruction {
                            program_id_index: ix.program_id_index,
                            accounts: ix.accounts,
                            data: ix.data,
                            stack_height: ix.stack_height,
                        }),
                        UiInstruction::Parsed(_) => None,
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            signature,
            account_keys: message.account_keys.clone(),
            loaded_writable,
            loaded_readonly,
            instructions,
            inner_instructions,
            pre_balances: meta.pre_balances.clone(),
            post_balances: meta.post_balances.clone(),
            pre_token_balances: token_balances(&meta.pre_token_balances),
            post_token_balances: token_balances(&meta.post_token_balances),
        })
    }
}
