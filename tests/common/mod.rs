//! Shared fixtures and in-process collaborators for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use solana_sdk::signature::Signature;
use solana_swap_indexer::types::events::EVENT_CPI_TAG;
use solana_swap_indexer::types::protocol::{
    PUMPFUN_PROGRAM_ID, RAYDIUM_V4_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID, USDC_MINT,
};
use solana_swap_indexer::types::transaction::{InnerInstructionGroup, RawInstruction, TokenBalance};
use solana_swap_indexer::{
    Delivery, EventDiscriminator, PumpTradeEvent, RawTransaction, Result, RpcProvider, SwapIndexerError,
    SwapLog, SwapRepository, WorkItem, WorkQueue,
};
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiConfirmedBlock};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};

pub const USER: &str = "User111111111111111111111111111111111111111";
pub const POOL: &str = "Poo1111111111111111111111111111111111111111";
pub const USER_ATA: &str = "UserAta111111111111111111111111111111111111";
pub const VAULT: &str = "Vau1t11111111111111111111111111111111111111";
pub const MINT: &str = "Mint111111111111111111111111111111111111111";
pub const CURVE: &str = "Curve11111111111111111111111111111111111111";
pub const ROUTER: &str = "Router1111111111111111111111111111111111111";
pub const POOL_B: &str = "Poo2B111111111111111111111111111111111111111";
pub const VAULT_B: &str = "Vau1tB11111111111111111111111111111111111111";
pub const MINT_B: &str = "MintB111111111111111111111111111111111111111";
pub const USER_ATA_B: &str = "UserAtaB11111111111111111111111111111111111";
pub const USER_QUOTE_ATA: &str = "UserUsdc1111111111111111111111111111111111111";
pub const QUOTE_VAULT: &str = "Poo1Usdc1111111111111111111111111111111111111";

pub const PUMP_MINT_BYTES: [u8; 32] = [7; 32];
pub const PUMP_USER_BYTES: [u8; 32] = [9; 32];

fn instruction(program: u8, accounts: Vec<u8>, data: &[u8], stack_height: Option<u32>) -> RawInstruction {
    RawInstruction {
        program_id_index: program,
        accounts,
        data: bs58::encode(data).into_string(),
        stack_height,
    }
}

fn token_balance(index: u8, owner: &str, amount: u64) -> TokenBalance {
    token_balance_of(MINT, index, owner, amount)
}

fn token_balance_of(mint: &str, index: u8, owner: &str, amount: u64) -> TokenBalance {
    TokenBalance {
        account_index: index,
        mint: mint.to_string(),
        owner: owner.to_string(),
        amount: amount.to_string(),
        decimals: 6,
    }
}

fn system_transfer(lamports: u64) -> Vec<u8> {
    let mut data = 2u32.to_le_bytes().to_vec();
    data.extend_from_slice(&lamports.to_le_bytes());
    data
}

fn token_transfer(amount: u64) -> Vec<u8> {
    let mut data = vec![3u8];
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

fn keys(addresses: &[&str]) -> Vec<String> {
    addresses.iter().map(ToString::to_string).collect()
}

/// `accounts` followed by `filler` up to `len` entries.
pub fn padded(mut accounts: Vec<u8>, len: usize, filler: u8) -> Vec<u8> {
    accounts.resize(len, filler);
    accounts
}

/// A wallet pays 25 USDC for 50 MINT through `program_id`.
///
/// keys: 0 user, 1 pool, 2 user ata, 3 vault, 4 mint, 5 system, 6 token,
/// 7 program, 8 user usdc ata, 9 pool usdc vault
///
/// With `leading_fee` the swap first moves 5000 lamports from the user to
/// the pool, the way Meteora charges its bookkeeping.
pub fn usdc_buy(signature: &str, program_id: &str, swap_accounts: Vec<u8>, leading_fee: bool) -> RawTransaction {
    let mut inner = Vec::new();
    if leading_fee {
        inner.push(instruction(5, vec![0, 1], &system_transfer(5_000), Some(2)));
    }
    inner.push(instruction(6, vec![8, 9, 0], &token_transfer(25_000_000), Some(2)));
    inner.push(instruction(6, vec![3, 2, 1], &token_transfer(50_000_000), Some(2)));

    RawTransaction {
        signature: signature.to_string(),
        account_keys: keys(&[
            USER,
            POOL,
            USER_ATA,
            VAULT,
            MINT,
            SYSTEM_PROGRAM_ID,
            TOKEN_PROGRAM_ID,
            program_id,
            USER_QUOTE_ATA,
            QUOTE_VAULT,
        ]),
        loaded_writable: vec![],
        loaded_readonly: vec![],
        instructions: vec![instruction(7, swap_accounts, &[9, 4, 4], None)],
        inner_instructions: vec![InnerInstructionGroup {
            index: 0,
            instructions: inner,
        }],
        pre_balances: vec![],
        post_balances: vec![],
        pre_token_balances: vec![
            token_balance(2, USER, 0),
            token_balance(3, POOL, 100_000_000),
            token_balance_of(USDC_MINT, 8, USER, 25_000_000),
            token_balance_of(USDC_MINT, 9, POOL, 0),
        ],
        post_token_balances: vec![
            token_balance(2, USER, 50_000_000),
            token_balance(3, POOL, 50_000_000),
            token_balance_of(USDC_MINT, 8, USER, 0),
            token_balance_of(USDC_MINT, 9, POOL, 25_000_000),
        ],
    }
}

/// An aggregator routes two Raydium V4 swaps in one top-level instruction:
/// 1 SOL for 50 MINT on POOL, then 2 SOL for 70 MINT_B on POOL_B.
///
/// keys: 0 user, 1 pool, 2 user ata, 3 vault, 4 mint, 5 system, 6 token,
/// 7 raydium, 8 router, 9 pool b, 10 vault b, 11 mint b, 12 user ata b
///
/// Without `stack_heights` the node reported no invocation depth.
pub fn routed_raydium_swaps(signature: &str, stack_heights: bool) -> RawTransaction {
    let swap = if stack_heights { Some(2) } else { None };
    let leg = if stack_heights { Some(3) } else { None };

    RawTransaction {
        signature: signature.to_string(),
        account_keys: keys(&[
            USER,
            POOL,
            USER_ATA,
            VAULT,
            MINT,
            SYSTEM_PROGRAM_ID,
            TOKEN_PROGRAM_ID,
            RAYDIUM_V4_PROGRAM_ID,
            ROUTER,
            POOL_B,
            VAULT_B,
            MINT_B,
            USER_ATA_B,
        ]),
        loaded_writable: vec![],
        loaded_readonly: vec![],
        instructions: vec![instruction(8, vec![0, 7, 1, 9], &[0xe5, 0x17], None)],
        inner_instructions: vec![InnerInstructionGroup {
            index: 0,
            instructions: vec![
                instruction(7, padded(vec![6, 1], 18, 3), &[9, 1, 2, 3], swap),
                instruction(5, vec![0, 1], &system_transfer(1_000_000_000), leg),
                instruction(6, vec![3, 2, 1], &token_transfer(50_000_000), leg),
                instruction(7, padded(vec![6, 9], 18, 10), &[9, 4, 5, 6], swap),
                instruction(5, vec![0, 9], &system_transfer(2_000_000_000), leg),
                instruction(6, vec![10, 12, 9], &token_transfer(70_000_000), leg),
            ],
        }],
        pre_balances: vec![],
        post_balances: vec![],
        pre_token_balances: vec![
            token_balance(2, USER, 0),
            token_balance(3, POOL, 100_000_000),
            token_balance_of(MINT_B, 10, POOL_B, 90_000_000),
            token_balance_of(MINT_B, 12, USER, 0),
        ],
        post_token_balances: vec![
            token_balance(2, USER, 50_000_000),
            token_balance(3, POOL, 50_000_000),
            token_balance_of(MINT_B, 10, POOL_B, 20_000_000),
            token_balance_of(MINT_B, 12, USER, 70_000_000),
        ],
    }
}

/// A wallet buys 50 MINT for 1 SOL through a Raydium V4 swap.
///
/// keys: 0 user, 1 pool, 2 user ata, 3 vault, 4 mint, 5 system, 6 token, 7 raydium
pub fn raydium_v4_buy(signature: &str) -> RawTransaction {
    let mut swap_accounts = vec![6, 1];
    swap_accounts.resize(18, 3);

    let mut native = 2u32.to_le_bytes().to_vec();
    native.extend_from_slice(&1_000_000_000u64.to_le_bytes());
    let mut token = vec![3u8];
    token.extend_from_slice(&50_000_000u64.to_le_bytes());

    RawTransaction {
        signature: signature.to_string(),
        account_keys: [
            USER,
            POOL,
            USER_ATA,
            VAULT,
            MINT,
            SYSTEM_PROGRAM_ID,
            TOKEN_PROGRAM_ID,
            RAYDIUM_V4_PROGRAM_ID,
        ]
        .iter()
        .map(ToString::to_string)
        .collect(),
        loaded_writable: vec![],
        loaded_readonly: vec![],
        instructions: vec![instruction(7, swap_accounts, &[9, 1, 2, 3], None)],
        inner_instructions: vec![InnerInstructionGroup {
            index: 0,
            instructions: vec![
                instruction(5, vec![0, 1], &native, Some(2)),
                instruction(6, vec![3, 2, 1], &token, Some(2)),
            ],
        }],
        pre_balances: vec![],
        post_balances: vec![],
        pre_token_balances: vec![token_balance(2, USER, 0), token_balance(3, POOL, 100_000_000)],
        post_token_balances: vec![
            token_balance(2, USER, 50_000_000),
            token_balance(3, POOL, 50_000_000),
        ],
    }
}

pub fn pump_event(is_buy: bool) -> PumpTradeEvent {
    PumpTradeEvent {
        mint: PUMP_MINT_BYTES,
        sol_amount: 2_000_000_000,
        token_amount: 35_000_000,
        is_buy,
        user: PUMP_USER_BYTES,
    }
}

/// A PumpFun bonding-curve trade whose only trace is the self-invoked event.
///
/// keys: 0 user, 1 global, 2 fee, 3 curve, 4 mint, 5 pumpfun
pub fn pumpfun_trade(signature: &str, is_buy: bool) -> RawTransaction {
    let mut event = EVENT_CPI_TAG.to_vec();
    event.extend_from_slice(&PumpTradeEvent::discriminator());
    event.extend_from_slice(&borsh::to_vec(&pump_event(is_buy)).unwrap_or_default());

    RawTransaction {
        signature: signature.to_string(),
        account_keys: [
            USER,
            "G1oba111111111111111111111111111111111111111",
            "Fee1111111111111111111111111111111111111111",
            CURVE,
            MINT,
            PUMPFUN_PROGRAM_ID,
        ]
        .iter()
        .map(ToString::to_string)
        .collect(),
        loaded_writable: vec![],
        loaded_readonly: vec![],
        instructions: vec![instruction(5, vec![1, 2, 4, 3, 0], &[0x66, 0x06, 0x3d, 0x12], None)],
        inner_instructions: vec![InnerInstructionGroup {
            index: 0,
            instructions: vec![instruction(5, vec![], &event, Some(2))],
        }],
        pre_balances: vec![],
        post_balances: vec![],
        pre_token_balances: vec![],
        post_token_balances: vec![],
    }
}

/// A PumpFun buy reached through an aggregator. The curve's token and SOL
/// movements precede the event inside the PumpFun invocation.
///
/// keys: 0 user, 1 global, 2 fee, 3 curve, 4 mint, 5 pumpfun, 6 router,
/// 7 system, 8 token, 9 user ata, 10 curve ata
pub fn routed_pumpfun_buy(signature: &str) -> RawTransaction {
    let mint = bs58::encode(PUMP_MINT_BYTES).into_string();
    let user = bs58::encode(PUMP_USER_BYTES).into_string();
    let mut event = EVENT_CPI_TAG.to_vec();
    event.extend_from_slice(&PumpTradeEvent::discriminator());
    event.extend_from_slice(&borsh::to_vec(&pump_event(true)).unwrap_or_default());

    RawTransaction {
        signature: signature.to_string(),
        account_keys: keys(&[
            user.as_str(),
            "G1oba111111111111111111111111111111111111111",
            "Fee1111111111111111111111111111111111111111",
            CURVE,
            mint.as_str(),
            PUMPFUN_PROGRAM_ID,
            ROUTER,
            SYSTEM_PROGRAM_ID,
            TOKEN_PROGRAM_ID,
            USER_ATA,
            VAULT,
        ]),
        loaded_writable: vec![],
        loaded_readonly: vec![],
        instructions: vec![instruction(6, vec![0, 5, 3], &[0xe5, 0x17], None)],
        inner_instructions: vec![InnerInstructionGroup {
            index: 0,
            instructions: vec![
                instruction(5, vec![1, 2, 4, 3, 0], &[0x66, 0x06, 0x3d, 0x12], Some(2)),
                instruction(8, vec![10, 9, 3], &token_transfer(35_000_000), Some(3)),
                instruction(7, vec![0, 3], &system_transfer(2_000_000_000), Some(3)),
                instruction(5, vec![], &event, Some(3)),
            ],
        }],
        pre_balances: vec![],
        post_balances: vec![],
        pre_token_balances: vec![
            token_balance_of(&mint, 9, &user, 0),
            token_balance_of(&mint, 10, CURVE, 100_000_000),
        ],
        post_token_balances: vec![
            token_balance_of(&mint, 9, &user, 35_000_000),
            token_balance_of(&mint, 10, CURVE, 65_000_000),
        ],
    }
}

fn balance_json(balance: &TokenBalance) -> Value {
    json!({
        "accountIndex": balance.account_index,
        "mint": balance.mint,
        "owner": balance.owner,
        "uiTokenAmount": {
            "uiAmount": null,
            "decimals": balance.decimals,
            "amount": balance.amount,
            "uiAmountString": balance.amount
        }
    })
}

fn instruction_json(ix: &RawInstruction) -> Value {
    json!({
        "programIdIndex": ix.program_id_index,
        "accounts": ix.accounts,
        "data": ix.data,
        "stackHeight": ix.stack_height
    })
}

/// JSON encoding of `tx` as the node returns it inside a block.
pub fn encoded_transaction(tx: &RawTransaction, failed: bool) -> Value {
    let err = if failed {
        json!({ "InstructionError": [0, "InvalidAccountData"] })
    } else {
        Value::Null
    };
    json!({
        "transaction": {
            "signatures": [tx.signature],
            "message": {
                "header": {
                    "numRequiredSignatures": 1,
                    "numReadonlySignedAccounts": 0,
                    "numReadonlyUnsignedAccounts": 1
                },
                "accountKeys": tx.account_keys,
                "recentBlockhash": "11111111111111111111111111111111",
                "instructions": tx.instructions.iter().map(instruction_json).collect::<Vec<_>>()
            }
        },
        "meta": {
            "err": err,
            "status": { "Ok": null },
            "fee": 5000,
            "preBalances": tx.pre_balances,
            "postBalances": tx.post_balances,
            "innerInstructions": tx.inner_instructions.iter().map(|group| json!({
                "index": group.index,
                "instructions": group.instructions.iter().map(instruction_json).collect::<Vec<_>>()
            })).collect::<Vec<_>>(),
            "preTokenBalances": tx.pre_token_balances.iter().map(balance_json).collect::<Vec<_>>(),
            "postTokenBalances": tx.post_token_balances.iter().map(balance_json).collect::<Vec<_>>(),
            "loadedAddresses": { "writable": tx.loaded_writable, "readonly": tx.loaded_readonly }
        },
        "version": 0
    })
}

/// A block holding `transactions`; the flag marks a failed transaction.
pub fn block(slot: u64, transactions: &[(RawTransaction, bool)]) -> UiConfirmedBlock {
    serde_json::from_value(block_json(slot, transactions)).expect("valid block fixture")
}

pub fn block_json(slot: u64, transactions: &[(RawTransaction, bool)]) -> Value {
    json!({
        "previousBlockhash": "11111111111111111111111111111111",
        "blockhash": "11111111111111111111111111111111",
        "parentSlot": slot.saturating_sub(1),
        "transactions": transactions
            .iter()
            .map(|(tx, failed)| encoded_transaction(tx, *failed))
            .collect::<Vec<_>>(),
        "blockTime": 1_700_000_000,
        "blockHeight": slot
    })
}

/// Records every repository call; `fail_inserts` failures precede success.
#[derive(Default)]
pub struct MockRepository {
    pub swaps: Mutex<Vec<SwapLog>>,
    pub processed: Mutex<BTreeSet<u64>>,
    pub deleted: Mutex<Vec<String>>,
    pub insert_calls: AtomicUsize,
    pub fail_inserts: AtomicUsize,
}

impl MockRepository {
    pub fn failing(times: usize) -> Self {
        let repository = Self::default();
        repository.fail_inserts.store(times, Ordering::SeqCst);
        repository
    }

    pub fn swaps(&self) -> Vec<SwapLog> {
        self.swaps.lock().unwrap().clone()
    }

    pub fn processed(&self) -> Vec<u64> {
        self.processed.lock().unwrap().iter().copied().collect()
    }
}

#[async_trait]
impl SwapRepository for MockRepository {
    async fn mark_block_processed(&self, block_number: u64) -> Result<()> {
        self.processed.lock().unwrap().insert(block_number);
        Ok(())
    }

    async fn insert_swaps(&self, swaps: &[SwapLog]) -> Result<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_inserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_inserts.store(remaining - 1, Ordering::SeqCst);
            return Err(SwapIndexerError::ConnectionError("database unavailable".into()));
        }
        let mut stored = self.swaps.lock().unwrap();
        for swap in swaps {
            if !stored.contains(swap) {
                stored.push(swap.clone());
            }
        }
        Ok(())
    }

    async fn delete_swaps_using_tx(&self, signature: &str) -> Result<u64> {
        self.deleted.lock().unwrap().push(signature.to_string());
        let mut stored = self.swaps.lock().unwrap();
        let before = stored.len();
        stored.retain(|swap| swap.id != signature);
        Ok((before - stored.len()) as u64)
    }

    async fn find_missing_blocks(&self) -> Result<Vec<u64>> {
        let processed = self.processed.lock().unwrap();
        let (Some(&low), Some(&high)) = (processed.first(), processed.last()) else {
            return Ok(Vec::new());
        };
        Ok((low..=high).filter(|block| !processed.contains(block)).collect())
    }
}

/// Serves canned blocks. Unknown slots are skipped slots; `down` slots fail.
#[derive(Default)]
pub struct MockRpc {
    pub blocks: HashMap<u64, UiConfirmedBlock>,
    pub down: HashSet<u64>,
    pub tip: u64,
    pub block_calls: AtomicUsize,
}

impl MockRpc {
    pub fn with_block(mut self, slot: u64, block: UiConfirmedBlock) -> Self {
        self.blocks.insert(slot, block);
        self
    }
}

#[async_trait]
impl RpcProvider for MockRpc {
    async fn get_transaction(&self, signature: &Signature) -> Result<EncodedConfirmedTransactionWithStatusMeta> {
        Err(SwapIndexerError::RpcError(format!("no transaction {signature}")))
    }

    async fn get_block(&self, slot: u64) -> Result<UiConfirmedBlock> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        if self.down.contains(&slot) {
            return Err(SwapIndexerError::NodeUnavailable {
                attempts: 4,
                last_error: "connection refused".into(),
            });
        }
        self.blocks
            .get(&slot)
            .cloned()
            .ok_or(SwapIndexerError::BlockNotFound(slot))
    }

    async fn get_slot(&self) -> Result<u64> {
        Ok(self.tip)
    }
}

/// A queue whose depth never changes and which never delivers.
pub struct FixedDepthQueue {
    pub depth: u64,
    pub prefetch: AtomicU16,
    pub prefetch_calls: AtomicUsize,
    pub published: Mutex<Vec<WorkItem>>,
}

impl FixedDepthQueue {
    pub fn new(depth: u64) -> Self {
        Self {
            depth,
            prefetch: AtomicU16::new(0),
            prefetch_calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WorkQueue for FixedDepthQueue {
    async fn publish(&self, item: &WorkItem) -> Result<()> {
        self.published.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn consume(&self) -> Result<Delivery> {
        std::future::pending().await
    }

    async fn ack(&self, _tag: u64) -> Result<()> {
        Ok(())
    }

    async fn nack(&self, _tag: u64, _requeue: bool) -> Result<()> {
        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        Ok(self.depth)
    }

    async fn set_prefetch(&self, prefetch: u16) -> Result<()> {
        self.prefetch_calls.fetch_add(1, Ordering::SeqCst);
        self.prefetch.store(prefetch, Ordering::SeqCst);
        Ok(())
    }

    async fn reconnect(&self) -> Result<()> {
        Ok(())
    }
}
