//! Supported exchange protocols and well-known program addresses.

use serde::{Deserialize, Serialize};

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

pub const ORCA_WHIRLPOOL_PROGRAM_ID: &str = "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc";
pub const RAYDIUM_V4_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
pub const RAYDIUM_CLMM_PROGRAM_ID: &str = "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK";
pub const RAYDIUM_CPMM_PROGRAM_ID: &str = "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C";
pub const PHOENIX_PROGRAM_ID: &str = "PhoeNiXZ8ByJGLkxNfZRnkUfjvmuYqLR89jjFHGqdXY";
pub const LIFINITY_V2_PROGRAM_ID: &str = "2wT8Yq49kHgDzXuPxZSaeLaH1qbmGXtEyPy64bL7aD3c";
pub const FLUXBEAM_PROGRAM_ID: &str = "FLUXubRmkEi2q6K3Y9kBPg9248ggaZVsoSFhtJHSrm1X";
pub const METEORA_DLMM_PROGRAM_ID: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";
pub const METEORA_POOLS_PROGRAM_ID: &str = "Eo7WjKq67rjJQSZxS6z3YkapzY3eMj6Xy8X5EQVn5UaB";
pub const PUMPFUN_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";
pub const PUMPFUN_AMM_PROGRAM_ID: &str = "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA";

/// Token programs whose instructions the transfer reconstructor understands.
#[must_use]
pub fn is_token_program(program_id: &str) -> bool {
    program_id == TOKEN_PROGRAM_ID || program_id == TOKEN_2022_PROGRAM_ID
}

/// Quote assets. The empty mint (native SOL) counts as wrapped SOL.
#[must_use]
pub fn is_quote_asset(mint: &str) -> bool {
    mint.is_empty() || mint == WSOL_MINT || mint == USDC_MINT || mint == USDT_MINT
}

/// Supported exchange protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Orca,
    RaydiumV4,
    RaydiumClmm,
    RaydiumCpmm,
    Phoenix,
    Lifinity,
    Fluxbeam,
    MeteoraDlmm,
    MeteoraPools,
    PumpFun,
    PumpFunAmm,
}

impl Protocol {
    pub const ALL: [Protocol; 11] = [
        Protocol::Orca,
        Protocol::RaydiumV4,
        Protocol::RaydiumClmm,
        Protocol::RaydiumCpmm,
        Protocol::Phoenix,
        Protocol::Lifinity,
        Protocol::Fluxbeam,
        Protocol::MeteoraDlmm,
        Protocol::MeteoraPools,
        Protocol::PumpFun,
        Protocol::PumpFunAmm,
    ];

    #[must_use]
    pub fn program_id(self) -> &'static str {
        match self {
            Self::Orca => ORCA_WHIRLPOOL_PROGRAM_ID,
            Self::RaydiumV4 => RAYDIUM_V4_PROGRAM_ID,
            Self::RaydiumClmm => RAYDIUM_CLMM_PROGRAM_ID,
            Self::RaydiumCpmm => RAYDIUM_CPMM_PROGRAM_ID,
            Self::Phoenix => PHOENIX_PROGRAM_ID,
            Self::Lifinity => LIFINITY_V2_PROGRAM_ID,
            Self::Fluxbeam => FLUXBEAM_PROGRAM_ID,
            Self::MeteoraDlmm => METEORA_DLMM_PROGRAM_ID,
            Self::MeteoraPools => METEORA_POOLS_PROGRAM_ID,
            Self::PumpFun => PUMPFUN_PROGRAM_ID,
            Self::PumpFunAmm => PUMPFUN_AMM_PROGRAM_ID,
        }
    }

    /// Label stored in the `source` column of swap logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orca => "orca",
            Self::RaydiumV4 => "raydium_v4",
            Self::RaydiumClmm => "raydium_clmm",
            Self::RaydiumCpmm => "raydium_cpmm",
            Self::Phoenix => "phoenix",
            Self::Lifinity => "lifinity",
            Self::Fluxbeam => "fluxbeam",
            Self::MeteoraDlmm => "meteora_dlmm",
            Self::MeteoraPools => "meteora_pools",
            Self::PumpFun => "pumpfun",
            Self::PumpFunAmm => "pumpfun_amm",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
