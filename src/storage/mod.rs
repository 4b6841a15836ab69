//! Postgres persistence for swaps and the processed-block ledger.
//!
//! Also hosts the two fire-and-forget outlets of the pipeline: the token
//! metadata lookup queue and the websocket fan-out channel.

pub mod fanout;
pub mod metadata;

pub use fanout::ChannelBroadcaster;
pub use metadata::{ChannelMetadataQueue, MetadataWriter, drain_pending};

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;

use crate::types::swap::SwapLog;
use crate::types::traits::SwapRepository;
use crate::utils::error::Result;

/// Rows per multi-row insert; 11 binds each stays under the bind limit.
const INSERT_CHUNK: usize = 1_000;

fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Swap repository backed by a `PostgreSQL` connection pool.
///
/// # Example
///
/// ```no_run
/// use solana_swap_indexer::PgRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let repository = PgRepository::connect("postgresql://localhost/swaps", 10).await?;
/// repository.initialize().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// Returns `SwapIndexerError::DatabaseError` if connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `processed_blocks`, `swap_logs` and `token_metadata_queue`
    /// tables.
    ///
    /// # Errors
    ///
    /// Returns `SwapIndexerError::DatabaseError` if migration fails.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS processed_blocks (
                block_number BIGINT PRIMARY KEY,
                processed_at TIMESTAMPTZ DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS swap_logs (
                id TEXT NOT NULL,
                wallet TEXT NOT NULL,
                source TEXT NOT NULL,
                block_number BIGINT NOT NULL,
                timestamp BIGINT NOT NULL,
                type TEXT NOT NULL,
                pair TEXT NOT NULL,
                token TEXT NOT NULL,
                amount_in NUMERIC NOT NULL,
                amount_out NUMERIC NOT NULL,
                processed BOOLEAN NOT NULL DEFAULT FALSE,
                PRIMARY KEY (id, pair, type, amount_in, amount_out, block_number, timestamp)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_swap_logs_wallet ON swap_logs(wallet)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS token_metadata_queue (
                address TEXT PRIMARY KEY,
                queued_at TIMESTAMPTZ DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Queues addresses for the metadata service; duplicates are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SwapIndexerError::DatabaseError` if the insert fails.
    pub async fn enqueue_metadata(&self, addresses: &[String]) -> Result<()> {
        if addresses.is_empty() {
            return Ok(());
        }
        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO token_metadata_queue (address) ");
        builder.push_values(addresses, |mut row, address| {
            row.push_bind(address);
        });
        builder.push(" ON CONFLICT DO NOTHING");
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SwapRepository for PgRepository {
    async fn mark_block_processed(&self, block_number: u64) -> Result<()> {
        sqlx::query("INSERT INTO processed_blocks (block_number) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(to_db(block_number))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Writes all swaps in one database transaction.
    async fn insert_swaps(&self, swaps: &[SwapLog]) -> Result<()> {
        if swaps.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in swaps.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO swap_logs (id, wallet, source, block_number, timestamp, type, pair, token, amount_in, amount_out, processed) ",
            );
            builder.push_values(chunk, |mut row, swap| {
                row.push_bind(&swap.id)
                    .push_bind(&swap.wallet)
                    .push_bind(&swap.source)
                    .push_bind(to_db(swap.block_number))
                    .push_bind(swap.timestamp)
                    .push_bind(swap.action.as_str())
                    .push_bind(&swap.pair)
                    .push_bind(&swap.token)
                    .push_bind(swap.amount_in.clone())
                    .push_bind(swap.amount_out.clone())
                    .push_bind(swap.processed);
            });
            builder.push(" ON CONFLICT DO NOTHING");
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_swaps_using_tx(&self, signature: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM swap_logs WHERE id = $1")
            .bind(signature)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_missing_blocks(&self) -> Result<Vec<u64>> {
        let missing = sqlx::query_scalar::<_, i64>(
            r"
            SELECT s.block_number
            FROM generate_series(
                (SELECT MIN(block_number) FROM processed_blocks),
                (SELECT MAX(block_number) FROM processed_blocks)
            ) AS s(block_number)
            LEFT JOIN processed_blocks p ON p.block_number = s.block_number
            WHERE p.block_number IS NULL
            ORDER BY s.block_number
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(missing
            .into_iter()
            .filter_map(|block| u64::try_from(block).ok())
            .collect())
    }
}
