//! Postgres swap store
//!
//! Status transitions run inside a transaction with the affected rows locked
//! (`SELECT ... FOR UPDATE`), so concurrent admin calls on the same key are
//! serialized by the database.

use async_trait::async_trait;
use eyre::WrapErr;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::debug;

use super::{
    big_value_target, check_reswap, manual_target, now_unix, reverify_target, StoreError,
    SwapKey, SwapRecord, SwapResultRecord, SwapStore,
};
use crate::types::{SwapDirection, SwapStatus, SwapType};

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> eyre::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .wrap_err("Failed to connect to database")
}

/// Run pending migrations (uses the migration files in migrations/)
pub async fn run_migrations(pool: &PgPool) -> eyre::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("Failed to run database migrations")?;
    Ok(())
}

const SWAP_COLUMNS: &str = "txid, pair_id, bind, tx_to, tx_type, for_native, for_underlying, \
     token, path, amount_out_min, from_chain_id, to_chain_id, log_index, status, timestamp, memo";

const RESULT_COLUMNS: &str = "txid, pair_id, bind, tx_to, tx_height, tx_time, from_address, \
     to_address, value, for_native, for_underlying, token, path, amount_out_min, from_chain_id, \
     to_chain_id, log_index, swap_tx, old_swap_txs, swap_height, swap_time, swap_value, swap_type, \
     swap_nonce, status, timestamp, memo";

/// Swap store backed by Postgres
#[derive(Clone)]
pub struct PgSwapStore {
    pool: PgPool,
}

impl PgSwapStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lock a swap row and return its current status
    async fn lock_swap_status(
        tx: &mut Transaction<'_, Postgres>,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<SwapStatus, StoreError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"SELECT status FROM swaps
               WHERE direction = $1 AND txid = $2 AND pair_id = $3 AND bind = $4
               FOR UPDATE"#,
        )
        .bind(direction.as_str())
        .bind(&key.txid)
        .bind(&key.pair_id)
        .bind(&key.bind)
        .fetch_optional(&mut **tx)
        .await?;

        let (raw,) = row.ok_or_else(|| StoreError::NotFound {
            direction,
            key: key.clone(),
        })?;
        decode_status(key, raw)
    }

    async fn update_swap_status(
        tx: &mut Transaction<'_, Postgres>,
        direction: SwapDirection,
        key: &SwapKey,
        status: SwapStatus,
        memo: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE swaps SET status = $1, timestamp = $2, memo = COALESCE($3, memo)
               WHERE direction = $4 AND txid = $5 AND pair_id = $6 AND bind = $7"#,
        )
        .bind(i32::from(status))
        .bind(now_unix())
        .bind(memo)
        .bind(direction.as_str())
        .bind(&key.txid)
        .bind(&key.pair_id)
        .bind(&key.bind)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Lock a result row, if one exists
    async fn lock_swap_result(
        tx: &mut Transaction<'_, Postgres>,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<Option<SwapResultRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM swap_results WHERE direction = $1 AND txid = $2 AND pair_id = $3 AND bind = $4 FOR UPDATE",
            RESULT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(direction.as_str())
            .bind(&key.txid)
            .bind(&key.pair_id)
            .bind(&key.bind)
            .fetch_optional(&mut **tx)
            .await?;
        row.as_ref().map(result_from_row).transpose()
    }

    /// Shared body of the single-row status transitions
    async fn transition(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        target: impl FnOnce(SwapStatus) -> Result<SwapStatus, StoreError> + Send,
        memo: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_swap_status(&mut tx, direction, key).await?;
        let status = target(current)?;
        if status != current || memo.is_some() {
            Self::update_swap_status(&mut tx, direction, key, status, memo).await?;
            debug!(key = %key, from = %current, to = %status, "Swap status updated");
        }
        tx.commit().await?;
        Ok(())
    }
}

fn decode_status(key: &SwapKey, raw: i32) -> Result<SwapStatus, StoreError> {
    SwapStatus::try_from(raw).map_err(|v| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("unknown status {}", v),
    })
}

fn decode_swap_type(key: &SwapKey, raw: i32) -> Result<SwapType, StoreError> {
    u32::try_from(raw)
        .ok()
        .and_then(|v| SwapType::try_from(v).ok())
        .ok_or_else(|| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("unknown swap type {}", raw),
        })
}

/// Decode a non-negative integer column
fn decode_unsigned<T, U>(key: &SwapKey, column: &str, raw: T) -> Result<U, StoreError>
where
    T: Copy + std::fmt::Display,
    U: TryFrom<T>,
{
    U::try_from(raw).map_err(|_| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("{} out of range: {}", column, raw),
    })
}

fn swap_from_row(row: &PgRow) -> Result<SwapRecord, StoreError> {
    let key = SwapKey {
        txid: row.try_get("txid")?,
        pair_id: row.try_get("pair_id")?,
        bind: row.try_get("bind")?,
    };
    let tx_type = decode_swap_type(&key, row.try_get("tx_type")?)?;
    let status = decode_status(&key, row.try_get("status")?)?;
    Ok(SwapRecord {
        tx_to: row.try_get("tx_to")?,
        tx_type,
        for_native: row.try_get("for_native")?,
        for_underlying: row.try_get("for_underlying")?,
        token: row.try_get("token")?,
        path: row.try_get("path")?,
        amount_out_min: row.try_get("amount_out_min")?,
        from_chain_id: row.try_get("from_chain_id")?,
        to_chain_id: row.try_get("to_chain_id")?,
        log_index: decode_unsigned::<i32, u32>(&key, "log_index", row.try_get("log_index")?)?,
        status,
        timestamp: row.try_get("timestamp")?,
        memo: row.try_get("memo")?,
        key,
    })
}

fn result_from_row(row: &PgRow) -> Result<SwapResultRecord, StoreError> {
    let key = SwapKey {
        txid: row.try_get("txid")?,
        pair_id: row.try_get("pair_id")?,
        bind: row.try_get("bind")?,
    };
    let swap_type = decode_swap_type(&key, row.try_get("swap_type")?)?;
    let status = decode_status(&key, row.try_get("status")?)?;
    Ok(SwapResultRecord {
        tx_to: row.try_get("tx_to")?,
        tx_height: decode_unsigned::<i64, u64>(&key, "tx_height", row.try_get("tx_height")?)?,
        tx_time: decode_unsigned::<i64, u64>(&key, "tx_time", row.try_get("tx_time")?)?,
        from: row.try_get("from_address")?,
        to: row.try_get("to_address")?,
        value: row.try_get("value")?,
        for_native: row.try_get("for_native")?,
        for_underlying: row.try_get("for_underlying")?,
        token: row.try_get("token")?,
        path: row.try_get("path")?,
        amount_out_min: row.try_get("amount_out_min")?,
        from_chain_id: row.try_get("from_chain_id")?,
        to_chain_id: row.try_get("to_chain_id")?,
        log_index: decode_unsigned::<i32, u32>(&key, "log_index", row.try_get("log_index")?)?,
        swap_tx: row.try_get("swap_tx")?,
        old_swap_txs: row.try_get("old_swap_txs")?,
        swap_height: decode_unsigned::<i64, u64>(&key, "swap_height", row.try_get("swap_height")?)?,
        swap_time: decode_unsigned::<i64, u64>(&key, "swap_time", row.try_get("swap_time")?)?,
        swap_value: row.try_get("swap_value")?,
        swap_type,
        swap_nonce: decode_unsigned::<i64, u64>(&key, "swap_nonce", row.try_get("swap_nonce")?)?,
        status,
        timestamp: row.try_get("timestamp")?,
        memo: row.try_get("memo")?,
        key,
    })
}

#[async_trait]
impl SwapStore for PgSwapStore {
    async fn add_to_blacklist(&self, address: &str, pair_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO blacklist (address, pair_id) VALUES ($1, $2)
               ON CONFLICT (address, pair_id) DO NOTHING"#,
        )
        .bind(address.trim().to_lowercase())
        .bind(pair_id.trim().to_lowercase())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_from_blacklist(&self, address: &str, pair_id: &str) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM blacklist WHERE address = $1 AND pair_id = $2"#)
            .bind(address.trim().to_lowercase())
            .bind(pair_id.trim().to_lowercase())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query_blacklist(&self, address: &str, pair_id: &str) -> Result<bool, StoreError> {
        let row: (bool,) = sqlx::query_as(
            r#"SELECT EXISTS(SELECT 1 FROM blacklist WHERE address = $1 AND pair_id = $2)"#,
        )
        .bind(address.trim().to_lowercase())
        .bind(pair_id.trim().to_lowercase())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn find_swap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<SwapRecord, StoreError> {
        let sql = format!(
            "SELECT {} FROM swaps WHERE direction = $1 AND txid = $2 AND pair_id = $3 AND bind = $4",
            SWAP_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(direction.as_str())
            .bind(&key.txid)
            .bind(&key.pair_id)
            .bind(&key.bind)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                direction,
                key: key.clone(),
            })?;
        swap_from_row(&row)
    }

    async fn find_swap_result(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<SwapResultRecord, StoreError> {
        let sql = format!(
            "SELECT {} FROM swap_results WHERE direction = $1 AND txid = $2 AND pair_id = $3 AND bind = $4",
            RESULT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(direction.as_str())
            .bind(&key.txid)
            .bind(&key.pair_id)
            .bind(&key.bind)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::ResultNotFound {
                direction,
                key: key.clone(),
            })?;
        result_from_row(&row)
    }

    async fn pass_big_value(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
    ) -> Result<(), StoreError> {
        self.transition(direction, key, big_value_target, None).await
    }

    async fn reverify(&self, direction: SwapDirection, key: &SwapKey) -> Result<(), StoreError> {
        self.transition(direction, key, reverify_target, Some("")).await
    }

    async fn reswap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        force: bool,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let swap_sql = format!(
            "SELECT {} FROM swaps WHERE direction = $1 AND txid = $2 AND pair_id = $3 AND bind = $4 FOR UPDATE",
            SWAP_COLUMNS
        );
        let swap_row = sqlx::query(&swap_sql)
            .bind(direction.as_str())
            .bind(&key.txid)
            .bind(&key.pair_id)
            .bind(&key.bind)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                direction,
                key: key.clone(),
            })?;
        let swap = swap_from_row(&swap_row)?;

        let mut result = Self::lock_swap_result(&mut tx, direction, key)
            .await?
            .ok_or_else(|| StoreError::ResultNotFound {
                direction,
                key: key.clone(),
            })?;

        if !check_reswap(&swap, &result, force)? {
            tx.rollback().await?;
            return Ok(());
        }

        let now = now_unix();
        result.clear_outcome();

        sqlx::query(
            r#"UPDATE swap_results
               SET swap_tx = '', old_swap_txs = $1, swap_height = 0, swap_time = 0,
                   swap_value = '', swap_nonce = 0, status = $2, timestamp = $3
               WHERE direction = $4 AND txid = $5 AND pair_id = $6 AND bind = $7"#,
        )
        .bind(&result.old_swap_txs)
        .bind(i32::from(result.status))
        .bind(now)
        .bind(direction.as_str())
        .bind(&key.txid)
        .bind(&key.pair_id)
        .bind(&key.bind)
        .execute(&mut *tx)
        .await?;

        Self::update_swap_status(&mut tx, direction, key, SwapStatus::TxNotSwapped, None).await?;
        tx.commit().await?;

        debug!(key = %key, force, "Swap reset for re-execution");
        Ok(())
    }

    async fn record_replacement(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        swap_tx: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut result = Self::lock_swap_result(&mut tx, direction, key)
            .await?
            .ok_or_else(|| StoreError::ResultNotFound {
                direction,
                key: key.clone(),
            })?;
        result.replace_swap_tx(swap_tx);

        sqlx::query(
            r#"UPDATE swap_results SET swap_tx = $1, old_swap_txs = $2, timestamp = $3
               WHERE direction = $4 AND txid = $5 AND pair_id = $6 AND bind = $7"#,
        )
        .bind(&result.swap_tx)
        .bind(&result.old_swap_txs)
        .bind(now_unix())
        .bind(direction.as_str())
        .bind(&key.txid)
        .bind(&key.pair_id)
        .bind(&key.bind)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(key = %key, swap_tx = %swap_tx, "Replacement swap tx recorded");
        Ok(())
    }

    async fn manual_manage_swap(
        &self,
        direction: SwapDirection,
        key: &SwapKey,
        memo: &str,
        pass: bool,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_swap_status(&mut tx, direction, key).await?;
        let result = Self::lock_swap_result(&mut tx, direction, key).await?;
        let status = manual_target(current, result.as_ref(), pass)?;
        Self::update_swap_status(&mut tx, direction, key, status, Some(memo)).await?;
        tx.commit().await?;
        debug!(key = %key, from = %current, to = %status, "Swap manually managed");
        Ok(())
    }
}
