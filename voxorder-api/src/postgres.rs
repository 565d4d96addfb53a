//! PostgreSQL adapters for the user directory and order store.
//!
//! Tables (managed outside this service):
//! - `profiles(id)` - one row per known user
//! - `orders(id, user_id, order_item, restaurant, delivery_time, created_at)`

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use voxorder_core::{
    DirectoryError, NewOrder, OrderRecord, OrderStore, StoreError, Timestamp, UserDirectory,
    UserRecord,
};

use crate::telemetry::metrics::with_metrics;

const FIND_USER_SQL: &str = "SELECT id::text FROM profiles WHERE id::text = $1 LIMIT 1";

const INSERT_ORDER_SQL: &str = "INSERT INTO orders (user_id, order_item, restaurant, delivery_time) \
     VALUES ($1::text::uuid, $2, $3, $4) \
     RETURNING id::text, user_id::text, order_item, restaurant, delivery_time, created_at";

// ============================================================================
// USER DIRECTORY
// ============================================================================

/// `profiles` lookups over a shared pool.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: Pool,
}

impl PgUserDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let result = async {
            let conn = self.pool.get().await.map_err(|e| {
                tracing::error!("Connection pool error: {:?}", e);
                DirectoryError::LookupFailed {
                    reason: format!("Failed to acquire database connection: {}", e),
                }
            })?;
            let row = conn.query_opt(FIND_USER_SQL, &[&user_id]).await.map_err(|e| {
                tracing::error!("Database error: {:?}", e);
                DirectoryError::LookupFailed {
                    reason: e.to_string(),
                }
            })?;
            row.map(|row| {
                row.try_get::<_, String>(0)
                    .map(|id| UserRecord { id })
                    .map_err(|e| DirectoryError::LookupFailed {
                        reason: e.to_string(),
                    })
            })
            .transpose()
        }
        .await;

        with_metrics(|m| m.record_store_operation("find_user", result.is_ok()));
        result
    }
}

// ============================================================================
// ORDER STORE
// ============================================================================

/// `orders` inserts over a shared pool.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: Pool,
}

impl PgOrderStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(|e| {
            tracing::error!("Connection pool error: {:?}", e);
            StoreError::Unavailable {
                reason: format!("Failed to acquire database connection: {}", e),
            }
        })
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<OrderRecord, StoreError> {
        let result = async {
            let conn = self.connection().await?;
            let row = conn
                .query_one(
                    INSERT_ORDER_SQL,
                    &[
                        &order.user_id,
                        &order.order_item,
                        &order.restaurant,
                        &order.delivery_time,
                    ],
                )
                .await
                .map_err(|e| {
                    tracing::error!("Database error: {:?}", e);
                    StoreError::WriteFailed {
                        reason: e.to_string(),
                    }
                })?;
            order_from_row(&row)
        }
        .await;

        with_metrics(|m| m.record_store_operation("insert_order", result.is_ok()));
        result
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let conn = self.connection().await?;
        conn.simple_query("SELECT 1").await.map_err(|e| StoreError::Unavailable {
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

fn order_from_row(row: &Row) -> Result<OrderRecord, StoreError> {
    let column_error = |e: tokio_postgres::Error| StoreError::WriteFailed {
        reason: format!("Unexpected order row: {}", e),
    };
    Ok(OrderRecord {
        id: row.try_get::<_, String>(0).map_err(column_error)?,
        user_id: row.try_get::<_, String>(1).map_err(column_error)?,
        order_item: row.try_get::<_, String>(2).map_err(column_error)?,
        restaurant: row.try_get::<_, String>(3).map_err(column_error)?,
        delivery_time: row.try_get::<_, Timestamp>(4).map_err(column_error)?,
        created_at: row.try_get::<_, Timestamp>(5).map_err(column_error)?,
    })
}
