//! Persistence seams.
//!
//! The pipeline talks to persistence only through these two traits. The API
//! crate provides Postgres implementations; [`crate::memory`] provides
//! in-process ones for tests and local development.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, StoreError};
use crate::Timestamp;

/// A known user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
}

/// An order ready to be written. Construct only from a complete extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: String,
    pub order_item: String,
    pub restaurant: String,
    pub delivery_time: Timestamp,
}

/// A stored order as the store reports it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub user_id: String,
    pub order_item: String,
    pub restaurant: String,
    pub delivery_time: Timestamp,
    pub created_at: Timestamp,
}

/// Existence checks against the users table.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` when no such user exists.
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError>;
}

/// Durable order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert one order. No deduplication: two calls write two rows.
    async fn insert(&self, order: NewOrder) -> Result<OrderRecord, StoreError>;

    /// Liveness of the backing store, used by the readiness check.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
