//! In-memory persistence.
//!
//! Backs tests and `VOXORDER_STORE_BACKEND=memory` local runs. Not durable.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{DirectoryError, StoreError};
use crate::store::{NewOrder, OrderRecord, OrderStore, UserDirectory, UserRecord};

/// User directory over a fixed set of ids.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: Arc::new(RwLock::new(ids.into_iter().map(Into::into).collect())),
        }
    }

    pub fn add_user(&self, id: impl Into<String>) -> Result<(), DirectoryError> {
        self.users
            .write()
            .map_err(|_| lock_poisoned_directory())?
            .insert(id.into());
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let users = self.users.read().map_err(|_| lock_poisoned_directory())?;
        Ok(users.get(user_id).map(|id| UserRecord { id: id.clone() }))
    }
}

/// Order store that keeps every insert in a vector.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<Vec<OrderRecord>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored orders, oldest first.
    pub fn records(&self) -> Result<Vec<OrderRecord>, StoreError> {
        let orders = self.orders.read().map_err(|_| lock_poisoned_store())?;
        Ok(orders.clone())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let orders = self.orders.read().map_err(|_| lock_poisoned_store())?;
        Ok(orders.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<OrderRecord, StoreError> {
        let record = OrderRecord {
            id: Uuid::now_v7().to_string(),
            user_id: order.user_id,
            order_item: order.order_item,
            restaurant: order.restaurant,
            delivery_time: order.delivery_time,
            created_at: Utc::now(),
        };
        self.orders
            .write()
            .map_err(|_| lock_poisoned_store())?
            .push(record.clone());
        Ok(record)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.orders.read().map_err(|_| lock_poisoned_store())?;
        Ok(())
    }
}

fn lock_poisoned_store() -> StoreError {
    StoreError::Unavailable {
        reason: "Lock poisoned: orders".to_string(),
    }
}

fn lock_poisoned_directory() -> DirectoryError {
    DirectoryError::LookupFailed {
        reason: "Lock poisoned: users".to_string(),
    }
}
