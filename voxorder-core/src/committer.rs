//! Order Committer
//!
//! Validates the resolved user and the extracted order, then performs the one
//! and only write of a callback run. Checks run in a fixed order and stop at
//! the first failure, so nothing is ever partially committed.

use std::sync::Arc;

use serde::Serialize;

use crate::error::CommitError;
use crate::extractor::ExtractedOrder;
use crate::resolver::UserContext;
use crate::store::{NewOrder, OrderRecord, OrderStore, UserDirectory};

/// A successful commit: the store's record plus the extraction it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedOrder {
    pub record: OrderRecord,
    pub details: ExtractedOrder,
}

/// Applies the commit protocol against a directory and a store.
#[derive(Clone)]
pub struct OrderCommitter {
    directory: Arc<dyn UserDirectory>,
    store: Arc<dyn OrderStore>,
}

impl OrderCommitter {
    pub fn new(directory: Arc<dyn UserDirectory>, store: Arc<dyn OrderStore>) -> Self {
        Self { directory, store }
    }

    /// Validate and persist.
    ///
    /// 1. no user id → [`CommitError::MissingUser`]
    /// 2. unknown user → [`CommitError::InvalidUser`]
    /// 3. item or restaurant missing → [`CommitError::IncompleteOrder`]
    /// 4. a single insert; its failure is returned as-is, without retry
    pub async fn commit(
        &self,
        user: &UserContext,
        extracted: ExtractedOrder,
    ) -> Result<CommittedOrder, CommitError> {
        let user_id = user.user_id.as_deref().ok_or(CommitError::MissingUser)?;

        let Some(known) = self.directory.find_by_id(user_id).await? else {
            tracing::warn!(user_id = %user_id, "Callback references an unknown user");
            return Err(CommitError::InvalidUser {
                user_id: user_id.to_string(),
            });
        };

        let (Some(order_item), Some(restaurant)) = complete_fields(&extracted) else {
            tracing::info!(
                user_id = %known.id,
                missing = ?extracted.missing_fields(),
                "Extracted order is incomplete"
            );
            return Err(CommitError::IncompleteOrder {
                extracted: Box::new(extracted),
            });
        };

        let record = self
            .store
            .insert(NewOrder {
                user_id: known.id,
                order_item,
                restaurant,
                delivery_time: extracted.delivery_time,
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Order insert failed");
                CommitError::StoreWriteFailed(e)
            })?;

        tracing::info!(order_id = %record.id, user_id = %record.user_id, "Order committed");

        Ok(CommittedOrder {
            record,
            details: extracted,
        })
    }
}

fn complete_fields(extracted: &ExtractedOrder) -> (Option<String>, Option<String>) {
    if !extracted.is_complete() {
        return (None, None);
    }
    (extracted.order_item.clone(), extracted.restaurant.clone())
}
