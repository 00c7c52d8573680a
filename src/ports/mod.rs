//! Persistence port consumed by the order flows.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, PaymentRequest};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record {id}: {message}")]
    Corrupt { id: String, message: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields written by `update_order_status`. `None` leaves the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderStatusChange {
    pub deposit_tx_hash: Option<String>,
    pub swap_tx_hash: Option<String>,
    pub exchange_id: Option<String>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_request_by_id(&self, id: Uuid) -> StoreResult<Option<PaymentRequest>>;

    /// Inserts `order`. An order whose id already exists is left as stored and
    /// returned unchanged.
    async fn create_order(&self, order: &Order) -> StoreResult<Order>;

    async fn get_order_by_id(&self, id: Uuid) -> StoreResult<Option<Order>>;

    /// Updates status, tx hashes and `updated_at`. Fails with
    /// [`StoreError::NotFound`] for an unknown id.
    ///
    /// The status is only written when it advances from the stored one; a
    /// terminal order keeps its status. The returned order is what was stored.
    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        change: OrderStatusChange,
    ) -> StoreResult<Order>;

    /// Orders of a payment request, oldest first.
    async fn get_orders_by_request_id(&self, request_id: Uuid) -> StoreResult<Vec<Order>>;

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
