//! In-process OrderStore, used when no database is configured.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, PaymentRequest, StatusUpdate};
use crate::ports::{OrderStatusChange, OrderStore, StoreError, StoreResult};

#[derive(Default)]
pub struct InMemoryOrderStore {
    requests: RwLock<HashMap<Uuid, PaymentRequest>>,
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payment requests are created by the merchant flow; this seeds them.
    pub async fn insert_request(&self, request: PaymentRequest) {
        self.requests.write().await.insert(request.id, request);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_request_by_id(&self, id: Uuid) -> StoreResult<Option<PaymentRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn create_order(&self, order: &Order) -> StoreResult<Order> {
        let mut orders = self.orders.write().await;
        let stored = orders.entry(order.id).or_insert_with(|| order.clone());
        Ok(stored.clone())
    }

    async fn get_order_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        change: OrderStatusChange,
    ) -> StoreResult<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))?;

        // A stale caller may ask for a status the stored order has already passed.
        let status = if order.status.can_advance_to(status) {
            status
        } else {
            order.status
        };
        order.apply(&StatusUpdate {
            status,
            deposit_tx_hash: change.deposit_tx_hash,
            swap_tx_hash: change.swap_tx_hash,
        });
        if order.exchange_id.is_none() {
            order.exchange_id = change.exchange_id;
        }

        Ok(order.clone())
    }

    async fn get_orders_by_request_id(&self, request_id: Uuid) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| order.request_id == Some(request_id))
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.created_at);
        Ok(orders)
    }
}
