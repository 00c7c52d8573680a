use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{Order, StatusUpdate};
use crate::ports::{OrderStatusChange, OrderStore};
use crate::providers::{ExchangeStatus, SwapProvider};

/// Decides what a provider report changes on an order.
///
/// Returns `None` when nothing moves forward: the status may only advance
/// along `awaiting_deposit -> processing -> completed | failed` and terminal
/// orders never change status. A report that only reveals a new tx hash still
/// yields an update that keeps the current status.
pub fn reconcile(order: &Order, report: &ExchangeStatus) -> Option<StatusUpdate> {
    let advances = order.status.can_advance_to(report.status);

    let new_deposit_hash = report
        .deposit_tx_hash
        .as_ref()
        .filter(|hash| order.deposit_tx_hash.as_ref() != Some(*hash));
    let new_swap_hash = report
        .swap_tx_hash
        .as_ref()
        .filter(|hash| order.swap_tx_hash.as_ref() != Some(*hash));

    if !advances && new_deposit_hash.is_none() && new_swap_hash.is_none() {
        return None;
    }

    Some(StatusUpdate {
        status: if advances { report.status } else { order.status },
        deposit_tx_hash: new_deposit_hash.cloned(),
        swap_tx_hash: new_swap_hash.cloned(),
    })
}

/// Refreshes orders from the provider that created them. Failures never
/// propagate; the cached order is returned instead.
#[derive(Clone)]
pub struct OrderStatusSynchronizer {
    providers: Vec<Arc<dyn SwapProvider>>,
    store: Arc<dyn OrderStore>,
}

impl OrderStatusSynchronizer {
    /// `providers[0]` serves orders whose provider is no longer configured.
    pub fn new(providers: Vec<Arc<dyn SwapProvider>>, store: Arc<dyn OrderStore>) -> Self {
        Self { providers, store }
    }

    fn provider_for(&self, order: &Order) -> Option<&Arc<dyn SwapProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == order.provider)
            .or_else(|| self.providers.first())
    }

    pub async fn refresh(&self, order: Order) -> Order {
        if order.status.is_terminal() {
            return order;
        }
        let exchange_id = match order.exchange_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return order,
        };
        let Some(provider) = self.provider_for(&order) else {
            return order;
        };

        let report = match provider.get_status(&exchange_id).await {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    provider = provider.name(),
                    exchange_id = %exchange_id,
                    error = %e,
                    "Status refresh failed, serving cached order"
                );
                return order;
            }
        };

        let Some(update) = reconcile(&order, &report) else {
            if report.status != order.status {
                debug!(
                    order_id = %order.id,
                    stored = %order.status,
                    reported = %report.provider_status,
                    "Ignoring status report that does not advance the order"
                );
            }
            return order;
        };

        let change = OrderStatusChange {
            deposit_tx_hash: update.deposit_tx_hash.clone(),
            swap_tx_hash: update.swap_tx_hash.clone(),
            exchange_id: None,
        };
        match self
            .store
            .update_order_status(order.id, update.status, change)
            .await
        {
            Ok(stored) => {
                info!(
                    order_id = %stored.id,
                    from = %order.status,
                    to = %stored.status,
                    "Order status updated"
                );
                stored
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Failed to persist status update, serving cached order");
                order
            }
        }
    }
}
