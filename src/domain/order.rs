//! Swap order entity and its canonical state machine.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::Chain;

/// Canonical order status, identical for every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingDeposit,
    Processing,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingDeposit => "awaiting_deposit",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::AwaitingDeposit => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Completed | OrderStatus::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` goes forward in the state machine.
    ///
    /// Terminal statuses never transition, including into the other terminal.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_deposit" => Ok(OrderStatus::AwaitingDeposit),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// A brokered swap. Identity fields (`id`, `deposit_address`, `exchange_id`)
/// are fixed at creation; only status, tx hashes and `updated_at` change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub request_id: Option<Uuid>,
    pub provider: String,
    pub from_chain: Chain,
    pub from_asset: String,
    pub to_chain: Chain,
    pub to_asset: String,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub deposit_address: String,
    pub recipient_address: String,
    pub refund_address: Option<String>,
    #[schema(value_type = String)]
    pub expected_amount: BigDecimal,
    pub status: OrderStatus,
    pub exchange_id: Option<String>,
    #[schema(value_type = String)]
    pub platform_fee_amount: BigDecimal,
    #[schema(value_type = String)]
    pub platform_fee_percent: BigDecimal,
    #[schema(value_type = String)]
    pub amount_after_fee: BigDecimal,
    pub deposit_tx_hash: Option<String>,
    pub swap_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by the status synchroniser.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub deposit_tx_hash: Option<String>,
    pub swap_tx_hash: Option<String>,
}

impl Order {
    /// Applies a status update in place. Hashes already known are kept when the
    /// update carries none.
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        if update.deposit_tx_hash.is_some() {
            self.deposit_tx_hash = update.deposit_tx_hash.clone();
        }
        if update.swap_tx_hash.is_some() {
            self.swap_tx_hash = update.swap_tx_hash.clone();
        }
        self.updated_at = Utc::now();
    }
}
