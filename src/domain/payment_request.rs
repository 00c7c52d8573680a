//! Merchant payment request. Created outside this service; read-only here.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::Chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRequestStatus {
    Pending,
    Expired,
    Fulfilled,
}

impl PaymentRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRequestStatus::Pending => "pending",
            PaymentRequestStatus::Expired => "expired",
            PaymentRequestStatus::Fulfilled => "fulfilled",
        }
    }
}

impl FromStr for PaymentRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentRequestStatus::Pending),
            "expired" => Ok(PaymentRequestStatus::Expired),
            "fulfilled" => Ok(PaymentRequestStatus::Fulfilled),
            other => Err(format!("unknown payment request status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub currency: String,
    pub chain: Chain,
    pub recipient_address: String,
    pub description: Option<String>,
    pub status: PaymentRequestStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentRequest {
    /// A request accepts new orders while pending and not past `expires_at`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentRequestStatus::Pending && now < self.expires_at
    }
}

/// Subset of a payment request returned alongside an order's status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestSummary {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub currency: String,
    pub chain: Chain,
    pub description: Option<String>,
    pub status: PaymentRequestStatus,
}

impl From<&PaymentRequest> for PaymentRequestSummary {
    fn from(request: &PaymentRequest) -> Self {
        Self {
            id: request.id,
            amount: request.amount.clone(),
            currency: request.currency.clone(),
            chain: request.chain,
            description: request.description.clone(),
            status: request.status,
        }
    }
}
