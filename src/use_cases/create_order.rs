//! Create-order use case.
//! Fee, deposit acquisition and persistence of a new swap order.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Chain, Order, OrderStatus, PlatformFee};
use crate::error::AppError;
use crate::ports::OrderStore;
use crate::providers::ExchangeParams;
use crate::services::{DepositOrchestrator, FeeCalculator};
use crate::validation::{
    normalize_asset, parse_chain, sanitize_string, validate_address, validate_positive_amount,
    ValidationError,
};

/// Body of `POST /create-order`. Either `requestId` or the direct
/// destination fields must be given.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    pub request_id: Option<Uuid>,
    pub from_chain: String,
    pub from_asset: String,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub refund_address: Option<String>,
    pub to_chain: Option<String>,
    pub to_asset: Option<String>,
    pub recipient_address: Option<String>,
}

/// The stored order plus the details the payer needs.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderOutput {
    pub order: Order,
    pub order_id: Uuid,
    pub deposit_address: String,
    pub platform_fee: PlatformFee,
    #[schema(value_type = String)]
    pub estimated_amount: BigDecimal,
    #[schema(value_type = Option<String>)]
    pub exchange_rate: Option<BigDecimal>,
    pub valid_until: Option<DateTime<Utc>>,
}

struct Destination {
    request_id: Option<Uuid>,
    chain: Chain,
    asset: String,
    recipient_address: String,
}

pub struct CreateOrder {
    store: Arc<dyn OrderStore>,
    fees: FeeCalculator,
    deposits: DepositOrchestrator,
}

impl CreateOrder {
    pub fn new(store: Arc<dyn OrderStore>, fees: FeeCalculator, deposits: DepositOrchestrator) -> Self {
        Self {
            store,
            fees,
            deposits,
        }
    }

    pub async fn execute(&self, input: CreateOrderInput) -> Result<CreateOrderOutput, AppError> {
        let from_chain = parse_chain("fromChain", &input.from_chain)?;
        let from_asset = normalize_asset("fromAsset", &input.from_asset)?;
        validate_positive_amount("amount", &input.amount)?;
        let refund_address = match input.refund_address.as_deref().map(sanitize_string) {
            Some(address) if !address.is_empty() => {
                Some(validate_address("refundAddress", from_chain, &address)?)
            }
            _ => None,
        };

        let destination = self.resolve_destination(&input).await?;

        let breakdown = self
            .fees
            .apply_fee(&input.amount, &from_asset, Some(from_chain));
        let order_id = Uuid::new_v4();

        let params = ExchangeParams {
            from_chain,
            from_asset: from_asset.clone(),
            to_chain: destination.chain,
            to_asset: destination.asset.clone(),
            amount: breakdown.amount_after_fee.clone(),
            recipient_address: destination.recipient_address.clone(),
            refund_address: refund_address.clone(),
            order_id: Some(order_id.to_string()),
        };
        let acquired = self.deposits.acquire_deposit(&params).await?;

        let now = Utc::now();
        let order = Order {
            id: order_id,
            request_id: destination.request_id,
            provider: acquired.provider.to_string(),
            from_chain,
            from_asset,
            to_chain: destination.chain,
            to_asset: destination.asset,
            amount: input.amount.clone(),
            deposit_address: acquired.quote.deposit_address.clone(),
            recipient_address: destination.recipient_address,
            refund_address,
            expected_amount: acquired.quote.estimated_output_amount.clone(),
            status: OrderStatus::AwaitingDeposit,
            exchange_id: Some(acquired.quote.exchange_id.clone()),
            platform_fee_amount: breakdown.fee.amount.clone(),
            platform_fee_percent: breakdown.fee.percent.clone(),
            amount_after_fee: acquired.amount.clone(),
            deposit_tx_hash: None,
            swap_tx_hash: None,
            created_at: now,
            updated_at: now,
        };
        let order = self.store.create_order(&order).await?;

        info!(
            order_id = %order.id,
            provider = %order.provider,
            pair = %params.pair(),
            amount = %order.amount,
            amount_after_fee = %order.amount_after_fee,
            "Order created"
        );

        Ok(CreateOrderOutput {
            order_id: order.id,
            deposit_address: order.deposit_address.clone(),
            platform_fee: breakdown.fee,
            estimated_amount: acquired.quote.estimated_output_amount,
            exchange_rate: acquired.quote.rate,
            valid_until: acquired.quote.valid_until,
            order,
        })
    }

    async fn resolve_destination(&self, input: &CreateOrderInput) -> Result<Destination, AppError> {
        if let Some(request_id) = input.request_id {
            let request = self
                .store
                .get_request_by_id(request_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("payment request {} not found", request_id)))?;

            if !request.is_open(Utc::now()) {
                return Err(ValidationError::new(
                    "requestId",
                    format!("payment request {} is no longer open", request_id),
                )
                .into());
            }

            return Ok(Destination {
                request_id: Some(request.id),
                chain: request.chain,
                asset: request.currency.to_ascii_uppercase(),
                recipient_address: request.recipient_address,
            });
        }

        let chain = input
            .to_chain
            .as_deref()
            .ok_or_else(|| ValidationError::new("toChain", "is required without requestId"))?;
        let asset = input
            .to_asset
            .as_deref()
            .ok_or_else(|| ValidationError::new("toAsset", "is required without requestId"))?;
        let recipient = input
            .recipient_address
            .as_deref()
            .ok_or_else(|| ValidationError::new("recipientAddress", "is required without requestId"))?;

        let chain = parse_chain("toChain", chain)?;
        Ok(Destination {
            request_id: None,
            chain,
            asset: normalize_asset("toAsset", asset)?,
            recipient_address: validate_address("recipientAddress", chain, recipient)?,
        })
    }
}
