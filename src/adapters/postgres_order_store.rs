//! Postgres implementation of OrderStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::path::Path;
use uuid::Uuid;

use crate::domain::{Chain, Order, OrderStatus, PaymentRequest, PaymentRequestStatus};
use crate::ports::{OrderStatusChange, OrderStore, StoreError, StoreResult};

const ORDER_COLUMNS: &str = "id, request_id, provider, from_chain, from_asset, to_chain, to_asset, \
    amount, deposit_address, recipient_address, refund_address, expected_amount, status, \
    exchange_id, platform_fee_amount, platform_fee_percent, amount_after_fee, deposit_tx_hash, \
    swap_tx_hash, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies `./migrations`.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        let migrator = Migrator::new(Path::new("./migrations")).await?;
        migrator.run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn get_request_by_id(&self, id: Uuid) -> StoreResult<Option<PaymentRequest>> {
        let row = sqlx::query_as::<_, PaymentRequestRow>(
            "SELECT id, amount, currency, chain, recipient_address, description, status, \
             created_at, expires_at FROM payment_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRequestRow::into_domain).transpose()
    }

    async fn create_order(&self, order: &Order) -> StoreResult<Order> {
        let inserted = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders ({ORDER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            ON CONFLICT (id) DO NOTHING
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id)
        .bind(order.request_id)
        .bind(&order.provider)
        .bind(order.from_chain.as_str())
        .bind(&order.from_asset)
        .bind(order.to_chain.as_str())
        .bind(&order.to_asset)
        .bind(&order.amount)
        .bind(&order.deposit_address)
        .bind(&order.recipient_address)
        .bind(&order.refund_address)
        .bind(&order.expected_amount)
        .bind(order.status.as_str())
        .bind(&order.exchange_id)
        .bind(&order.platform_fee_amount)
        .bind(&order.platform_fee_percent)
        .bind(&order.amount_after_fee)
        .bind(&order.deposit_tx_hash)
        .bind(&order.swap_tx_hash)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => row.into_domain(),
            // Conflict: the order already exists.
            None => self
                .get_order_by_id(order.id)
                .await?
                .ok_or_else(|| StoreError::NotFound(order.id.to_string())),
        }
    }

    async fn get_order_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_domain).transpose()
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        change: OrderStatusChange,
    ) -> StoreResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders SET
                status = CASE
                    WHEN status NOT IN ('completed', 'failed')
                         AND (CASE $2::VARCHAR WHEN 'awaiting_deposit' THEN 0 WHEN 'processing' THEN 1 ELSE 2 END)
                           > (CASE status WHEN 'awaiting_deposit' THEN 0 WHEN 'processing' THEN 1 ELSE 2 END)
                    THEN $2::VARCHAR
                    ELSE status
                END,
                deposit_tx_hash = COALESCE($3, deposit_tx_hash),
                swap_tx_hash = COALESCE($4, swap_tx_hash),
                exchange_id = COALESCE(exchange_id, $5),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(status.as_str())
        .bind(change.deposit_tx_hash)
        .bind(change.swap_tx_hash)
        .bind(change.exchange_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(order_id.to_string()))?
            .into_domain()
    }

    async fn get_orders_by_request_id(&self, request_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE request_id = $1 ORDER BY created_at ASC"
        ))
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_domain).collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn corrupt(id: Uuid, message: String) -> StoreError {
    StoreError::Corrupt {
        id: id.to_string(),
        message,
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRequestRow {
    id: Uuid,
    amount: BigDecimal,
    currency: String,
    chain: String,
    recipient_address: String,
    description: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl PaymentRequestRow {
    fn into_domain(self) -> StoreResult<PaymentRequest> {
        let chain = self
            .chain
            .parse::<Chain>()
            .map_err(|e| corrupt(self.id, e.to_string()))?;
        let status = self
            .status
            .parse::<PaymentRequestStatus>()
            .map_err(|e| corrupt(self.id, e))?;

        Ok(PaymentRequest {
            id: self.id,
            amount: self.amount,
            currency: self.currency,
            chain,
            recipient_address: self.recipient_address,
            description: self.description,
            status,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    request_id: Option<Uuid>,
    provider: String,
    from_chain: String,
    from_asset: String,
    to_chain: String,
    to_asset: String,
    amount: BigDecimal,
    deposit_address: String,
    recipient_address: String,
    refund_address: Option<String>,
    expected_amount: BigDecimal,
    status: String,
    exchange_id: Option<String>,
    platform_fee_amount: BigDecimal,
    platform_fee_percent: BigDecimal,
    amount_after_fee: BigDecimal,
    deposit_tx_hash: Option<String>,
    swap_tx_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_domain(self) -> StoreResult<Order> {
        let id = self.id;
        let from_chain = self
            .from_chain
            .parse::<Chain>()
            .map_err(|e| corrupt(id, e.to_string()))?;
        let to_chain = self
            .to_chain
            .parse::<Chain>()
            .map_err(|e| corrupt(id, e.to_string()))?;
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| corrupt(id, e))?;

        Ok(Order {
            id,
            request_id: self.request_id,
            provider: self.provider,
            from_chain,
            from_asset: self.from_asset,
            to_chain,
            to_asset: self.to_asset,
            amount: self.amount,
            deposit_address: self.deposit_address,
            recipient_address: self.recipient_address,
            refund_address: self.refund_address,
            expected_amount: self.expected_amount,
            status,
            exchange_id: self.exchange_id,
            platform_fee_amount: self.platform_fee_amount,
            platform_fee_percent: self.platform_fee_percent,
            amount_after_fee: self.amount_after_fee,
            deposit_tx_hash: self.deposit_tx_hash,
            swap_tx_hash: self.swap_tx_hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
