//! Swap provider adapters.
//!
//! Every provider speaks its own currency codes, auth scheme and status
//! vocabulary. The adapters translate all of that into [`SwapProvider`].

pub mod changenow;
pub mod exolix;
pub mod http;
pub mod simpleswap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::{pair_label, Chain, OrderStatus};
use crate::validation::{validate_address, ValidationError};

pub use changenow::ChangeNowProvider;
pub use exolix::ExolixProvider;
pub use simpleswap::SimpleSwapProvider;

/// How callers should treat a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected locally before any network I/O.
    Validation,
    /// Can never succeed as-is.
    Fatal,
    /// Provider refused this amount; a different amount may pass.
    AmountRejected,
    /// A retry may succeed.
    Transient,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{provider} rejected the API credentials; check {key_var}")]
    Auth {
        provider: &'static str,
        key_var: &'static str,
    },

    #[error("{provider} does not support {pair}: {message}")]
    UnsupportedPair {
        provider: &'static str,
        pair: String,
        message: String,
    },

    #[error("{provider} rejected the amount for {pair}: {message}")]
    AmountOutOfRange {
        provider: &'static str,
        pair: String,
        message: String,
    },

    #[error("{provider} rejected the request for {pair}: {message}")]
    Rejected {
        provider: &'static str,
        pair: String,
        message: String,
    },

    #[error("{provider} is unavailable for {pair}: {message}")]
    Transient {
        provider: &'static str,
        pair: String,
        message: String,
    },
}

impl ProviderError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::Validation(_) => ErrorClass::Validation,
            ProviderError::Auth { .. }
            | ProviderError::UnsupportedPair { .. }
            | ProviderError::Rejected { .. } => ErrorClass::Fatal,
            ProviderError::AmountOutOfRange { .. } => ErrorClass::AmountRejected,
            ProviderError::Transient { .. } => ErrorClass::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Parameters of a swap to be created at a provider.
#[derive(Debug, Clone)]
pub struct ExchangeParams {
    pub from_chain: Chain,
    pub from_asset: String,
    pub to_chain: Chain,
    pub to_asset: String,
    pub amount: BigDecimal,
    pub recipient_address: String,
    pub refund_address: Option<String>,
    pub order_id: Option<String>,
}

impl ExchangeParams {
    pub fn pair(&self) -> String {
        pair_label(&self.from_asset, self.from_chain, &self.to_asset, self.to_chain)
    }

    pub fn with_amount(&self, amount: BigDecimal) -> Self {
        Self {
            amount,
            ..self.clone()
        }
    }

    /// Checks shared by every adapter before any network call: distinct
    /// assets, a positive amount and well-formed addresses.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_distinct(&self.from_asset, self.from_chain, &self.to_asset, self.to_chain)?;
        crate::validation::validate_positive_amount("amount", &self.amount)?;
        validate_address("recipientAddress", self.to_chain, &self.recipient_address)?;
        if let Some(refund) = &self.refund_address {
            validate_address("refundAddress", self.from_chain, refund)?;
        }
        Ok(())
    }
}

/// Same asset on the same chain is not a swap.
pub fn ensure_distinct(
    from_asset: &str,
    from_chain: Chain,
    to_asset: &str,
    to_chain: Chain,
) -> Result<(), ValidationError> {
    if from_chain == to_chain && from_asset.eq_ignore_ascii_case(to_asset) {
        return Err(ValidationError::new(
            "toAsset",
            format!(
                "{} is the same asset and chain as the source",
                pair_label(from_asset, from_chain, to_asset, to_chain)
            ),
        ));
    }
    Ok(())
}

/// Result of a successful `create_exchange`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuote {
    pub deposit_address: String,
    pub exchange_id: String,
    pub estimated_output_amount: BigDecimal,
    pub rate: Option<BigDecimal>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Status vocabulary shared by the providers once their own codes are
/// normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Waiting,
    Confirming,
    Exchanging,
    Sending,
    Finished,
    Failed,
    Refunded,
    Expired,
}

impl ProviderStatus {
    /// Fixed mapping onto the canonical order status.
    pub fn canonical(&self) -> OrderStatus {
        match self {
            ProviderStatus::Waiting | ProviderStatus::Confirming => OrderStatus::AwaitingDeposit,
            ProviderStatus::Exchanging | ProviderStatus::Sending => OrderStatus::Processing,
            ProviderStatus::Finished => OrderStatus::Completed,
            ProviderStatus::Failed | ProviderStatus::Refunded | ProviderStatus::Expired => {
                OrderStatus::Failed
            }
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderStatus::Waiting => "waiting",
            ProviderStatus::Confirming => "confirming",
            ProviderStatus::Exchanging => "exchanging",
            ProviderStatus::Sending => "sending",
            ProviderStatus::Finished => "finished",
            ProviderStatus::Failed => "failed",
            ProviderStatus::Refunded => "refunded",
            ProviderStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

impl FromStr for ProviderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" | "waiting" => Ok(ProviderStatus::Waiting),
            "confirming" | "verifying" => Ok(ProviderStatus::Confirming),
            "exchanging" => Ok(ProviderStatus::Exchanging),
            "sending" => Ok(ProviderStatus::Sending),
            "finished" => Ok(ProviderStatus::Finished),
            "failed" => Ok(ProviderStatus::Failed),
            "refunded" => Ok(ProviderStatus::Refunded),
            "expired" => Ok(ProviderStatus::Expired),
            other => Err(format!("unknown provider status '{}'", other)),
        }
    }
}

/// Status report for an exchange, already mapped to the canonical status.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeStatus {
    pub provider_status: ProviderStatus,
    pub status: OrderStatus,
    pub deposit_tx_hash: Option<String>,
    pub swap_tx_hash: Option<String>,
    pub from_amount: Option<BigDecimal>,
    pub to_amount: Option<BigDecimal>,
    pub rate: Option<BigDecimal>,
}

impl ExchangeStatus {
    pub fn new(provider_status: ProviderStatus) -> Self {
        Self {
            provider_status,
            status: provider_status.canonical(),
            deposit_tx_hash: None,
            swap_tx_hash: None,
            from_amount: None,
            to_amount: None,
            rate: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateRequest {
    pub from_asset: String,
    pub to_asset: String,
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub amount: BigDecimal,
}

impl RateRequest {
    pub fn pair(&self) -> String {
        pair_label(&self.from_asset, self.from_chain, &self.to_asset, self.to_chain)
    }

    pub fn with_amount(&self, amount: BigDecimal) -> Self {
        Self {
            amount,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub estimated_output_amount: BigDecimal,
    pub rate: Option<BigDecimal>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
}

#[async_trait]
pub trait SwapProvider: Send + Sync {
    /// Stable provider identifier stored on orders.
    fn name(&self) -> &'static str;

    async fn create_exchange(&self, params: &ExchangeParams) -> ProviderResult<ProviderQuote>;

    async fn get_status(&self, exchange_id: &str) -> ProviderResult<ExchangeStatus>;

    async fn get_rate(&self, request: &RateRequest) -> ProviderResult<RateQuote>;

    /// `closed` or `open`; adapters without a breaker report `closed`.
    fn circuit_state(&self) -> &'static str {
        "closed"
    }
}

/// Provider selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    ChangeNow,
    SimpleSwap,
    Exolix,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::ChangeNow => "changenow",
            ProviderKind::SimpleSwap => "simpleswap",
            ProviderKind::Exolix => "exolix",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "changenow" => Ok(ProviderKind::ChangeNow),
            "simpleswap" => Ok(ProviderKind::SimpleSwap),
            "exolix" => Ok(ProviderKind::Exolix),
            other => Err(format!("unknown swap provider '{}'", other)),
        }
    }
}
