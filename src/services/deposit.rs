use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::providers::{ErrorClass, ExchangeParams, ProviderError, ProviderQuote, ProviderResult, SwapProvider};
use crate::services::retry::{amount_ladder, run_ladder, RetryPolicy};

/// Deposit address obtained from one of the providers.
#[derive(Debug, Clone)]
pub struct AcquiredDeposit {
    pub provider: &'static str,
    /// Ladder candidate the provider accepted.
    pub amount: BigDecimal,
    pub quote: ProviderQuote,
}

/// Walks the amount ladder on each configured provider in turn until one
/// hands out a deposit address.
#[derive(Clone)]
pub struct DepositOrchestrator {
    providers: Vec<Arc<dyn SwapProvider>>,
    policy: RetryPolicy,
}

impl DepositOrchestrator {
    pub fn new(providers: Vec<Arc<dyn SwapProvider>>, policy: RetryPolicy) -> Self {
        Self { providers, policy }
    }

    pub async fn acquire_deposit(&self, params: &ExchangeParams) -> ProviderResult<AcquiredDeposit> {
        // Fail before touching any provider.
        params.validate()?;

        let ladder = amount_ladder(&params.amount);
        let mut last_error: Option<ProviderError> = None;

        for provider in &self.providers {
            let outcome = run_ladder(&ladder, &self.policy, |amount| {
                let provider = Arc::clone(provider);
                let attempt = params.with_amount(amount);
                async move { provider.create_exchange(&attempt).await }
            })
            .await;

            match outcome {
                Ok((amount, quote)) => {
                    info!(
                        provider = provider.name(),
                        pair = %params.pair(),
                        amount = %amount,
                        exchange_id = %quote.exchange_id,
                        "Deposit address acquired"
                    );
                    return Ok(AcquiredDeposit {
                        provider: provider.name(),
                        amount,
                        quote,
                    });
                }
                Err(error) => match error.class() {
                    ErrorClass::Validation | ErrorClass::Fatal => return Err(error),
                    ErrorClass::AmountRejected | ErrorClass::Transient => {
                        warn!(
                            provider = provider.name(),
                            pair = %params.pair(),
                            error = %error,
                            "Provider exhausted its amount ladder"
                        );
                        last_error = Some(error);
                    }
                },
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Transient {
            provider: "none",
            pair: params.pair(),
            message: "no swap provider is configured".to_string(),
        }))
    }
}
