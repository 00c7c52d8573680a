//! Exchange-rate use case: forward quotes and reverse solves.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::providers::{ensure_distinct, RateRequest, SwapProvider};
use crate::services::RateQuoteSolver;
use crate::validation::{normalize_asset, parse_chain, validate_positive_amount};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuoteDirection {
    /// `amount` is what the payer sends.
    #[default]
    Forward,
    /// `amount` is what the recipient should receive.
    Reverse,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRateInput {
    pub from_chain: String,
    pub from_asset: String,
    pub to_chain: String,
    pub to_asset: String,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    #[serde(default)]
    pub direction: QuoteDirection,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRateOutput {
    #[schema(value_type = String)]
    pub from_amount: BigDecimal,
    #[schema(value_type = String)]
    pub estimated_to_amount: BigDecimal,
    #[schema(value_type = Option<String>)]
    pub rate: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub min_amount: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub max_amount: Option<BigDecimal>,
    pub direction: QuoteDirection,
}

pub struct QuoteRate {
    provider: Arc<dyn SwapProvider>,
    solver: RateQuoteSolver,
}

impl QuoteRate {
    /// Quotes come from the primary provider.
    pub fn new(provider: Arc<dyn SwapProvider>) -> Self {
        Self {
            solver: RateQuoteSolver::new(Arc::clone(&provider)),
            provider,
        }
    }

    pub async fn execute(&self, input: QuoteRateInput) -> Result<QuoteRateOutput, AppError> {
        let from_chain = parse_chain("fromChain", &input.from_chain)?;
        let to_chain = parse_chain("toChain", &input.to_chain)?;
        let from_asset = normalize_asset("fromAsset", &input.from_asset)?;
        let to_asset = normalize_asset("toAsset", &input.to_asset)?;
        validate_positive_amount("amount", &input.amount)?;
        ensure_distinct(&from_asset, from_chain, &to_asset, to_chain)?;

        match input.direction {
            QuoteDirection::Forward => {
                let request = RateRequest {
                    from_asset,
                    to_asset,
                    from_chain,
                    to_chain,
                    amount: input.amount.clone(),
                };
                let quote = self.provider.get_rate(&request).await?;
                Ok(QuoteRateOutput {
                    from_amount: input.amount,
                    estimated_to_amount: quote.estimated_output_amount,
                    rate: quote.rate,
                    min_amount: quote.min_amount,
                    max_amount: quote.max_amount,
                    direction: QuoteDirection::Forward,
                })
            }
            QuoteDirection::Reverse => {
                let solved = self
                    .solver
                    .solve_for_input(&from_asset, &to_asset, from_chain, to_chain, &input.amount)
                    .await?;
                Ok(QuoteRateOutput {
                    from_amount: solved.required_input_amount,
                    estimated_to_amount: solved.estimated_output_amount,
                    rate: Some(solved.rate),
                    min_amount: solved.min_amount,
                    max_amount: solved.max_amount,
                    direction: QuoteDirection::Reverse,
                })
            }
        }
    }
}
