use bigdecimal::BigDecimal;
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::Chain;
use crate::providers::{ProviderError, ProviderResult, RateRequest, SwapProvider};
use crate::services::retry::AMOUNT_SCALE;
use crate::validation::{validate_positive_amount, ValidationError};

pub const MAX_ITERATIONS: u32 = 5;

const SEED_FACTOR: &str = "1.05";
const TOLERANCE: &str = "0.01";
const UNDERSHOOT_NUDGE: &str = "1.02";
const OVERSHOOT_NUDGE: &str = "0.98";

/// Input amount estimated to yield a target output.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseQuote {
    pub required_input_amount: BigDecimal,
    pub estimated_output_amount: BigDecimal,
    pub rate: BigDecimal,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub iterations: u32,
    pub converged: bool,
}

fn constant(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap_or_default()
}

/// Solves for the input of a swap when only the desired output is known,
/// using the provider's forward quotes.
#[derive(Clone)]
pub struct RateQuoteSolver {
    provider: Arc<dyn SwapProvider>,
}

impl RateQuoteSolver {
    pub fn new(provider: Arc<dyn SwapProvider>) -> Self {
        Self { provider }
    }

    /// Fixed-point iteration on `input *= target / estimate`.
    ///
    /// Converges once the estimate is within 1% of the target. When a
    /// correction leaves the estimate on the same side of the target as the
    /// previous one, the step is nudged 2% further. After
    /// [`MAX_ITERATIONS`] the last estimate is returned unconverged.
    pub async fn solve_for_input(
        &self,
        from_asset: &str,
        to_asset: &str,
        from_chain: Chain,
        to_chain: Chain,
        target_output: &BigDecimal,
    ) -> ProviderResult<ReverseQuote> {
        validate_positive_amount("amount", target_output)?;

        let zero = BigDecimal::from(0);
        let tolerance = constant(TOLERANCE);
        let mut input = (target_output * constant(SEED_FACTOR)).with_scale(AMOUNT_SCALE);
        if input <= zero {
            return Err(ValidationError::new("amount", "is too small to quote").into());
        }

        let request = RateRequest {
            from_asset: from_asset.to_string(),
            to_asset: to_asset.to_string(),
            from_chain,
            to_chain,
            amount: input.clone(),
        };
        let pair = request.pair();

        let mut previous_side: Option<Ordering> = None;
        let mut best: Option<ReverseQuote> = None;

        for iteration in 1..=MAX_ITERATIONS {
            let quote = self.provider.get_rate(&request.with_amount(input.clone())).await?;
            let estimate = quote.estimated_output_amount;

            let rate = quote.rate.unwrap_or_else(|| &estimate / &input);
            if rate <= zero || estimate <= zero {
                return Err(ProviderError::Transient {
                    provider: self.provider.name(),
                    pair,
                    message: format!("quoted a non-positive rate at input {}", input),
                });
            }

            let deviation = (&estimate - target_output).abs() / target_output;
            debug!(
                provider = self.provider.name(),
                pair = %pair,
                iteration,
                input = %input,
                estimate = %estimate,
                "Reverse quote iteration"
            );

            let converged = deviation < tolerance;
            let side = estimate.cmp(target_output);
            let current = ReverseQuote {
                required_input_amount: input.clone(),
                estimated_output_amount: estimate.clone(),
                rate,
                min_amount: quote.min_amount,
                max_amount: quote.max_amount,
                iterations: iteration,
                converged,
            };
            if converged {
                return Ok(current);
            }
            best = Some(current);

            let mut next = &input * (target_output / &estimate);
            if previous_side == Some(side) {
                next = match side {
                    Ordering::Less => next * constant(UNDERSHOOT_NUDGE),
                    _ => next * constant(OVERSHOOT_NUDGE),
                };
            }
            previous_side = Some(side);

            let next = next.with_scale(AMOUNT_SCALE);
            if next <= zero {
                break;
            }
            input = next;
        }

        warn!(
            provider = self.provider.name(),
            pair = %pair,
            target = %target_output,
            "Reverse quote did not converge, returning last estimate"
        );

        best.ok_or_else(|| ProviderError::Transient {
            provider: self.provider.name(),
            pair,
            message: "no quote was obtained".to_string(),
        })
    }
}
