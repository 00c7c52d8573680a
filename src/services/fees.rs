use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::config::FeeConfig;
use crate::domain::{Chain, PlatformFee};

/// Share of the amount a fee may take after the safety clamp.
const MAX_FEE_SHARE: &str = "0.99";

/// Assets whose units are dollars, so the USD floor and ceiling apply as is.
const USD_STABLECOINS: &[&str] = &["USDT", "USDC", "DAI", "BUSD", "TUSD", "USDP", "FDUSD", "PYUSD"];

fn is_usd_denominated(currency: &str) -> bool {
    USD_STABLECOINS
        .iter()
        .any(|stable| stable.eq_ignore_ascii_case(currency.trim()))
}

/// Fee plus what is left to swap.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeBreakdown {
    pub fee: PlatformFee,
    pub amount_after_fee: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct FeeCalculator {
    config: FeeConfig,
}

impl FeeCalculator {
    pub fn new(config: FeeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    /// `amount * percent`, raised to the minimum fee and, when a maximum is
    /// configured, lowered to it. `amount` must already be validated positive.
    ///
    /// The minimum and maximum are USD figures and only bound fees paid in a
    /// USD stablecoin; other assets pay the plain percentage.
    pub fn compute_fee(&self, amount: &BigDecimal, currency: &str, chain: Option<Chain>) -> PlatformFee {
        let mut fee = amount * &self.config.percent;

        if is_usd_denominated(currency) {
            if fee < self.config.min_fee_usd {
                fee = self.config.min_fee_usd.clone();
            }
            if self.config.max_fee_usd > BigDecimal::from(0) && fee > self.config.max_fee_usd {
                fee = self.config.max_fee_usd.clone();
            }
        }

        let (recipient_address, fee_chain) = self.config.recipient_for(chain);

        PlatformFee {
            amount: fee,
            percent: &self.config.percent * BigDecimal::from(100),
            currency: currency.to_ascii_uppercase(),
            recipient_address,
            chain: fee_chain,
        }
    }

    /// Computes the fee and subtracts it, keeping the remainder positive.
    ///
    /// A fee that would swallow the whole amount falls back to the plain
    /// percentage fee, and no fee may exceed 99% of the amount.
    pub fn apply_fee(&self, amount: &BigDecimal, currency: &str, chain: Option<Chain>) -> FeeBreakdown {
        let mut fee = self.compute_fee(amount, currency, chain);

        if fee.amount >= *amount {
            fee.amount = amount * &self.config.percent;
        }
        let ceiling = amount * BigDecimal::from_str(MAX_FEE_SHARE).unwrap_or_default();
        if fee.amount > ceiling {
            fee.amount = ceiling;
        }

        let amount_after_fee = amount - &fee.amount;
        FeeBreakdown {
            fee,
            amount_after_fee,
        }
    }
}
