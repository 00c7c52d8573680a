use anyhow::Context;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::domain::Chain;

/// Platform fee settings. `percent` is a fraction (`0.01` = 1%).
#[derive(Debug, Clone)]
pub struct FeeConfig {
    pub percent: BigDecimal,
    pub min_fee_usd: BigDecimal,
    /// `0` disables the ceiling.
    pub max_fee_usd: BigDecimal,
    pub recipient: Option<String>,
    pub chain: Option<Chain>,
    pub chain_recipients: HashMap<Chain, String>,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            percent: BigDecimal::from_str("0.01").unwrap_or_default(),
            min_fee_usd: BigDecimal::from_str("0.10").unwrap_or_default(),
            max_fee_usd: BigDecimal::from(0),
            recipient: None,
            chain: None,
            chain_recipients: HashMap::new(),
        }
    }
}

fn decimal_var(name: &str, default: BigDecimal) -> anyhow::Result<BigDecimal> {
    match env::var(name) {
        Ok(raw) => BigDecimal::from_str(raw.trim()).with_context(|| format!("{} must be a decimal", name)),
        Err(_) => Ok(default),
    }
}

impl FeeConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = FeeConfig::default();

        let percent = decimal_var("PLATFORM_FEE_PERCENT", defaults.percent)?;
        let min_fee_usd = decimal_var("MIN_FEE_USD", defaults.min_fee_usd)?;
        let max_fee_usd = decimal_var("MAX_FEE_USD", defaults.max_fee_usd)?;

        let chain = match env::var("PLATFORM_FEE_CHAIN") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.parse::<Chain>()
                    .context("PLATFORM_FEE_CHAIN is not a supported chain")?,
            ),
            _ => None,
        };

        let mut chain_recipients = HashMap::new();
        for candidate in Chain::ALL {
            let var = format!("PLATFORM_FEE_RECIPIENT_{}", candidate.as_str().to_ascii_uppercase());
            if let Ok(address) = env::var(&var) {
                if !address.trim().is_empty() {
                    chain_recipients.insert(candidate, address.trim().to_string());
                }
            }
        }

        let config = FeeConfig {
            percent,
            min_fee_usd,
            max_fee_usd,
            recipient: env::var("PLATFORM_FEE_RECIPIENT")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            chain,
            chain_recipients,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let zero = BigDecimal::from(0);
        if self.percent < zero || self.percent > BigDecimal::from_str("0.5")? {
            anyhow::bail!("PLATFORM_FEE_PERCENT must be between 0 and 0.5");
        }
        if self.min_fee_usd < zero {
            anyhow::bail!("MIN_FEE_USD must not be negative");
        }
        if self.max_fee_usd < zero {
            anyhow::bail!("MAX_FEE_USD must not be negative");
        }
        if self.max_fee_usd > zero && self.max_fee_usd < self.min_fee_usd {
            anyhow::bail!("MAX_FEE_USD must be 0 or at least MIN_FEE_USD");
        }
        Ok(())
    }

    /// Fee recipient and chain for an order on `chain`. A chain-specific
    /// recipient wins over the default one.
    pub fn recipient_for(&self, chain: Option<Chain>) -> (Option<String>, Option<Chain>) {
        if let Some(chain) = chain {
            if let Some(address) = self.chain_recipients.get(&chain) {
                return (Some(address.clone()), Some(chain));
            }
        }
        (self.recipient.clone(), self.chain.or(chain))
    }
}
