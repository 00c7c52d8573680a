//! Candidate-amount retry ladder shared by the deposit flow.

use bigdecimal::BigDecimal;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::providers::{ErrorClass, ProviderError, ProviderResult};
use crate::validation::ValidationError;

/// Reductions applied to the requested amount, in basis points.
pub const AMOUNT_REDUCTIONS_BPS: [u32; 5] = [0, 20, 50, 100, 200];

/// Decimal places sent to providers.
pub const AMOUNT_SCALE: i64 = 8;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the `n`th retry after a transient failure (1-based):
    /// `base * 2^(n-1)`, capped at `max_delay`.
    pub fn delay_for(&self, n: u32) -> Duration {
        let factor = 1u32 << n.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// The exact amount followed by successively reduced ones. Strictly
/// decreasing, never above `amount`, never zero.
pub fn amount_ladder(amount: &BigDecimal) -> Vec<BigDecimal> {
    let zero = BigDecimal::from(0);
    let full = BigDecimal::from(10_000);
    let mut ladder: Vec<BigDecimal> = Vec::with_capacity(AMOUNT_REDUCTIONS_BPS.len());

    for bps in AMOUNT_REDUCTIONS_BPS {
        let candidate = (amount * BigDecimal::from(10_000 - bps) / &full).with_scale(AMOUNT_SCALE);
        if candidate <= zero {
            continue;
        }
        if ladder.last().map_or(true, |previous| candidate < *previous) {
            ladder.push(candidate);
        }
    }

    ladder
}

/// Calls `attempt` with each candidate until one succeeds.
///
/// Validation and fatal errors stop the ladder at once. Amount rejections move
/// to the next candidate; transient errors back off first. When every candidate
/// fails, the last amount/transient error is returned.
pub async fn run_ladder<T, F, Fut>(
    candidates: &[BigDecimal],
    policy: &RetryPolicy,
    mut attempt: F,
) -> ProviderResult<(BigDecimal, T)>
where
    F: FnMut(BigDecimal) -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut last_error: Option<ProviderError> = None;
    let mut transient_failures = 0u32;

    for (index, amount) in candidates.iter().enumerate() {
        let error = match attempt(amount.clone()).await {
            Ok(value) => return Ok((amount.clone(), value)),
            Err(error) => error,
        };

        match error.class() {
            ErrorClass::Validation | ErrorClass::Fatal => return Err(error),
            ErrorClass::AmountRejected => {
                warn!(attempt = index + 1, amount = %amount, error = %error, "Amount rejected, trying next candidate");
            }
            ErrorClass::Transient => {
                transient_failures += 1;
                warn!(attempt = index + 1, amount = %amount, error = %error, "Transient provider failure");
                if index + 1 < candidates.len() {
                    sleep(policy.delay_for(transient_failures)).await;
                }
            }
        }
        last_error = Some(error);
    }

    Err(last_error.unwrap_or_else(|| {
        ProviderError::Validation(ValidationError::new("amount", "is too small to quote"))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn transient() -> ProviderError {
        ProviderError::Transient {
            provider: "stub",
            pair: "USDT/tron -> ETH/ethereum".to_string(),
            message: "HTTP 503".to_string(),
        }
    }

    #[test]
    fn ladder_is_strictly_decreasing() {
        let ladder = amount_ladder(&dec("100"));
        assert_eq!(
            ladder,
            vec![dec("100"), dec("99.8"), dec("99.5"), dec("99"), dec("98")]
        );
    }

    #[test]
    fn ladder_never_exceeds_original_and_stays_positive() {
        for raw in ["0.00000001", "0.0000001", "1", "12345.123456789"] {
            let amount = dec(raw);
            let ladder = amount_ladder(&amount);
            assert!(!ladder.is_empty(), "{}", raw);
            assert!(ladder.len() <= AMOUNT_REDUCTIONS_BPS.len());
            assert!(ladder.iter().all(|c| *c <= amount && *c > BigDecimal::from(0)));
            assert!(ladder.windows(2).all(|w| w[1] < w[0]));
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(5), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn stops_on_first_success() {
        let calls = AtomicUsize::new(0);
        let ladder = amount_ladder(&dec("100"));
        let (amount, value) = run_ladder(&ladder, &RetryPolicy::immediate(), |amount| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 2 {
                    Err(transient())
                } else {
                    Ok(amount.to_string())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(amount, dec("99.5"));
        assert_eq!(value, "99.50000000");
    }

    #[tokio::test]
    async fn fatal_error_aborts_immediately() {
        let calls = AtomicUsize::new(0);
        let ladder = amount_ladder(&dec("100"));
        let result: ProviderResult<(BigDecimal, ())> =
            run_ladder(&ladder, &RetryPolicy::immediate(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ProviderError::Auth {
                        provider: "stub",
                        key_var: "STUB_API_KEY",
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Auth { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_informative_error() {
        let calls = AtomicUsize::new(0);
        let ladder = amount_ladder(&dec("100"));
        let result: ProviderResult<(BigDecimal, ())> =
            run_ladder(&ladder, &RetryPolicy::immediate(), |_| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call % 2 == 0 {
                        Err(transient())
                    } else {
                        Err(ProviderError::AmountOutOfRange {
                            provider: "stub",
                            pair: "USDT/tron -> ETH/ethereum".to_string(),
                            message: "below minimum".to_string(),
                        })
                    }
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), ladder.len());
        assert!(matches!(result, Err(ProviderError::Transient { .. })));
    }
}
