//! HTTP plumbing shared by the provider adapters: circuit breaker, hard
//! timeouts, failure classification and lenient JSON field readers.

use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::providers::{ProviderError, ProviderResult};

const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// Provider credential. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub call_timeout: Duration,
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(15),
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client bound to one provider's base URL.
#[derive(Clone)]
pub struct ProviderHttp {
    provider: &'static str,
    key_var: &'static str,
    client: Client,
    base_url: String,
    call_timeout: Duration,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl ProviderHttp {
    pub fn new(
        provider: &'static str,
        key_var: &'static str,
        base_url: String,
        settings: &HttpSettings,
    ) -> Self {
        let client = Client::builder()
            .timeout(settings.call_timeout)
            .build()
            .unwrap_or_default();

        let reset_secs = settings.reset_timeout.as_secs().max(1);
        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_secs),
            Duration::from_secs(reset_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(settings.failure_threshold.max(1), backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            provider,
            key_var,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            call_timeout: settings.call_timeout,
            circuit_breaker,
        }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    /// Sends `request` and returns the decoded JSON body.
    ///
    /// Only transient failures count against the circuit breaker.
    pub async fn send(&self, request: RequestBuilder, pair: &str) -> ProviderResult<Value> {
        let provider = self.provider;
        let key_var = self.key_var;
        let call_timeout = self.call_timeout;
        let call_pair = pair.to_string();

        let result = self
            .circuit_breaker
            .call_with(
                |e: &ProviderError| e.is_retryable(),
                async move {
                    let pair = call_pair;
                    let exchange = async {
                        let response = request.send().await?;
                        let status = response.status();
                        let body = response.text().await?;
                        Ok::<_, reqwest::Error>((status, body))
                    };

                    let (status, body) = match tokio::time::timeout(call_timeout, exchange).await {
                        Ok(Ok(reply)) => reply,
                        Ok(Err(e)) => {
                            return Err(transient(
                                provider,
                                &pair,
                                format!("request failed: {}", e.without_url()),
                            ))
                        }
                        Err(_) => {
                            return Err(transient(
                                provider,
                                &pair,
                                format!("timed out after {}ms", call_timeout.as_millis()),
                            ))
                        }
                    };

                    if status.is_success() {
                        return serde_json::from_str::<Value>(&body).map_err(|_| {
                            transient(provider, &pair, "malformed response body".to_string())
                        });
                    }

                    Err(classify_failure(provider, key_var, &pair, status, &body))
                },
            )
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(ProviderError::Transient {
                provider: self.provider,
                pair: pair.to_string(),
                message: "circuit breaker is open".to_string(),
            }),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

pub fn transient(provider: &'static str, pair: &str, message: String) -> ProviderError {
    ProviderError::Transient {
        provider,
        pair: pair.to_string(),
        message,
    }
}

/// Maps a non-2xx provider reply onto the error taxonomy.
pub fn classify_failure(
    provider: &'static str,
    key_var: &'static str,
    pair: &str,
    status: StatusCode,
    body: &str,
) -> ProviderError {
    let message = error_message(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    let pair = pair.to_string();

    match status.as_u16() {
        401 | 403 => ProviderError::Auth { provider, key_var },
        408 | 429 => ProviderError::Transient {
            provider,
            pair,
            message,
        },
        code if code >= 500 => ProviderError::Transient {
            provider,
            pair,
            message: format!("HTTP {}: {}", code, message),
        },
        code => {
            let lowered = message.to_ascii_lowercase();
            if mentions_amount(&lowered) {
                ProviderError::AmountOutOfRange {
                    provider,
                    pair,
                    message,
                }
            } else if code == 404 || mentions_pair(&lowered) {
                ProviderError::UnsupportedPair {
                    provider,
                    pair,
                    message,
                }
            } else {
                ProviderError::Rejected {
                    provider,
                    pair,
                    message,
                }
            }
        }
    }
}

fn mentions_amount(message: &str) -> bool {
    if message.contains("out_of_range") || message.contains("too small") || message.contains("too_small") {
        return true;
    }
    message.contains("amount")
        && ["min", "max", "less", "greater", "low", "high", "range", "precision"]
            .iter()
            .any(|word| message.contains(word))
}

fn mentions_pair(message: &str) -> bool {
    ["pair", "inactive", "unsupported", "not supported", "not available", "unknown currency"]
        .iter()
        .any(|word| message.contains(word))
}

/// Pulls a human-readable error out of a provider error body.
pub fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let message = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => {
            let code = map.get("error").and_then(Value::as_str);
            let text = ["message", "description", "detail"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str));
            match (code, text) {
                (Some(code), Some(text)) => format!("{}: {}", code, text),
                (Some(code), None) => code.to_string(),
                (None, Some(text)) => text.to_string(),
                (None, None) => trimmed.to_string(),
            }
        }
        Ok(Value::String(text)) => text,
        _ => trimmed.to_string(),
    };

    Some(message.chars().take(MAX_ERROR_MESSAGE_LEN).collect())
}

/// Reads a decimal that providers send either as a JSON number or a string.
pub fn decimal_value(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

pub fn decimal_field(body: &Value, key: &str) -> Option<BigDecimal> {
    body.get(key).and_then(decimal_value)
}

/// Non-empty string field, also accepting numeric ids.
pub fn string_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `output / input`, or `None` when the input is zero.
pub fn implied_rate(input: &BigDecimal, output: &BigDecimal) -> Option<BigDecimal> {
    if input <= &BigDecimal::from(0) {
        return None;
    }
    Some(output / input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ErrorClass;

    const PAIR: &str = "USDT/tron -> ETH/ethereum";

    fn classify(status: u16, body: &str) -> ProviderError {
        classify_failure(
            "changenow",
            "CHANGENOW_API_KEY",
            PAIR,
            StatusCode::from_u16(status).unwrap(),
            body,
        )
    }

    #[test]
    fn auth_failures_are_fatal_and_hide_credentials() {
        let err = classify(401, r#"{"message":"invalid api key abc123"}"#);
        assert!(matches!(err, ProviderError::Auth { .. }));
        assert_eq!(err.class(), ErrorClass::Fatal);
        assert!(!err.to_string().contains("abc123"));
        assert!(err.to_string().contains("CHANGENOW_API_KEY"));
    }

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert!(classify(502, "bad gateway").is_retryable());
        assert!(classify(429, "").is_retryable());
    }

    #[test]
    fn amount_rejections_are_their_own_class() {
        let err = classify(
            400,
            r#"{"error":"out_of_range","message":"Amount is less than minimal: 12.5"}"#,
        );
        assert_eq!(err.class(), ErrorClass::AmountRejected);
        assert!(err.to_string().contains(PAIR));
    }

    #[test]
    fn pair_rejections_are_fatal() {
        let err = classify(400, r#"{"error":"pair_is_inactive","message":"Pair is inactive"}"#);
        assert!(matches!(err, ProviderError::UnsupportedPair { .. }));
        assert!(matches!(classify(404, "{}"), ProviderError::UnsupportedPair { .. }));
        assert!(matches!(
            classify(400, r#"{"message":"address is malformed"}"#),
            ProviderError::Rejected { .. }
        ));
    }

    #[test]
    fn reads_numbers_and_strings() {
        let body = serde_json::json!({"a": 1.5, "b": "2.25", "c": null, "id": 42});
        assert_eq!(decimal_field(&body, "a"), Some(BigDecimal::from_str("1.5").unwrap()));
        assert_eq!(decimal_field(&body, "b"), Some(BigDecimal::from_str("2.25").unwrap()));
        assert_eq!(decimal_field(&body, "c"), None);
        assert_eq!(string_field(&body, "id").as_deref(), Some("42"));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
        assert_eq!(key.expose(), "super-secret");
    }

    #[test]
    fn circuit_starts_closed() {
        let http = ProviderHttp::new(
            "changenow",
            "CHANGENOW_API_KEY",
            "https://api.changenow.io/v2/".to_string(),
            &HttpSettings::default(),
        );
        assert_eq!(http.circuit_state(), "closed");
        assert_eq!(http.url("/exchange"), "https://api.changenow.io/v2/exchange");
    }
}
