use anyhow::Context;
use dotenvy::dotenv;
use std::collections::{HashMap, HashSet};
use std::env;
use std::time::Duration;

use crate::providers::http::{ApiKey, HttpSettings};
use crate::providers::{changenow, exolix, simpleswap, ProviderKind};
use crate::services::retry::RetryPolicy;

pub mod fees;

pub use fees::FeeConfig;

/// Endpoint and credential of one swap provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: Option<ApiKey>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub primary_provider: ProviderKind,
    pub fallback_providers: Vec<ProviderKind>,
    pub providers: HashMap<ProviderKind, ProviderSettings>,
    pub fees: FeeConfig,
    pub http: HttpSettings,
    pub retry: RetryPolicy,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub log_json: bool,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} is not valid", name)),
        Err(_) => Ok(default),
    }
}

fn provider_settings(
    kind: ProviderKind,
    url_var: &str,
    default_url: &str,
    key_var: &str,
) -> anyhow::Result<(ProviderKind, ProviderSettings)> {
    let base_url = env::var(url_var).unwrap_or_else(|_| default_url.to_string());
    url::Url::parse(&base_url).with_context(|| format!("{} is not a valid URL", url_var))?;

    let api_key = env::var(key_var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(ApiKey::new);

    Ok((kind, ProviderSettings { base_url, api_key }))
}

fn parse_provider_list(raw: &str) -> anyhow::Result<Vec<ProviderKind>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.parse::<ProviderKind>().map_err(anyhow::Error::msg))
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let primary_provider = env::var("SWAP_PROVIDER")
            .unwrap_or_else(|_| "changenow".to_string())
            .parse::<ProviderKind>()
            .map_err(anyhow::Error::msg)?;

        let mut fallback_providers =
            parse_provider_list(&env::var("SWAP_FALLBACK_PROVIDERS").unwrap_or_default())?;
        let mut seen = HashSet::new();
        fallback_providers.retain(|kind| *kind != primary_provider && seen.insert(*kind));

        let providers = [
            provider_settings(
                ProviderKind::ChangeNow,
                "CHANGENOW_API_URL",
                changenow::DEFAULT_BASE_URL,
                changenow::KEY_VAR,
            )?,
            provider_settings(
                ProviderKind::SimpleSwap,
                "SIMPLESWAP_API_URL",
                simpleswap::DEFAULT_BASE_URL,
                simpleswap::KEY_VAR,
            )?,
            provider_settings(
                ProviderKind::Exolix,
                "EXOLIX_API_URL",
                exolix::DEFAULT_BASE_URL,
                exolix::KEY_VAR,
            )?,
        ]
        .into_iter()
        .collect();

        let http = HttpSettings {
            call_timeout: Duration::from_secs(parse_var("PROVIDER_TIMEOUT_SECS", 15u64)?),
            failure_threshold: parse_var("CIRCUIT_BREAKER_THRESHOLD", 5u32)?,
            reset_timeout: Duration::from_secs(parse_var("CIRCUIT_BREAKER_RESET_SECS", 30u64)?),
        };

        let retry = RetryPolicy {
            base_delay: Duration::from_millis(parse_var("RETRY_BASE_DELAY_MS", 500u64)?),
            max_delay: Duration::from_millis(parse_var("RETRY_MAX_DELAY_MS", 5000u64)?),
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty() && raw != "*")
            .map(|raw| raw.split(',').map(|origin| origin.trim().to_string()).collect());

        let config = Config {
            server_port: parse_var("SERVER_PORT", 3000u16)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            primary_provider,
            fallback_providers,
            providers,
            fees: FeeConfig::from_env()?,
            http,
            retry,
            cors_allowed_origins,
            log_json: env::var("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.http.call_timeout.is_zero() {
            anyhow::bail!("PROVIDER_TIMEOUT_SECS must be greater than 0");
        }
        if self.retry.max_delay < self.retry.base_delay {
            anyhow::bail!("RETRY_MAX_DELAY_MS must be at least RETRY_BASE_DELAY_MS");
        }
        for kind in self.enabled_providers() {
            let has_key = self
                .providers
                .get(&kind)
                .and_then(|settings| settings.api_key.as_ref())
                .is_some();
            if !has_key {
                anyhow::bail!("{} is selected but its API key is not set", kind.as_str());
            }
        }
        Ok(())
    }

    /// Primary provider followed by the fallbacks, in order.
    pub fn enabled_providers(&self) -> Vec<ProviderKind> {
        std::iter::once(self.primary_provider)
            .chain(self.fallback_providers.iter().copied())
            .collect()
    }
}
