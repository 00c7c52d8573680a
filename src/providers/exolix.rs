//! Exolix v2 adapter. Authenticates with a raw `Authorization` header and
//! addresses assets as coin + network pairs.
//!
//! The provider only swaps on networks listed in its catalogue, so
//! [`ExolixProvider::connect`] loads that list once at startup. When the
//! catalogue cannot be fetched the adapter falls back to
//! [`DEFAULT_NETWORKS`] and pairs outside it are reported as unsupported.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::domain::Chain;
use crate::providers::http::{
    decimal_field, implied_rate, string_field, transient, ApiKey, HttpSettings, ProviderHttp,
};
use crate::providers::{
    ensure_distinct, ExchangeParams, ExchangeStatus, ProviderError, ProviderQuote, ProviderResult,
    ProviderStatus, RateQuote, RateRequest, SwapProvider,
};

pub const PROVIDER: &str = "exolix";
pub const KEY_VAR: &str = "EXOLIX_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://exolix.com/api/v2";

/// Networks assumed available when the catalogue is unreachable.
pub const DEFAULT_NETWORKS: &[&str] = &["ETH", "BSC", "TRX", "SOL", "BTC", "MATIC"];

pub struct ExolixProvider {
    http: ProviderHttp,
    api_key: ApiKey,
    networks: HashSet<String>,
}

pub fn network_code(chain: Chain) -> &'static str {
    match chain {
        Chain::Ethereum => "ETH",
        Chain::Bsc => "BSC",
        Chain::Polygon => "MATIC",
        Chain::Arbitrum => "ARBITRUM",
        Chain::Optimism => "OPTIMISM",
        Chain::Base => "BASE",
        Chain::Avalanche => "AVAXC",
        Chain::Tron => "TRX",
        Chain::Solana => "SOL",
        Chain::Bitcoin => "BTC",
    }
}

fn parse_status(raw: &str) -> Option<ProviderStatus> {
    let status = match raw.to_ascii_lowercase().as_str() {
        "wait" => ProviderStatus::Waiting,
        "confirmation" | "confirmed" => ProviderStatus::Confirming,
        "exchanging" => ProviderStatus::Exchanging,
        "sending" => ProviderStatus::Sending,
        "success" => ProviderStatus::Finished,
        "overdue" => ProviderStatus::Expired,
        "refunded" => ProviderStatus::Refunded,
        other => return other.parse().ok(),
    };
    Some(status)
}

/// `hashIn` / `hashOut` are objects (`{"hash": ..}`) or null.
fn tx_hash(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::Object(_) => string_field(&body[key], "hash"),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

impl ExolixProvider {
    /// Builds the adapter and loads the network catalogue.
    pub async fn connect(base_url: String, api_key: ApiKey, settings: &HttpSettings) -> Self {
        let http = ProviderHttp::new(PROVIDER, KEY_VAR, base_url, settings);
        let mut provider = Self {
            http,
            api_key,
            networks: HashSet::new(),
        };

        provider.networks = match provider.load_networks().await {
            Ok(networks) if !networks.is_empty() => {
                info!(provider = PROVIDER, count = networks.len(), "Network catalogue loaded");
                networks
            }
            Ok(_) => {
                warn!(provider = PROVIDER, "Network catalogue empty, using default network set");
                default_networks()
            }
            Err(e) => {
                warn!(provider = PROVIDER, error = %e, "Network catalogue unavailable, using default network set");
                default_networks()
            }
        };

        provider
    }

    pub fn supports(&self, chain: Chain) -> bool {
        self.networks.contains(network_code(chain))
    }

    async fn load_networks(&self) -> ProviderResult<HashSet<String>> {
        let request = self
            .http
            .client()
            .get(self.http.url("networks"))
            .header(reqwest::header::AUTHORIZATION, self.api_key.expose())
            .query(&[("size", "200")]);
        let body = self.http.send(request, "network catalogue").await?;

        let entries = body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(entries
            .iter()
            .filter_map(|entry| string_field(entry, "network"))
            .map(|network| network.to_ascii_uppercase())
            .collect())
    }

    fn ensure_networks(&self, from_chain: Chain, to_chain: Chain, pair: &str) -> ProviderResult<()> {
        for chain in [from_chain, to_chain] {
            if !self.supports(chain) {
                return Err(ProviderError::UnsupportedPair {
                    provider: PROVIDER,
                    pair: pair.to_string(),
                    message: format!("network {} is not available", chain),
                });
            }
        }
        Ok(())
    }
}

fn default_networks() -> HashSet<String> {
    DEFAULT_NETWORKS.iter().map(|n| n.to_string()).collect()
}

#[async_trait]
impl SwapProvider for ExolixProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn create_exchange(&self, params: &ExchangeParams) -> ProviderResult<ProviderQuote> {
        params.validate()?;
        let pair = params.pair();
        self.ensure_networks(params.from_chain, params.to_chain, &pair)?;

        let body = json!({
            "coinFrom": params.from_asset.to_ascii_uppercase(),
            "networkFrom": network_code(params.from_chain),
            "coinTo": params.to_asset.to_ascii_uppercase(),
            "networkTo": network_code(params.to_chain),
            "amount": params.amount.to_string(),
            "withdrawalAddress": params.recipient_address.trim(),
            "withdrawalExtraId": "",
            "refundAddress": params.refund_address.as_deref().unwrap_or(""),
            "rateType": "float",
        });

        let request = self
            .http
            .client()
            .post(self.http.url("transactions"))
            .header(reqwest::header::AUTHORIZATION, self.api_key.expose())
            .json(&body);
        let response = self.http.send(request, &pair).await?;

        let exchange_id = string_field(&response, "id")
            .ok_or_else(|| transient(PROVIDER, &pair, "response is missing the transaction id".to_string()))?;
        let deposit_address = string_field(&response, "depositAddress")
            .ok_or_else(|| transient(PROVIDER, &pair, "response is missing depositAddress".to_string()))?;
        let estimated_output_amount = decimal_field(&response, "amountTo")
            .ok_or_else(|| transient(PROVIDER, &pair, "response is missing amountTo".to_string()))?;

        info!(provider = PROVIDER, pair = %pair, exchange_id = %exchange_id, "Exchange created");

        Ok(ProviderQuote {
            rate: decimal_field(&response, "rate")
                .or_else(|| implied_rate(&params.amount, &estimated_output_amount)),
            deposit_address,
            exchange_id,
            estimated_output_amount,
            valid_until: None,
        })
    }

    async fn get_status(&self, exchange_id: &str) -> ProviderResult<ExchangeStatus> {
        let label = format!("exchange {}", exchange_id);
        let request = self
            .http
            .client()
            .get(self.http.url(&format!("transactions/{}", exchange_id)))
            .header(reqwest::header::AUTHORIZATION, self.api_key.expose());
        let body = self.http.send(request, &label).await?;

        let raw = string_field(&body, "status")
            .ok_or_else(|| transient(PROVIDER, &label, "response is missing status".to_string()))?;
        let provider_status = parse_status(&raw)
            .ok_or_else(|| transient(PROVIDER, &label, format!("unknown status '{}'", raw)))?;

        let mut status = ExchangeStatus::new(provider_status);
        status.deposit_tx_hash = tx_hash(&body, "hashIn");
        status.swap_tx_hash = tx_hash(&body, "hashOut");
        status.from_amount = decimal_field(&body, "amount");
        status.to_amount = decimal_field(&body, "amountTo");
        status.rate = decimal_field(&body, "rate");
        Ok(status)
    }

    async fn get_rate(&self, request: &RateRequest) -> ProviderResult<RateQuote> {
        ensure_distinct(
            &request.from_asset,
            request.from_chain,
            &request.to_asset,
            request.to_chain,
        )?;
        let pair = request.pair();
        self.ensure_networks(request.from_chain, request.to_chain, &pair)?;

        let query = [
            ("coinFrom", request.from_asset.to_ascii_uppercase()),
            ("networkFrom", network_code(request.from_chain).to_string()),
            ("coinTo", request.to_asset.to_ascii_uppercase()),
            ("networkTo", network_code(request.to_chain).to_string()),
            ("amount", request.amount.to_string()),
            ("rateType", "float".to_string()),
        ];
        let http_request = self
            .http
            .client()
            .get(self.http.url("rate"))
            .header(reqwest::header::AUTHORIZATION, self.api_key.expose())
            .query(&query);
        let body = self.http.send(http_request, &pair).await?;

        let estimated_output_amount = decimal_field(&body, "toAmount")
            .ok_or_else(|| transient(PROVIDER, &pair, "rate is missing toAmount".to_string()))?;

        Ok(RateQuote {
            rate: decimal_field(&body, "rate")
                .or_else(|| implied_rate(&request.amount, &estimated_output_amount)),
            estimated_output_amount,
            min_amount: decimal_field(&body, "minAmount"),
            max_amount: decimal_field(&body, "maxAmount"),
        })
    }

    fn circuit_state(&self) -> &'static str {
        self.http.circuit_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderStatus;
    use crate::providers::ErrorClass;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    const EVM_RECIPIENT: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    async fn connected(server: &mut mockito::ServerGuard, catalogue: &str) -> ExolixProvider {
        server
            .mock("GET", "/networks")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(catalogue)
            .create_async()
            .await;
        ExolixProvider::connect(server.url(), ApiKey::new("ex-key"), &HttpSettings::default()).await
    }

    #[test]
    fn normalises_exolix_statuses() {
        assert_eq!(parse_status("wait"), Some(ProviderStatus::Waiting));
        assert_eq!(parse_status("confirmed"), Some(ProviderStatus::Confirming));
        assert_eq!(parse_status("success"), Some(ProviderStatus::Finished));
        assert_eq!(parse_status("overdue"), Some(ProviderStatus::Expired));
        assert_eq!(parse_status("mystery"), None);
    }

    #[tokio::test]
    async fn loads_catalogue_on_connect() {
        let mut server = mockito::Server::new_async().await;
        let provider = connected(
            &mut server,
            r#"{"data":[{"network":"ETH"},{"network":"base"}],"count":2}"#,
        )
        .await;

        assert!(provider.supports(Chain::Ethereum));
        assert!(provider.supports(Chain::Base));
        assert!(!provider.supports(Chain::Tron));
    }

    #[tokio::test]
    async fn falls_back_to_default_networks() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/networks")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;
        let provider =
            ExolixProvider::connect(server.url(), ApiKey::new("ex-key"), &HttpSettings::default()).await;

        assert!(provider.supports(Chain::Tron));
        assert!(!provider.supports(Chain::Base));
    }

    #[tokio::test]
    async fn unsupported_network_is_fatal_without_network_call() {
        let mut server = mockito::Server::new_async().await;
        let provider = connected(&mut server, r#"{"data":[{"network":"ETH"}]}"#).await;
        let mock = server.mock("POST", "/transactions").expect(0).create_async().await;

        let params = ExchangeParams {
            from_chain: Chain::Solana,
            from_asset: "SOL".to_string(),
            to_chain: Chain::Ethereum,
            to_asset: "USDC".to_string(),
            amount: BigDecimal::from(3),
            recipient_address: EVM_RECIPIENT.to_string(),
            refund_address: None,
            order_id: None,
        };
        let err = provider.create_exchange(&params).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.class(), ErrorClass::Fatal);
        assert!(err.to_string().contains("SOL/solana -> USDC/ethereum"));
    }

    #[tokio::test]
    async fn creates_transaction_and_reads_status() {
        let mut server = mockito::Server::new_async().await;
        let provider = connected(&mut server, r#"{"data":[{"network":"ETH"},{"network":"TRX"}]}"#).await;
        let _create = server
            .mock("POST", "/transactions")
            .match_header("authorization", "ex-key")
            .with_status(201)
            .with_body(r#"{"id":"ex-77","depositAddress":"TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7","amount":"250","amountTo":"248.1","rate":"0.9924","status":"wait"}"#)
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/transactions/ex-77")
            .with_status(200)
            .with_body(r#"{"id":"ex-77","status":"exchanging","hashIn":{"hash":"0xin","link":null},"hashOut":{"hash":null,"link":null}}"#)
            .create_async()
            .await;

        let params = ExchangeParams {
            from_chain: Chain::Tron,
            from_asset: "USDT".to_string(),
            to_chain: Chain::Ethereum,
            to_asset: "USDT".to_string(),
            amount: BigDecimal::from(250),
            recipient_address: EVM_RECIPIENT.to_string(),
            refund_address: Some("TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7".to_string()),
            order_id: None,
        };
        let quote = provider.create_exchange(&params).await.unwrap();
        assert_eq!(quote.exchange_id, "ex-77");
        assert_eq!(quote.rate, Some(BigDecimal::from_str("0.9924").unwrap()));

        let status = provider.get_status("ex-77").await.unwrap();
        assert_eq!(status.status, OrderStatus::Processing);
        assert_eq!(status.deposit_tx_hash.as_deref(), Some("0xin"));
        assert_eq!(status.swap_tx_hash, None);
    }
}
