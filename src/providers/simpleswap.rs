//! SimpleSwap adapter. The API key travels as the `api_key` query parameter
//! and tokens are addressed by chain-qualified tickers (`usdttrc20`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::domain::Chain;
use crate::providers::http::{
    decimal_field, decimal_value, implied_rate, string_field, transient, ApiKey, HttpSettings,
    ProviderHttp,
};
use crate::providers::{
    ensure_distinct, ExchangeParams, ExchangeStatus, ProviderError, ProviderQuote, ProviderResult,
    ProviderStatus, RateQuote, RateRequest, SwapProvider,
};

pub const PROVIDER: &str = "simpleswap";
pub const KEY_VAR: &str = "SIMPLESWAP_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.simpleswap.io";

pub struct SimpleSwapProvider {
    http: ProviderHttp,
    api_key: ApiKey,
}

/// SimpleSwap ticker for `asset` on `chain`. `None` when the chain has no
/// token standard the provider lists.
pub fn currency_code(asset: &str, chain: Chain) -> Option<String> {
    let symbol = asset.to_ascii_lowercase();

    if chain.is_native(asset) {
        let code = match chain {
            Chain::Ethereum => "eth",
            Chain::Arbitrum => "etharb",
            Chain::Optimism => "ethop",
            Chain::Base => "ethbase",
            Chain::Bsc => "bnbbsc",
            Chain::Polygon => "matic",
            Chain::Avalanche => "avaxc",
            Chain::Tron => "trx",
            Chain::Solana => "sol",
            Chain::Bitcoin => "btc",
        };
        return Some(code.to_string());
    }

    let suffix = match chain {
        Chain::Ethereum => "erc20",
        Chain::Bsc => "bep20",
        Chain::Tron => "trc20",
        Chain::Polygon => "polygon",
        Chain::Arbitrum => "arb",
        Chain::Optimism => "op",
        Chain::Base => "base",
        Chain::Avalanche => "avaxc",
        Chain::Solana => "sol",
        Chain::Bitcoin => return None,
    };
    Some(format!("{}{}", symbol, suffix))
}

impl SimpleSwapProvider {
    pub fn new(base_url: String, api_key: ApiKey, settings: &HttpSettings) -> Self {
        Self {
            http: ProviderHttp::new(PROVIDER, KEY_VAR, base_url, settings),
            api_key,
        }
    }

    fn codes(
        &self,
        from_asset: &str,
        from_chain: Chain,
        to_asset: &str,
        to_chain: Chain,
        pair: &str,
    ) -> ProviderResult<(String, String)> {
        let unsupported = |asset: &str, chain: Chain| ProviderError::UnsupportedPair {
            provider: PROVIDER,
            pair: pair.to_string(),
            message: format!("no {} token listing for {}", chain, asset.to_ascii_uppercase()),
        };
        let from = currency_code(from_asset, from_chain).ok_or_else(|| unsupported(from_asset, from_chain))?;
        let to = currency_code(to_asset, to_chain).ok_or_else(|| unsupported(to_asset, to_chain))?;
        Ok((from, to))
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)], pair: &str) -> ProviderResult<Value> {
        let request = self
            .http
            .client()
            .get(self.http.url(path))
            .query(&[("api_key", self.api_key.expose())])
            .query(query);
        self.http.send(request, pair).await
    }
}

#[async_trait]
impl SwapProvider for SimpleSwapProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn create_exchange(&self, params: &ExchangeParams) -> ProviderResult<ProviderQuote> {
        params.validate()?;
        let pair = params.pair();
        let (currency_from, currency_to) = self.codes(
            &params.from_asset,
            params.from_chain,
            &params.to_asset,
            params.to_chain,
            &pair,
        )?;

        let body = json!({
            "fixed": false,
            "currency_from": currency_from,
            "currency_to": currency_to,
            "amount": params.amount.to_string(),
            "address_to": params.recipient_address.trim(),
            "extra_id_to": "",
            "user_refund_address": params.refund_address.as_deref().unwrap_or(""),
            "user_refund_extra_id": "",
        });

        let request = self
            .http
            .client()
            .post(self.http.url("create_exchange"))
            .query(&[("api_key", self.api_key.expose())])
            .json(&body);
        let response = self.http.send(request, &pair).await?;

        let exchange_id = string_field(&response, "id")
            .ok_or_else(|| transient(PROVIDER, &pair, "response is missing the exchange id".to_string()))?;
        let deposit_address = string_field(&response, "address_from")
            .ok_or_else(|| transient(PROVIDER, &pair, "response is missing address_from".to_string()))?;
        let estimated_output_amount = decimal_field(&response, "amount_to")
            .ok_or_else(|| transient(PROVIDER, &pair, "response is missing amount_to".to_string()))?;
        let valid_until = string_field(&response, "valid_until")
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|ts| ts.with_timezone(&Utc));

        info!(provider = PROVIDER, pair = %pair, exchange_id = %exchange_id, "Exchange created");

        Ok(ProviderQuote {
            rate: implied_rate(&params.amount, &estimated_output_amount),
            deposit_address,
            exchange_id,
            estimated_output_amount,
            valid_until,
        })
    }

    async fn get_status(&self, exchange_id: &str) -> ProviderResult<ExchangeStatus> {
        let label = format!("exchange {}", exchange_id);
        let body = self
            .get_json("get_exchange", &[("id", exchange_id.to_string())], &label)
            .await?;

        let raw = string_field(&body, "status")
            .ok_or_else(|| transient(PROVIDER, &label, "response is missing status".to_string()))?;
        let provider_status: ProviderStatus = raw
            .parse()
            .map_err(|_| transient(PROVIDER, &label, format!("unknown status '{}'", raw)))?;

        let mut status = ExchangeStatus::new(provider_status);
        status.deposit_tx_hash = string_field(&body, "tx_from");
        status.swap_tx_hash = string_field(&body, "tx_to");
        status.from_amount = decimal_field(&body, "amount_from");
        status.to_amount = decimal_field(&body, "amount_to");
        if let (Some(from), Some(to)) = (&status.from_amount, &status.to_amount) {
            status.rate = implied_rate(from, to);
        }
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
        let (currency_from, currency_to) = self.codes(
            &request.from_asset,
            request.from_chain,
            &request.to_asset,
            request.to_chain,
            &pair,
        )?;

        let query = [
            ("fixed", "false".to_string()),
            ("currency_from", currency_from.clone()),
            ("currency_to", currency_to.clone()),
            ("amount", request.amount.to_string()),
        ];
        let body = self.get_json("get_estimated", &query, &pair).await?;
        let estimated_output_amount = decimal_value(&body)
            .ok_or_else(|| transient(PROVIDER, &pair, "estimate is not a number".to_string()))?;

        let range_query = [
            ("fixed", "false".to_string()),
            ("currency_from", currency_from),
            ("currency_to", currency_to),
        ];
        let (min_amount, max_amount) = match self.get_json("get_ranges", &range_query, &pair).await {
            Ok(range) => (decimal_field(&range, "min"), decimal_field(&range, "max")),
            Err(e) => {
                debug!(provider = PROVIDER, pair = %pair, error = %e, "Range lookup failed");
                (None, None)
            }
        };

        Ok(RateQuote {
            rate: implied_rate(&request.amount, &estimated_output_amount),
            estimated_output_amount,
            min_amount,
            max_amount,
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

    const TRON_RECIPIENT: &str = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";

    fn provider(url: String) -> SimpleSwapProvider {
        SimpleSwapProvider::new(url, ApiKey::new("ss-key"), &HttpSettings::default())
    }

    #[test]
    fn builds_chain_qualified_codes() {
        assert_eq!(currency_code("USDT", Chain::Tron).as_deref(), Some("usdttrc20"));
        assert_eq!(currency_code("USDT", Chain::Ethereum).as_deref(), Some("usdterc20"));
        assert_eq!(currency_code("usdc", Chain::Bsc).as_deref(), Some("usdcbep20"));
        assert_eq!(currency_code("ETH", Chain::Base).as_deref(), Some("ethbase"));
        assert_eq!(currency_code("BTC", Chain::Bitcoin).as_deref(), Some("btc"));
        assert_eq!(currency_code("USDT", Chain::Bitcoin), None);
    }

    #[tokio::test]
    async fn creates_exchange_with_query_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/create_exchange")
            .match_query(mockito::Matcher::UrlEncoded("api_key".into(), "ss-key".into()))
            .match_body(mockito::Matcher::PartialJson(json!({
                "currency_from": "ethbase",
                "currency_to": "usdttrc20",
                "address_to": TRON_RECIPIENT
            })))
            .with_status(200)
            .with_body(r#"{"id":"ss-9","address_from":"0x52908400098527886E0F7030069857D2E4169EE7","amount_to":"3120.5","valid_until":"2030-01-01T00:00:00Z"}"#)
            .create_async()
            .await;

        let params = ExchangeParams {
            from_chain: Chain::Base,
            from_asset: "ETH".to_string(),
            to_chain: Chain::Tron,
            to_asset: "USDT".to_string(),
            amount: BigDecimal::from(1),
            recipient_address: TRON_RECIPIENT.to_string(),
            refund_address: None,
            order_id: None,
        };
        let quote = provider(server.url()).create_exchange(&params).await.unwrap();

        mock.assert_async().await;
        assert_eq!(quote.exchange_id, "ss-9");
        assert_eq!(quote.estimated_output_amount, BigDecimal::from_str("3120.5").unwrap());
        assert!(quote.valid_until.is_some());
    }

    #[tokio::test]
    async fn reads_bare_estimate() {
        let mut server = mockito::Server::new_async().await;
        let _estimate = server
            .mock("GET", "/get_estimated")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#""19.8""#)
            .create_async()
            .await;
        let _ranges = server
            .mock("GET", "/get_ranges")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"min":"5","max":null}"#)
            .create_async()
            .await;

        let request = RateRequest {
            from_asset: "USDT".to_string(),
            to_asset: "USDC".to_string(),
            from_chain: Chain::Tron,
            to_chain: Chain::Polygon,
            amount: BigDecimal::from(20),
        };
        let quote = provider(server.url()).get_rate(&request).await.unwrap();
        assert_eq!(quote.estimated_output_amount, BigDecimal::from_str("19.8").unwrap());
        assert_eq!(quote.rate, Some(BigDecimal::from_str("0.99").unwrap()));
        assert_eq!(quote.min_amount, Some(BigDecimal::from(5)));
    }

    #[tokio::test]
    async fn amount_outside_range_is_reported_as_amount_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/get_estimated")
            .match_query(mockito::Matcher::Any)
            .with_status(422)
            .with_body(r#"{"code":422,"error":"Unprocessable Entity","description":"Amount does not fall within the range."}"#)
            .create_async()
            .await;

        let request = RateRequest {
            from_asset: "USDT".to_string(),
            to_asset: "BTC".to_string(),
            from_chain: Chain::Tron,
            to_chain: Chain::Bitcoin,
            amount: BigDecimal::from(1),
        };
        let err = provider(server.url()).get_rate(&request).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::AmountRejected);
        assert!(err.to_string().contains("USDT/tron -> BTC/bitcoin"));
    }

    #[tokio::test]
    async fn maps_refunded_to_failed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/get_exchange")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id":"ss-9","status":"refunded","tx_from":"abc","tx_to":null}"#)
            .create_async()
            .await;

        let status = provider(server.url()).get_status("ss-9").await.unwrap();
        assert_eq!(status.status, OrderStatus::Failed);
        assert_eq!(status.deposit_tx_hash.as_deref(), Some("abc"));
    }
}
