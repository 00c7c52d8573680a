//! ChangeNOW v2 adapter. Authenticates with the `x-changenow-api-key` header
//! and addresses assets as lowercase ticker + network code.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::domain::Chain;
use crate::providers::http::{
    decimal_field, implied_rate, string_field, transient, ApiKey, HttpSettings, ProviderHttp,
};
use crate::providers::{
    ensure_distinct, ExchangeParams, ExchangeStatus, ProviderQuote, ProviderResult, ProviderStatus,
    RateQuote, RateRequest, SwapProvider,
};

pub const PROVIDER: &str = "changenow";
pub const KEY_VAR: &str = "CHANGENOW_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.changenow.io/v2";
const API_KEY_HEADER: &str = "x-changenow-api-key";

pub struct ChangeNowProvider {
    http: ProviderHttp,
    api_key: ApiKey,
}

fn network_code(chain: Chain) -> &'static str {
    match chain {
        Chain::Ethereum => "eth",
        Chain::Bsc => "bsc",
        Chain::Polygon => "matic",
        Chain::Arbitrum => "arbitrum",
        Chain::Optimism => "op",
        Chain::Base => "base",
        Chain::Avalanche => "avaxc",
        Chain::Tron => "trx",
        Chain::Solana => "sol",
        Chain::Bitcoin => "btc",
    }
}

fn ticker(asset: &str) -> String {
    asset.to_ascii_lowercase()
}

fn parse_status(raw: &str) -> Option<ProviderStatus> {
    raw.parse().ok()
}

impl ChangeNowProvider {
    pub fn new(base_url: String, api_key: ApiKey, settings: &HttpSettings) -> Self {
        Self {
            http: ProviderHttp::new(PROVIDER, KEY_VAR, base_url, settings),
            api_key,
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)], pair: &str) -> ProviderResult<Value> {
        let request = self
            .http
            .client()
            .get(self.http.url(path))
            .header(API_KEY_HEADER, self.api_key.expose())
            .query(query);
        self.http.send(request, pair).await
    }

    /// Min/max deposit for the pair. Best effort: a failed lookup yields no bounds.
    async fn fetch_range(
        &self,
        request: &RateRequest,
        pair: &str,
    ) -> (Option<BigDecimal>, Option<BigDecimal>) {
        let query = [
            ("fromCurrency", ticker(&request.from_asset)),
            ("toCurrency", ticker(&request.to_asset)),
            ("fromNetwork", network_code(request.from_chain).to_string()),
            ("toNetwork", network_code(request.to_chain).to_string()),
            ("flow", "standard".to_string()),
        ];
        match self.get_json("exchange/range", &query, pair).await {
            Ok(body) => (decimal_field(&body, "minAmount"), decimal_field(&body, "maxAmount")),
            Err(e) => {
                debug!(provider = PROVIDER, pair = %pair, error = %e, "Range lookup failed");
                (None, None)
            }
        }
    }
}

#[async_trait]
impl SwapProvider for ChangeNowProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn create_exchange(&self, params: &ExchangeParams) -> ProviderResult<ProviderQuote> {
        params.validate()?;
        let pair = params.pair();

        let body = json!({
            "fromCurrency": ticker(&params.from_asset),
            "toCurrency": ticker(&params.to_asset),
            "fromNetwork": network_code(params.from_chain),
            "toNetwork": network_code(params.to_chain),
            "fromAmount": params.amount.to_string(),
            "address": params.recipient_address.trim(),
            "refundAddress": params.refund_address.as_deref().unwrap_or(""),
            "userId": params.order_id.as_deref().unwrap_or(""),
            "flow": "standard",
            "type": "direct",
        });

        let request = self
            .http
            .client()
            .post(self.http.url("exchange"))
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&body);
        let response = self.http.send(request, &pair).await?;

        let exchange_id = string_field(&response, "id")
            .ok_or_else(|| transient(PROVIDER, &pair, "response is missing the exchange id".to_string()))?;
        let deposit_address = string_field(&response, "payinAddress")
            .ok_or_else(|| transient(PROVIDER, &pair, "response is missing payinAddress".to_string()))?;
        let estimated_output_amount = decimal_field(&response, "toAmount")
            .or_else(|| decimal_field(&response, "amount"))
            .ok_or_else(|| transient(PROVIDER, &pair, "response is missing toAmount".to_string()))?;
        let valid_until = string_field(&response, "validUntil")
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
            .get_json("exchange/by-id", &[("id", exchange_id.to_string())], &label)
            .await?;

        let raw = string_field(&body, "status")
            .ok_or_else(|| transient(PROVIDER, &label, "response is missing status".to_string()))?;
        let provider_status = parse_status(&raw)
            .ok_or_else(|| transient(PROVIDER, &label, format!("unknown status '{}'", raw)))?;

        let mut status = ExchangeStatus::new(provider_status);
        status.deposit_tx_hash = string_field(&body, "payinHash");
        status.swap_tx_hash = string_field(&body, "payoutHash");
        status.from_amount =
            decimal_field(&body, "amountFrom").or_else(|| decimal_field(&body, "expectedAmountFrom"));
        status.to_amount =
            decimal_field(&body, "amountTo").or_else(|| decimal_field(&body, "expectedAmountTo"));
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

        let query = [
            ("fromCurrency", ticker(&request.from_asset)),
            ("toCurrency", ticker(&request.to_asset)),
            ("fromAmount", request.amount.to_string()),
            ("fromNetwork", network_code(request.from_chain).to_string()),
            ("toNetwork", network_code(request.to_chain).to_string()),
            ("flow", "standard".to_string()),
            ("type", "direct".to_string()),
        ];
        let body = self.get_json("exchange/estimated-amount", &query, &pair).await?;
        let estimated_output_amount = decimal_field(&body, "toAmount")
            .ok_or_else(|| transient(PROVIDER, &pair, "estimate is missing toAmount".to_string()))?;

        let (min_amount, max_amount) = self.fetch_range(request, &pair).await;

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
