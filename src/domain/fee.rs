use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Chain;

/// Platform fee charged on an order. Always recomputed from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFee {
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    /// Display percentage, e.g. `1` for a 1% fee.
    #[schema(value_type = String)]
    pub percent: BigDecimal,
    pub currency: String,
    pub recipient_address: Option<String>,
    pub chain: Option<Chain>,
}
