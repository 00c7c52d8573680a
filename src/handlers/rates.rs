use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::error::AppError;
use crate::use_cases::{QuoteRateInput, QuoteRateOutput};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/exchange-rate",
    request_body = QuoteRateInput,
    responses(
        (status = 200, description = "Forward quote or reverse solve", body = QuoteRateOutput),
        (status = 400, description = "Invalid pair or amount"),
        (status = 404, description = "Pair not supported by the provider"),
        (status = 503, description = "Provider unavailable")
    ),
    tag = "Rates"
)]
pub async fn exchange_rate(
    State(state): State<AppState>,
    body: Result<Json<QuoteRateInput>, JsonRejection>,
) -> Result<Json<QuoteRateOutput>, AppError> {
    let Json(input) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let output = state.quote_rate.execute(input).await?;
    Ok(Json(output))
}
