use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Order, PaymentRequestSummary};
use crate::error::AppError;
use crate::use_cases::{CreateOrderInput, CreateOrderOutput};
use crate::AppState;

/// An order with a short view of the payment request it pays.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusView {
    #[serde(flatten)]
    pub order: Order,
    pub payment_request: Option<PaymentRequestSummary>,
}

#[utoipa::path(
    post,
    path = "/create-order",
    request_body = CreateOrderInput,
    responses(
        (status = 200, description = "Order created", body = CreateOrderOutput),
        (status = 400, description = "Invalid order or amount rejected"),
        (status = 401, description = "Provider rejected the API credentials"),
        (status = 404, description = "Unknown payment request or unsupported pair"),
        (status = 503, description = "No provider could be reached")
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    body: Result<Json<CreateOrderInput>, JsonRejection>,
) -> Result<Json<CreateOrderOutput>, AppError> {
    let Json(input) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let output = state.create_order.execute(input).await?;
    Ok(Json(output))
}

#[utoipa::path(
    get,
    path = "/status/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order, refreshed from its provider when possible", body = OrderStatusView),
        (status = 404, description = "Unknown order")
    ),
    tag = "Orders"
)]
pub async fn get_order_status(
    State(state): State<AppState>,
    order_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<OrderStatusView>, AppError> {
    let Path(order_id) = order_id.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let order = state
        .store
        .get_order_by_id(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

    let order = state.status_sync.refresh(order).await;

    let payment_request = match order.request_id {
        Some(request_id) => state
            .store
            .get_request_by_id(request_id)
            .await?
            .as_ref()
            .map(PaymentRequestSummary::from),
        None => None,
    };

    Ok(Json(OrderStatusView {
        order,
        payment_request,
    }))
}

#[utoipa::path(
    get,
    path = "/orders/{request_id}",
    params(("request_id" = Uuid, Path, description = "Payment request id")),
    responses(
        (status = 200, description = "Orders of the payment request, oldest first", body = [Order])
    ),
    tag = "Orders"
)]
pub async fn list_orders_for_request(
    State(state): State<AppState>,
    request_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<Order>>, AppError> {
    let Path(request_id) = request_id.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let orders = state.store.get_orders_by_request_id(request_id).await?;
    Ok(Json(orders))
}
