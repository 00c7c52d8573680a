pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod providers;
pub mod services;
pub mod use_cases;
pub mod validation;

use axum::http::{HeaderValue, Method, header};
use axum::{Router, routing::{get, post}};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::FeeConfig;
use crate::ports::OrderStore;
use crate::providers::SwapProvider;
use crate::services::{DepositOrchestrator, FeeCalculator, OrderStatusSynchronizer, RetryPolicy};
use crate::use_cases::{CreateOrder, QuoteRate};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::orders::create_order,
        handlers::orders::get_order_status,
        handlers::orders::list_orders_for_request,
        handlers::rates::exchange_rate,
    ),
    components(schemas(
        handlers::HealthStatus,
        handlers::ProviderHealth,
        handlers::orders::OrderStatusView,
        domain::Order,
        domain::OrderStatus,
        domain::Chain,
        domain::PlatformFee,
        domain::PaymentRequestSummary,
        domain::PaymentRequestStatus,
        use_cases::CreateOrderInput,
        use_cases::CreateOrderOutput,
        use_cases::QuoteRateInput,
        use_cases::QuoteRateOutput,
        use_cases::QuoteDirection,
    )),
    tags(
        (name = "Orders", description = "Cross-chain swap orders"),
        (name = "Rates", description = "Forward and reverse exchange-rate quotes"),
        (name = "Health", description = "Liveness and provider circuit state")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub providers: Vec<Arc<dyn SwapProvider>>,
    pub create_order: Arc<CreateOrder>,
    pub quote_rate: Arc<QuoteRate>,
    pub status_sync: OrderStatusSynchronizer,
    /// `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl AppState {
    /// Wires the order flows. `providers` is ordered primary first and must
    /// not be empty.
    pub fn new(
        store: Arc<dyn OrderStore>,
        providers: Vec<Arc<dyn SwapProvider>>,
        fees: FeeConfig,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let primary = providers
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("at least one swap provider must be configured"))?;

        let deposits = DepositOrchestrator::new(providers.clone(), retry);
        let create_order = CreateOrder::new(Arc::clone(&store), FeeCalculator::new(fees), deposits);

        Ok(Self {
            status_sync: OrderStatusSynchronizer::new(providers.clone(), Arc::clone(&store)),
            quote_rate: Arc::new(QuoteRate::new(primary)),
            create_order: Arc::new(create_order),
            providers,
            store,
            cors_allowed_origins: None,
        })
    }

    pub fn with_cors_origins(mut self, origins: Option<Vec<String>>) -> Self {
        self.cors_allowed_origins = origins;
        self
    }
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect();
            layer.allow_origin(origins)
        }
        None => layer.allow_origin(Any),
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(state.cors_allowed_origins.as_deref());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/create-order", post(handlers::orders::create_order))
        .route("/exchange-rate", post(handlers::rates::exchange_rate))
        .route("/status/:order_id", get(handlers::orders::get_order_status))
        .route("/orders/:request_id", get(handlers::orders::list_orders_for_request))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}
