pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::domain::compliance::JurisdictionRule;
use crate::services::coordinator::BookingCoordinator;
use crate::services::gateway_client::GatewayRegistry;
use crate::services::orchestrator::PaymentOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<BookingCoordinator>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub gateways: Arc<GatewayRegistry>,
    pub fee_rules: Arc<Vec<JurisdictionRule>>,
    pub start_time: Instant,
}

pub fn create_app(state: AppState, cors_allowed_origins: Option<&str>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/intent", post(handlers::payments::create_intent))
        .route("/payments/split", post(handlers::payments::split_charge))
        .route("/payments/refund", post(handlers::payments::refund))
        .route(
            "/payments/compliance/total",
            post(handlers::payments::compliance_total),
        )
        .route("/payments/logistics", post(handlers::payments::logistics))
        .route("/cart/create", post(handlers::cart::create_cart))
        .route("/cart/markup", post(handlers::cart::markup))
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(cors_layer(cors_allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    match allowed_origins {
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            layer.allow_origin(parsed)
        }
        None => layer.allow_origin(Any),
    }
}
