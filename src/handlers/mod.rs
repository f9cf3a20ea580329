pub mod bookings;
pub mod cart;
pub mod payments;

use std::collections::HashMap;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Circuit breaker state per configured processor.
    pub gateways: HashMap<String, &'static str>,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let gateways = state.gateways.circuit_states();

    // The service itself is healthy as long as it can answer; open
    // breakers are reported but do not fail the probe.
    Json(HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        gateways,
    })
}
