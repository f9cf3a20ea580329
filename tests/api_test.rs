use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use reqwest::StatusCode;
use serde_json::json;

use traveease_commerce::adapters::{InMemoryFulfillment, InMemoryInventory};
use traveease_commerce::config::{fees, Config, GatewayCredentials};
use traveease_commerce::domain::money::Currency;
use traveease_commerce::domain::routing::RoutingTable;
use traveease_commerce::services::coordinator::BookingCoordinator;
use traveease_commerce::services::gateway_client::GatewayRegistry;
use traveease_commerce::services::orchestrator::PaymentOrchestrator;
use traveease_commerce::{create_app, AppState};

fn test_config() -> Config {
    Config {
        server_port: 0,
        base_currency: "USD".to_string(),
        gateways: GatewayCredentials {
            stripe_secret_key: "sk_test".to_string(),
            paypal_client_id: "pp_test".to_string(),
            flutterwave_secret_key: "fw_test".to_string(),
            paystack_secret_key: "ps_test".to_string(),
        },
        max_concurrent_sagas: 8,
        default_hold_ttl_secs: 600,
        expiry_sweep_interval_secs: 1,
        cors_allowed_origins: None,
    }
}

async fn spawn_app() -> String {
    let config = test_config();
    let fee_rules = fees::default_rules().unwrap();

    let (registry, _handles) = GatewayRegistry::sandbox(&config.gateways);
    let gateways = Arc::new(registry);
    let inventory = Arc::new(InMemoryInventory::new());
    let fulfillment = Arc::new(InMemoryFulfillment::new());

    let coordinator = Arc::new(
        BookingCoordinator::new(
            &config,
            fee_rules.clone(),
            inventory,
            fulfillment,
            gateways.clone(),
        )
        .unwrap(),
    );

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        RoutingTable::default(),
        gateways.clone(),
        Currency::parse("USD").unwrap(),
    ));

    let state = AppState {
        coordinator,
        orchestrator,
        gateways,
        fee_rules: Arc::new(fee_rules),
        start_time: Instant::now(),
    };
    let app = create_app(state, None);

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    let actual_addr = server.local_addr();

    tokio::spawn(async move {
        server.await.unwrap();
    });

    format!("http://{}", actual_addr)
}

#[tokio::test]
async fn test_health_reports_gateway_circuits() {
    let base_url = spawn_app().await;

    let response = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    let gateways = body["gateways"].as_object().unwrap();
    assert_eq!(gateways.len(), 4);
    for state in gateways.values() {
        assert_eq!(state, "closed");
    }
}

#[tokio::test]
async fn test_create_intent_routes_reserve_currency_to_stripe() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/payments/intent", base_url))
        .json(&json!({
            "amount_minor": 10_000,
            "currency": "USD",
            "vendor_location": "NG",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["gateway"], "stripe");
    assert!(body["intent_id"].as_str().unwrap().starts_with("pi_stripe_"));
}

#[tokio::test]
async fn test_create_intent_rejects_unknown_currency() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/payments/intent", base_url))
        .json(&json!({
            "amount_minor": 10_000,
            "currency": "DOGE",
            "vendor_location": "US",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "unknown_currency");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_split_conserves_the_charge() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/payments/split", base_url))
        .json(&json!({
            "gateway": "stripe",
            "currency": "USD",
            "items": [
                {"vendor_id": "vendor-a", "amount_minor": 10_000, "platform_fee_percent": "15"},
                {"vendor_id": "vendor-b", "amount_minor": 3_333, "platform_fee_percent": "15"},
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    let payouts = body["payouts"].as_array().unwrap();
    assert_eq!(payouts.len(), 2);

    let distributed: i64 = payouts
        .iter()
        .map(|p| {
            p["payout"]["amount_minor"].as_i64().unwrap()
                + p["platform_fee"]["amount_minor"].as_i64().unwrap()
        })
        .sum();
    assert_eq!(distributed, 13_333);
}

#[tokio::test]
async fn test_split_through_paystack_is_unprocessable() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/payments/split", base_url))
        .json(&json!({
            "gateway": "paystack",
            "currency": "NGN",
            "items": [
                {"vendor_id": "vendor-a", "amount_minor": 10_000, "platform_fee_percent": "15"},
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "unsupported_gateway");
}

#[tokio::test]
async fn test_compliance_total_for_nigeria() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/payments/compliance/total", base_url))
        .json(&json!({
            "amount_minor": 1_500_000,
            "currency": "NGN",
            "jurisdiction": "NG",
            "platform_commission_percent": "10",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["platform_commission"]["amount_minor"], 150_000);
    assert_eq!(body["stamp_duty"]["amount_minor"], 5_000);
    assert_eq!(body["vat"]["amount_minor"], 11_250);
    assert_eq!(body["total"]["amount_minor"], 1_666_250);
}

#[tokio::test]
async fn test_logistics_drives_saga_to_ticketed() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/payments/logistics", base_url))
        .json(&json!({
            "action": "hold",
            "checkout": {
                "user_id": "user-1",
                "currency": "USD",
                "vendor_location": "US",
                "platform_commission_percent": "10",
                "items": [
                    {
                        "item_ref": "flight-1",
                        "vendor_id": "vendor-a",
                        "amount_minor": 10_000,
                        "platform_fee_percent": "15",
                    },
                ],
            },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["state"], "HELD");
    let booking_id = body["booking_id"].as_str().unwrap().to_string();

    for (action, expected_state) in [
        ("lockPrice", "PRICE_LOCKED"),
        ("captureAuth", "AUTH_CAPTURED"),
        ("ticket", "TICKETED"),
    ] {
        let response = client
            .post(format!("{}/payments/logistics", base_url))
            .json(&json!({"action": action, "booking_id": booking_id}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "action {}", action);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["state"], expected_state);
    }

    let response = reqwest::get(format!("{}/bookings/{}", base_url, booking_id))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["state"], "TICKETED");
    assert_eq!(body["history"].as_array().unwrap().len(), 4);
    assert!(body["artifact_ref"].as_str().is_some());
}

#[tokio::test]
async fn test_logistics_rejects_skipped_transition() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/payments/logistics", base_url))
        .json(&json!({
            "action": "hold",
            "checkout": {
                "user_id": "user-1",
                "currency": "USD",
                "vendor_location": "US",
                "platform_commission_percent": "10",
                "items": [
                    {
                        "item_ref": "flight-1",
                        "vendor_id": "vendor-a",
                        "amount_minor": 10_000,
                        "platform_fee_percent": "15",
                    },
                ],
            },
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    let booking_id = body["booking_id"].as_str().unwrap().to_string();

    let response = client
        .post(format!("{}/payments/logistics", base_url))
        .json(&json!({"action": "captureAuth", "booking_id": booking_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "invalid_state_transition");
}

#[tokio::test]
async fn test_unknown_booking_returns_404() {
    let base_url = spawn_app().await;

    let response = reqwest::get(format!(
        "{}/bookings/{}",
        base_url,
        uuid::Uuid::new_v4()
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_cart_create_groups_by_vendor_and_markup_applies() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/cart/create", base_url))
        .json(&json!({
            "user_id": "user-1",
            "currency": "USD",
            "items": [
                {"vendor_id": "vendor-a", "item_type": "flight", "amount_minor": 50_000},
                {"vendor_id": "vendor-a", "item_type": "hotel", "amount_minor": 30_000},
                {"vendor_id": "vendor-b", "item_type": "activity", "amount_minor": 8_000},
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["item_count"], 3);
    assert_eq!(body["total_price"]["amount_minor"], 88_000);
    assert_eq!(body["vendor_groups"].as_object().unwrap().len(), 2);

    let response = client
        .post(format!("{}/cart/markup", base_url))
        .json(&json!({
            "amount_minor": 10_000,
            "currency": "USD",
            "item_type": "hotel",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["markup"]["amount_minor"], 1_200);
    assert_eq!(body["total_price"]["amount_minor"], 11_200);
}

#[tokio::test]
async fn test_refund_over_original_charge_is_rejected() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/payments/refund", base_url))
        .json(&json!({
            "gateway": "stripe",
            "intent_id": "pi_unknown",
            "currency": "USD",
            "charged_minor": 5_000,
            "refund_minor": 10_000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "over_refund");
}

#[tokio::test]
async fn test_refund_of_uncaptured_intent_is_declined() {
    let base_url = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/payments/intent", base_url))
        .json(&json!({
            "amount_minor": 10_000,
            "currency": "USD",
            "vendor_location": "US",
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    let intent_id = body["intent_id"].as_str().unwrap().to_string();

    let response = client
        .post(format!("{}/payments/refund", base_url))
        .json(&json!({
            "gateway": "stripe",
            "intent_id": intent_id,
            "currency": "USD",
            "charged_minor": 10_000,
            "refund_minor": 10_000,
            "non_refundable_fee_minor": 500,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "card_declined");
}
