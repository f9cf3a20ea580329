use axum::{extract::State, response::IntoResponse, Json};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::{Currency, Money};
use crate::domain::routing::{BuyerSignal, GatewayId};
use crate::domain::split::{self, VendorLineItem};
use crate::domain::{compliance, BookingSaga};
use crate::error::AppError;
use crate::services::coordinator::{CheckoutItem, HoldRequest};
use crate::services::orchestrator::IntentRequest;
use crate::AppState;

#[derive(Deserialize)]
pub struct IntentBody {
    pub amount_minor: i64,
    pub currency: String,
    #[serde(default)]
    pub buyer: BuyerSignal,
    pub vendor_location: String,
    pub mid_market_rate: Option<BigDecimal>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// POST /payments/intent: route a one-off charge and open the intent.
pub async fn create_intent(
    State(state): State<AppState>,
    Json(body): Json<IntentBody>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .orchestrator
        .create_intent(IntentRequest {
            amount_minor: body.amount_minor,
            currency: body.currency,
            buyer: body.buyer,
            vendor_location: body.vendor_location,
            mid_market_rate: body.mid_market_rate,
            metadata: body.metadata,
        })
        .await?;

    Ok(Json(transaction))
}

#[derive(Deserialize)]
pub struct SplitItemBody {
    pub vendor_id: String,
    pub amount_minor: i64,
    pub platform_fee_percent: BigDecimal,
}

#[derive(Deserialize)]
pub struct SplitBody {
    pub gateway: GatewayId,
    pub currency: String,
    pub items: Vec<SplitItemBody>,
}

#[derive(Serialize)]
pub struct SplitResponse {
    pub gateway: GatewayId,
    pub payouts: Vec<split::VendorPayout>,
}

/// POST /payments/split: derive per-vendor payouts for a charge.
pub async fn split_charge(
    Json(body): Json<SplitBody>,
) -> Result<impl IntoResponse, AppError> {
    let currency = Currency::parse(&body.currency)?;
    let items: Vec<VendorLineItem> = body
        .items
        .into_iter()
        .map(|item| VendorLineItem {
            vendor_id: item.vendor_id,
            gross_amount: Money::new(item.amount_minor, currency.clone()),
            platform_fee_percent: item.platform_fee_percent,
        })
        .collect();

    if items.is_empty() {
        return Err(AppError::Validation("items must not be empty".to_string()));
    }

    let payouts = split::split_charge(&items, body.gateway)?;
    Ok(Json(SplitResponse {
        gateway: body.gateway,
        payouts,
    }))
}

#[derive(Deserialize)]
pub struct RefundBody {
    pub gateway: GatewayId,
    pub intent_id: String,
    pub currency: String,
    pub charged_minor: i64,
    pub refund_minor: i64,
    #[serde(default)]
    pub non_refundable_fee_minor: i64,
}

#[derive(Serialize)]
pub struct RefundResponse {
    pub refunded_amount: Money,
    pub non_refundable_fee: Money,
    pub status: crate::ports::IntentStatus,
}

/// POST /payments/refund: refund net of the non-refundable fee, then push
/// the refund through the processor.
pub async fn refund(
    State(state): State<AppState>,
    Json(body): Json<RefundBody>,
) -> Result<impl IntoResponse, AppError> {
    let currency = Currency::parse(&body.currency)?;
    let charged = Money::new(body.charged_minor, currency.clone());
    let requested = Money::new(body.refund_minor, currency.clone());
    let fee = Money::new(body.non_refundable_fee_minor, currency);

    let result = split::refund(&charged, &requested, &fee)?;

    let client = state.gateways.get(body.gateway)?;
    let status = client
        .refund(&body.intent_id, &result.refunded_amount)
        .await?;

    Ok(Json(RefundResponse {
        refunded_amount: result.refunded_amount,
        non_refundable_fee: result.non_refundable_fee,
        status,
    }))
}

#[derive(Deserialize)]
pub struct ComplianceBody {
    pub amount_minor: i64,
    pub currency: String,
    pub jurisdiction: String,
    pub platform_commission_percent: BigDecimal,
}

/// POST /payments/compliance/total: assess duty and VAT for a charge
/// without touching any processor.
pub async fn compliance_total(
    State(state): State<AppState>,
    Json(body): Json<ComplianceBody>,
) -> Result<impl IntoResponse, AppError> {
    let currency = Currency::parse(&body.currency)?;
    let base_price = Money::new(body.amount_minor, currency);

    let rule = crate::config::fees::rule_for(&state.fee_rules, &body.jurisdiction).ok_or_else(
        || AppError::NotFound(format!("no fee rules for jurisdiction {}", body.jurisdiction)),
    )?;

    let assessment = compliance::assess(&base_price, &body.platform_commission_percent, rule);
    Ok(Json(assessment))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogisticsAction {
    Hold,
    LockPrice,
    CaptureAuth,
    Ticket,
    Cancel,
}

#[derive(Deserialize)]
pub struct CheckoutItemBody {
    pub item_ref: String,
    pub vendor_id: String,
    pub amount_minor: i64,
    pub platform_fee_percent: BigDecimal,
}

#[derive(Deserialize)]
pub struct CheckoutBody {
    pub user_id: String,
    pub items: Vec<CheckoutItemBody>,
    pub currency: String,
    pub ttl_secs: Option<i64>,
    #[serde(default)]
    pub buyer: BuyerSignal,
    pub vendor_location: String,
    pub jurisdiction: Option<String>,
    pub platform_commission_percent: BigDecimal,
    pub mid_market_rate: Option<BigDecimal>,
}

#[derive(Deserialize)]
pub struct LogisticsBody {
    pub action: LogisticsAction,
    pub booking_id: Option<Uuid>,
    pub checkout: Option<CheckoutBody>,
}

/// POST /payments/logistics: drive one booking saga transition. `hold`
/// opens a new saga from a checkout; every other action takes a booking id.
pub async fn logistics(
    State(state): State<AppState>,
    Json(body): Json<LogisticsBody>,
) -> Result<Json<BookingSaga>, AppError> {
    let saga = match body.action {
        LogisticsAction::Hold => {
            let checkout = body.checkout.ok_or_else(|| {
                AppError::Validation("hold requires a checkout".to_string())
            })?;
            state.coordinator.request_hold(into_hold_request(checkout)).await?
        }
        action => {
            let booking_id = body.booking_id.ok_or_else(|| {
                AppError::Validation("action requires a booking_id".to_string())
            })?;
            match action {
                LogisticsAction::LockPrice => state.coordinator.lock_price(booking_id).await?,
                LogisticsAction::CaptureAuth => state.coordinator.capture_auth(booking_id).await?,
                LogisticsAction::Ticket => state.coordinator.ticket(booking_id).await?,
                LogisticsAction::Cancel => state.coordinator.cancel(booking_id).await?,
                LogisticsAction::Hold => unreachable!("handled above"),
            }
        }
    };

    Ok(Json(saga))
}

fn into_hold_request(body: CheckoutBody) -> HoldRequest {
    HoldRequest {
        user_id: body.user_id,
        items: body
            .items
            .into_iter()
            .map(|item| CheckoutItem {
                item_ref: item.item_ref,
                vendor_id: item.vendor_id,
                amount_minor: item.amount_minor,
                platform_fee_percent: item.platform_fee_percent,
            })
            .collect(),
        currency: body.currency,
        ttl_secs: body.ttl_secs,
        buyer: body.buyer,
        vendor_location: body.vendor_location,
        jurisdiction: body.jurisdiction,
        platform_commission_percent: body.platform_commission_percent,
        mid_market_rate: body.mid_market_rate,
    }
}
