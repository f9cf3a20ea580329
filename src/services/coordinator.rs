//! Booking coordinator: runs each booking saga with strictly serialized
//! transitions, compensating rollback on every exit path, and a bounded
//! number of sagas talking to downstream processors at once.
//!
//! Per-booking state lives in a map keyed by booking id; every transition
//! takes the booking id as an explicit argument. A per-booking mutex makes
//! racing transitions structurally impossible rather than merely tested
//! against.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::{BigDecimal, One};
use chrono::Utc;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::compliance::{self, JurisdictionRule};
use crate::domain::money::{self, Currency};
use crate::domain::routing::{BuyerSignal, RoutingTable};
use crate::domain::saga::{next_state, BookingEvent, BookingSaga, SagaError};
use crate::domain::split::{self, VendorLineItem};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::AppError;
use crate::ports::{FulfillmentService, GatewayError, InventoryError, InventoryService};
use crate::services::gateway_client::GatewayRegistry;
use crate::services::retry::{retry_transient, RetryPolicy};

/// One bookable item in a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutItem {
    pub item_ref: String,
    pub vendor_id: String,
    pub amount_minor: i64,
    pub platform_fee_percent: BigDecimal,
}

/// Everything the saga needs to price, route, and capture a booking.
#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub user_id: String,
    pub items: Vec<CheckoutItem>,
    pub currency: String,
    pub ttl_secs: Option<i64>,
    pub buyer: BuyerSignal,
    pub vendor_location: String,
    pub jurisdiction: Option<String>,
    pub platform_commission_percent: BigDecimal,
    pub mid_market_rate: Option<BigDecimal>,
}

/// Checkout inputs pinned at hold time and reused by later transitions.
#[derive(Debug, Clone)]
struct CheckoutContext {
    user_id: String,
    items: Vec<CheckoutItem>,
    currency: Currency,
    buyer: BuyerSignal,
    vendor_location: String,
    jurisdiction: Option<String>,
    platform_commission_percent: BigDecimal,
    mid_market_rate: BigDecimal,
    ttl_secs: Option<i64>,
}

struct SagaEntry {
    saga: BookingSaga,
    ctx: CheckoutContext,
}

pub struct BookingCoordinator {
    sagas: RwLock<HashMap<Uuid, Arc<Mutex<SagaEntry>>>>,
    inventory: Arc<dyn InventoryService>,
    fulfillment: Arc<dyn FulfillmentService>,
    gateways: Arc<GatewayRegistry>,
    routing: RoutingTable,
    fee_rules: Vec<JurisdictionRule>,
    base_currency: Currency,
    limiter: Arc<Semaphore>,
    retry: RetryPolicy,
    default_ttl_secs: i64,
}

impl BookingCoordinator {
    pub fn new(
        config: &Config,
        fee_rules: Vec<JurisdictionRule>,
        inventory: Arc<dyn InventoryService>,
        fulfillment: Arc<dyn FulfillmentService>,
        gateways: Arc<GatewayRegistry>,
    ) -> Result<Self, AppError> {
        let base_currency = Currency::parse(&config.base_currency)
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        Ok(Self {
            sagas: RwLock::new(HashMap::new()),
            inventory,
            fulfillment,
            gateways,
            routing: RoutingTable::default(),
            fee_rules,
            base_currency,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_sagas)),
            retry: RetryPolicy::default(),
            default_ttl_secs: config.default_hold_ttl_secs,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reserves inventory and opens a new saga. The saga is created in
    /// HOLDING and reaches HELD only once the hold is acquired.
    pub async fn request_hold(&self, req: HoldRequest) -> Result<BookingSaga, AppError> {
        let ctx = Self::validate_request(req)?;
        let ttl = ctx.ttl_secs.unwrap_or(self.default_ttl_secs);

        let booking_id = Uuid::new_v4();
        let entry = Arc::new(Mutex::new(SagaEntry {
            saga: BookingSaga::new(booking_id),
            ctx,
        }));
        self.sagas.write().await.insert(booking_id, entry.clone());

        let mut guard = entry.lock().await;
        let _permit = self.acquire_slot().await?;

        let item_refs: Vec<String> = guard.ctx.items.iter().map(|i| i.item_ref.clone()).collect();
        let result = retry_transient(
            self.retry,
            "inventory hold",
            InventoryError::is_transient,
            || self.inventory.hold(&item_refs, ttl),
        )
        .await;

        match result {
            Ok(hold_id) => {
                guard.saga.hold_id = Some(hold_id.clone());
                guard.saga.set_ttl(ttl);
                guard.saga.apply_with_note(
                    BookingEvent::HoldAcquired,
                    Some(format!("inventory hold {} acquired", hold_id)),
                )?;
                tracing::info!("Booking {} held inventory for {}s", booking_id, ttl);
                Ok(guard.saga.clone())
            }
            Err(err) => {
                guard.saga.apply_with_note(
                    BookingEvent::HoldFailed,
                    Some(format!("inventory hold failed: {}", err)),
                )?;
                tracing::error!("Booking {} hold failed: {}", booking_id, err);
                Err(err.into())
            }
        }
    }

    /// Pins the FX snapshot, compliance assessment, processor, vendor
    /// payouts, and the payment intent at the locked total.
    pub async fn lock_price(&self, booking_id: Uuid) -> Result<BookingSaga, AppError> {
        let entry = self.entry(booking_id).await?;
        let mut guard = entry.lock().await;
        self.guard_expiry(&mut guard).await?;
        ensure_event(&guard.saga, BookingEvent::LockPrice)?;

        let ctx = guard.ctx.clone();
        let base_total: i64 = ctx.items.iter().map(|i| i.amount_minor).sum();
        let (total_money, fx) = money::record(
            base_total,
            ctx.currency.code(),
            self.base_currency.code(),
            ctx.mid_market_rate.clone(),
        )?;

        let rule = self.rule_for(&ctx);
        let assessment =
            compliance::assess(&total_money, &ctx.platform_commission_percent, &rule);

        let gateway = self
            .routing
            .select(&ctx.currency, &ctx.buyer, &ctx.vendor_location);

        // Single-vendor carts are plain charges; only multi-vendor carts
        // need a sub-merchant split strategy on the gateway.
        let distinct_vendors = {
            let mut vendors: Vec<&str> = ctx.items.iter().map(|i| i.vendor_id.as_str()).collect();
            vendors.sort_unstable();
            vendors.dedup();
            vendors.len()
        };
        let payouts = if distinct_vendors > 1 {
            let mut line_items: Vec<VendorLineItem> = ctx
                .items
                .iter()
                .map(|i| VendorLineItem {
                    vendor_id: i.vendor_id.clone(),
                    gross_amount: money::Money::new(i.amount_minor, ctx.currency.clone()),
                    platform_fee_percent: i.platform_fee_percent.clone(),
                })
                .collect();
            line_items.sort_by(|a, b| a.vendor_id.cmp(&b.vendor_id));
            split::split_charge(&line_items, gateway)?
        } else {
            Vec::new()
        };

        let client = self.gateways.get(gateway)?;
        let charge = assessment.total.clone();
        let metadata = serde_json::json!({
            "bookingId": booking_id,
            "userId": ctx.user_id,
        });

        let _permit = self.acquire_slot().await?;
        let intent = retry_transient(
            self.retry,
            "create payment intent",
            GatewayError::is_transient,
            || client.create_payment_intent(&charge, metadata.clone()),
        )
        .await?;

        let mut transaction = Transaction::new(charge, fx, gateway);
        transaction.intent_id = Some(intent.intent_id);

        guard.saga.transaction = Some(transaction);
        guard.saga.assessment = Some(assessment);
        guard.saga.payouts = payouts;
        guard.saga.apply_with_note(
            BookingEvent::LockPrice,
            Some(format!("price locked on {}", gateway)),
        )?;
        Ok(guard.saga.clone())
    }

    /// Captures the locked charge. Declines fail the saga and release the
    /// hold; transient outages are retried before doing the same.
    pub async fn capture_auth(&self, booking_id: Uuid) -> Result<BookingSaga, AppError> {
        let entry = self.entry(booking_id).await?;
        let mut guard = entry.lock().await;
        self.guard_expiry(&mut guard).await?;
        ensure_event(&guard.saga, BookingEvent::CaptureAuth)?;

        let (gateway, intent_id) = {
            let tx = guard
                .saga
                .transaction
                .as_ref()
                .ok_or_else(|| AppError::Internal("price-locked saga missing transaction".to_string()))?;
            let intent_id = tx
                .intent_id
                .clone()
                .ok_or_else(|| AppError::Internal("transaction missing intent id".to_string()))?;
            (tx.gateway, intent_id)
        };
        let client = self.gateways.get(gateway)?;

        let _permit = self.acquire_slot().await?;
        let result = retry_transient(
            self.retry,
            "gateway capture",
            GatewayError::is_transient,
            || client.capture_auth(&intent_id),
        )
        .await;

        match result {
            Ok(_) => {
                if let Some(tx) = guard.saga.transaction.as_mut() {
                    tx.status = TransactionStatus::AuthCaptured;
                }
                // Funds are captured; the hold TTL no longer applies.
                guard.saga.ttl_expiry = None;
                // The hold converts into a confirmed reservation; a failed
                // confirm leaves funds captured, so ops must reconcile it.
                if let Some(hold_id) = guard.saga.take_hold() {
                    let confirm = retry_transient(
                        self.retry,
                        "inventory confirm",
                        InventoryError::is_transient,
                        || self.inventory.confirm(&hold_id),
                    )
                    .await;
                    if let Err(err) = confirm {
                        guard.saga.needs_reconciliation(format!(
                            "inventory confirm of {} failed after capture: {}",
                            hold_id, err
                        ));
                    }
                }
                guard.saga.apply_with_note(
                    BookingEvent::CaptureAuth,
                    Some(format!("funds captured via {}", gateway)),
                )?;
                tracing::info!("Booking {} captured via {}", booking_id, gateway);
                Ok(guard.saga.clone())
            }
            Err(err) => {
                if let Some(tx) = guard.saga.transaction.as_mut() {
                    tx.status = TransactionStatus::Failed;
                }
                guard.saga.apply_with_note(
                    BookingEvent::CaptureFailed,
                    Some(format!("capture failed: {}", err)),
                )?;
                self.release_hold(&mut guard).await;
                tracing::warn!("Booking {} capture failed: {}", booking_id, err);
                Err(err.into())
            }
        }
    }

    /// Issues the booking artifact. Retries transient fulfillment outages;
    /// after the budget is spent the saga fails, but the capture is not
    /// reversed automatically.
    pub async fn ticket(&self, booking_id: Uuid) -> Result<BookingSaga, AppError> {
        let entry = self.entry(booking_id).await?;
        let mut guard = entry.lock().await;
        ensure_event(&guard.saga, BookingEvent::Ticket)?;

        let transaction_id = guard
            .saga
            .transaction
            .as_ref()
            .map(|tx| tx.id)
            .ok_or_else(|| AppError::Internal("captured saga missing transaction".to_string()))?;

        let _permit = self.acquire_slot().await?;
        let result = retry_transient(
            self.retry,
            "ticket issuance",
            crate::ports::FulfillmentError::is_transient,
            || self.fulfillment.issue_ticket(booking_id, transaction_id),
        )
        .await;

        match result {
            Ok(artifact) => {
                guard.saga.artifact_ref = Some(artifact.clone());
                guard.saga.apply_with_note(
                    BookingEvent::Ticket,
                    Some(format!("artifact {} issued", artifact)),
                )?;
                Ok(guard.saga.clone())
            }
            Err(err) => {
                guard.saga.apply_with_note(
                    BookingEvent::TicketFailed,
                    Some(format!("ticket issuance failed: {}", err)),
                )?;
                guard.saga.needs_reconciliation(
                    "funds captured but ticket issuance failed; manual reconciliation required"
                        .to_string(),
                );
                tracing::error!("Booking {} ticketing failed after capture: {}", booking_id, err);
                Err(err.into())
            }
        }
    }

    /// Cancels from any non-terminal state with compensation appropriate
    /// to the current state. If a transition is in flight the call is
    /// rejected with a retryable conflict instead of interleaving.
    pub async fn cancel(&self, booking_id: Uuid) -> Result<BookingSaga, AppError> {
        let entry = self.entry(booking_id).await?;
        let mut guard = entry.try_lock().map_err(|_| {
            AppError::Conflict(format!("booking {} has a transition in flight", booking_id))
        })?;
        ensure_event(&guard.saga, BookingEvent::Cancel)?;

        // Before capture only the inventory hold needs compensating; after
        // capture the charge is refunded in full.
        self.release_hold(&mut guard).await;
        if let Some(tx) = guard.saga.transaction.clone() {
            if tx.status == TransactionStatus::AuthCaptured {
                self.refund_captured(&mut guard, &tx).await;
            }
        }

        guard
            .saga
            .apply_with_note(BookingEvent::Cancel, Some("cancelled by customer".to_string()))?;
        tracing::info!("Booking {} cancelled", booking_id);
        Ok(guard.saga.clone())
    }

    /// Snapshot of a saga for the read surface.
    pub async fn booking(&self, booking_id: Uuid) -> Result<BookingSaga, AppError> {
        let entry = self.entry(booking_id).await?;
        let guard = entry.lock().await;
        Ok(guard.saga.clone())
    }

    /// Expires overdue holds. The sweep is advisory; `lock_price` and
    /// `capture_auth` re-check expiry themselves, so a saga mid-transition
    /// is simply skipped here.
    pub async fn expire_overdue(&self) -> usize {
        let entries: Vec<Arc<Mutex<SagaEntry>>> =
            self.sagas.read().await.values().cloned().collect();

        let now = Utc::now();
        let mut expired = 0;
        for entry in entries {
            let Ok(mut guard) = entry.try_lock() else {
                continue;
            };
            if guard.saga.state.is_terminal() || guard.saga.ensure_not_expired(now).is_ok() {
                continue;
            }
            if self.expire_entry(&mut guard).await {
                expired += 1;
            }
        }
        expired
    }

    /// Background sweep loop, spawned at startup.
    pub fn spawn_expiry_sweep(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tracing::info!("Expiry sweep started (every {:?})", interval);
            loop {
                sleep(interval).await;
                let expired = coordinator.expire_overdue().await;
                if expired > 0 {
                    tracing::info!("Expiry sweep expired {} booking(s)", expired);
                }
            }
        })
    }

    fn validate_request(req: HoldRequest) -> Result<CheckoutContext, AppError> {
        if req.items.is_empty() {
            return Err(AppError::Validation("checkout requires at least one item".to_string()));
        }
        for item in &req.items {
            if item.amount_minor <= 0 {
                return Err(AppError::Validation(format!(
                    "item {} amount must be positive",
                    item.item_ref
                )));
            }
        }
        if let Some(ttl) = req.ttl_secs {
            if ttl < 0 {
                return Err(AppError::Validation("ttl must be non-negative".to_string()));
            }
        }
        let currency = Currency::parse(&req.currency)?;

        Ok(CheckoutContext {
            user_id: req.user_id,
            items: req.items,
            currency,
            buyer: req.buyer,
            vendor_location: req.vendor_location,
            jurisdiction: req.jurisdiction,
            platform_commission_percent: req.platform_commission_percent,
            mid_market_rate: req.mid_market_rate.unwrap_or_else(BigDecimal::one),
            ttl_secs: req.ttl_secs,
        })
    }

    /// Jurisdiction rule for the checkout, or a neutral rule (no stamp
    /// duty, zero VAT) when none is configured.
    fn rule_for(&self, ctx: &CheckoutContext) -> JurisdictionRule {
        ctx.jurisdiction
            .as_deref()
            .and_then(|j| crate::config::fees::rule_for(&self.fee_rules, j))
            .cloned()
            .unwrap_or_else(|| JurisdictionRule {
                jurisdiction: "ZZ".to_string(),
                currency: ctx.currency.clone(),
                stamp_duty_threshold_minor: i64::MAX,
                stamp_duty_flat_minor: 0,
                vat_rate: BigDecimal::from(0),
            })
    }

    async fn entry(&self, booking_id: Uuid) -> Result<Arc<Mutex<SagaEntry>>, AppError> {
        self.sagas
            .read()
            .await
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("booking {}", booking_id)))
    }

    async fn acquire_slot(&self) -> Result<tokio::sync::SemaphorePermit<'_>, AppError> {
        self.limiter
            .acquire()
            .await
            .map_err(|_| AppError::Internal("saga concurrency limiter closed".to_string()))
    }

    /// Expiry check at the start of every money-moving transition.
    async fn guard_expiry(&self, entry: &mut SagaEntry) -> Result<(), AppError> {
        if entry.saga.state.is_terminal() {
            return Ok(());
        }
        if let Err(SagaError::Expired(_)) = entry.saga.ensure_not_expired(Utc::now()) {
            self.expire_entry(entry).await;
            return Err(SagaError::Expired(entry.saga.booking_id).into());
        }
        Ok(())
    }

    async fn expire_entry(&self, entry: &mut SagaEntry) -> bool {
        match entry
            .saga
            .apply_with_note(BookingEvent::Expire, Some("hold TTL lapsed".to_string()))
        {
            Ok(_) => {
                self.release_hold(entry).await;
                tracing::info!("Booking {} expired", entry.saga.booking_id);
                true
            }
            Err(_) => false,
        }
    }

    /// Releases the inventory hold at most once; the hold id is consumed
    /// even if the release call ultimately fails, leaving a reconciliation
    /// entry instead of risking a double release.
    async fn release_hold(&self, entry: &mut SagaEntry) {
        if let Some(hold_id) = entry.saga.take_hold() {
            let result = retry_transient(
                self.retry,
                "inventory release",
                InventoryError::is_transient,
                || self.inventory.release(&hold_id),
            )
            .await;
            match result {
                Ok(()) => {
                    tracing::info!("Booking {} released hold {}", entry.saga.booking_id, hold_id)
                }
                Err(err) => entry.saga.needs_reconciliation(format!(
                    "release of hold {} failed: {}",
                    hold_id, err
                )),
            }
        }
    }

    async fn refund_captured(&self, entry: &mut SagaEntry, tx: &Transaction) {
        let Some(intent_id) = tx.intent_id.as_deref() else {
            entry
                .saga
                .needs_reconciliation("captured transaction missing intent id".to_string());
            return;
        };
        let client = match self.gateways.get(tx.gateway) {
            Ok(client) => client,
            Err(err) => {
                entry
                    .saga
                    .needs_reconciliation(format!("refund gateway lookup failed: {}", err));
                return;
            }
        };

        let result = retry_transient(
            self.retry,
            "gateway refund",
            GatewayError::is_transient,
            || client.refund(intent_id, &tx.money),
        )
        .await;
        match result {
            Ok(_) => {
                if let Some(tx) = entry.saga.transaction.as_mut() {
                    tx.status = TransactionStatus::Refunded;
                }
                tracing::info!("Booking {} refunded {}", entry.saga.booking_id, tx.money);
            }
            Err(err) => entry
                .saga
                .needs_reconciliation(format!("refund of intent {} failed: {}", intent_id, err)),
        }
    }
}

fn ensure_event(saga: &BookingSaga, event: BookingEvent) -> Result<(), AppError> {
    if next_state(saga.state, event).is_none() {
        return Err(SagaError::InvalidTransition {
            from: saga.state,
            event,
        }
        .into());
    }
    Ok(())
}
