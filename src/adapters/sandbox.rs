//! In-process implementations of the external ports, used for local runs
//! and tests. They honor the same contracts as real processor adapters,
//! including scripted declines and outages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::routing::GatewayId;
use crate::ports::{
    FulfillmentError, FulfillmentService, GatewayAdapter, GatewayError, IntentStatus,
    InventoryError, InventoryService, PaymentIntent,
};

#[derive(Debug, Clone)]
struct SandboxIntent {
    status: IntentStatus,
    amount_minor: i64,
}

/// Sandbox processor. Intents live in memory; captures can be scripted to
/// decline once or to be unreachable for the next N calls.
pub struct SandboxGateway {
    gateway: GatewayId,
    intents: Mutex<HashMap<String, SandboxIntent>>,
    decline_next_capture: AtomicBool,
    unavailable_captures: AtomicUsize,
}

impl SandboxGateway {
    pub fn new(gateway: GatewayId, _api_key: &str) -> Self {
        Self {
            gateway,
            intents: Mutex::new(HashMap::new()),
            decline_next_capture: AtomicBool::new(false),
            unavailable_captures: AtomicUsize::new(0),
        }
    }

    /// The next capture is declined by the "processor".
    pub fn decline_next_capture(&self) {
        self.decline_next_capture.store(true, Ordering::SeqCst);
    }

    /// The next `n` captures fail as transient outages.
    pub fn fail_next_captures(&self, n: usize) {
        self.unavailable_captures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl GatewayAdapter for SandboxGateway {
    async fn create_payment_intent(
        &self,
        amount: &Money,
        _metadata: serde_json::Value,
    ) -> Result<PaymentIntent, GatewayError> {
        if amount.amount_minor <= 0 {
            return Err(GatewayError::Declined(
                "amount must be positive".to_string(),
            ));
        }

        let intent_id = format!("pi_{}_{}", self.gateway, Uuid::new_v4().simple());
        self.intents.lock().unwrap().insert(
            intent_id.clone(),
            SandboxIntent {
                status: IntentStatus::RequiresCapture,
                amount_minor: amount.amount_minor,
            },
        );

        Ok(PaymentIntent {
            intent_id,
            status: IntentStatus::RequiresCapture,
        })
    }

    async fn capture_auth(&self, intent_id: &str) -> Result<IntentStatus, GatewayError> {
        if self.unavailable_captures.load(Ordering::SeqCst) > 0 {
            self.unavailable_captures.fetch_sub(1, Ordering::SeqCst);
            return Err(GatewayError::Unavailable(
                "sandbox processor timeout".to_string(),
            ));
        }
        if self.decline_next_capture.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Declined("card declined".to_string()));
        }

        let mut intents = self.intents.lock().unwrap();
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::Declined(format!("unknown intent {}", intent_id)))?;
        intent.status = IntentStatus::Captured;
        Ok(IntentStatus::Captured)
    }

    async fn refund(&self, intent_id: &str, amount: &Money) -> Result<IntentStatus, GatewayError> {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::Declined(format!("unknown intent {}", intent_id)))?;

        if intent.status != IntentStatus::Captured {
            return Err(GatewayError::Declined(
                "only captured intents can be refunded".to_string(),
            ));
        }
        if amount.amount_minor > intent.amount_minor {
            return Err(GatewayError::Declined(
                "refund exceeds captured amount".to_string(),
            ));
        }

        intent.status = IntentStatus::Refunded;
        Ok(IntentStatus::Refunded)
    }
}

#[derive(Debug, Clone)]
struct HoldRecord {
    item_refs: Vec<String>,
    expires_at: chrono::DateTime<Utc>,
}

/// Sandbox inventory. Tracks per-hold release counts so tests can assert
/// a hold is released exactly once.
#[derive(Default)]
pub struct InMemoryInventory {
    holds: Mutex<HashMap<String, HoldRecord>>,
    release_counts: Mutex<HashMap<String, u32>>,
    fail_next_holds: AtomicUsize,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` hold requests fail as transient outages.
    pub fn fail_next_holds(&self, n: usize) {
        self.fail_next_holds.store(n, Ordering::SeqCst);
    }

    pub fn release_count(&self, hold_id: &str) -> u32 {
        self.release_counts
            .lock()
            .unwrap()
            .get(hold_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn active_holds(&self) -> usize {
        self.holds.lock().unwrap().len()
    }

    pub fn hold_items(&self, hold_id: &str) -> Option<Vec<String>> {
        self.holds
            .lock()
            .unwrap()
            .get(hold_id)
            .map(|h| h.item_refs.clone())
    }

    /// Hold ids whose TTL has lapsed, for sweep-style cleanup in tests.
    pub fn lapsed_holds(&self) -> Vec<String> {
        let now = Utc::now();
        self.holds
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, h)| h.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[async_trait]
impl InventoryService for InMemoryInventory {
    async fn hold(&self, item_refs: &[String], ttl_secs: i64) -> Result<String, InventoryError> {
        if self.fail_next_holds.load(Ordering::SeqCst) > 0 {
            self.fail_next_holds.fetch_sub(1, Ordering::SeqCst);
            return Err(InventoryError::Unavailable(
                "sandbox inventory timeout".to_string(),
            ));
        }

        let hold_id = format!("hold_{}", Uuid::new_v4().simple());
        self.holds.lock().unwrap().insert(
            hold_id.clone(),
            HoldRecord {
                item_refs: item_refs.to_vec(),
                expires_at: Utc::now() + Duration::seconds(ttl_secs),
            },
        );
        Ok(hold_id)
    }

    async fn release(&self, hold_id: &str) -> Result<(), InventoryError> {
        let removed = self.holds.lock().unwrap().remove(hold_id);
        if removed.is_none() {
            return Err(InventoryError::UnknownHold(hold_id.to_string()));
        }
        *self
            .release_counts
            .lock()
            .unwrap()
            .entry(hold_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn confirm(&self, hold_id: &str) -> Result<(), InventoryError> {
        let removed = self.holds.lock().unwrap().remove(hold_id);
        if removed.is_none() {
            return Err(InventoryError::UnknownHold(hold_id.to_string()));
        }
        Ok(())
    }
}

/// Sandbox fulfillment. Can fail the next N ticket issues to exercise the
/// retry path.
#[derive(Default)]
pub struct InMemoryFulfillment {
    issued: Mutex<Vec<(Uuid, Uuid, String)>>,
    fail_next_issues: AtomicUsize,
}

impl InMemoryFulfillment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_issues(&self, n: usize) {
        self.fail_next_issues.store(n, Ordering::SeqCst);
    }

    pub fn issued_count(&self) -> usize {
        self.issued.lock().unwrap().len()
    }
}

#[async_trait]
impl FulfillmentService for InMemoryFulfillment {
    async fn issue_ticket(
        &self,
        booking_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<String, FulfillmentError> {
        if self.fail_next_issues.load(Ordering::SeqCst) > 0 {
            self.fail_next_issues.fetch_sub(1, Ordering::SeqCst);
            return Err(FulfillmentError::Unavailable(
                "sandbox fulfillment timeout".to_string(),
            ));
        }

        let artifact = format!("tkt_{}", Uuid::new_v4().simple());
        self.issued
            .lock()
            .unwrap()
            .push((booking_id, transaction_id, artifact.clone()));
        Ok(artifact)
    }
}
