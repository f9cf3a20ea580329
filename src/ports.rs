//! Ports for external collaborators. The saga and orchestration code
//! depend only on these traits, never on a concrete processor SDK.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::money::Money;

/// Errors from a payment processor, pre-classified by the adapter.
/// Declines are final; unavailability is transient and retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Processor declined the charge: {0}")]
    Declined(String),

    #[error("Processor unreachable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresCapture,
    Captured,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub status: IntentStatus,
}

/// Per-processor payment operations.
#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount: &Money,
        metadata: serde_json::Value,
    ) -> Result<PaymentIntent, GatewayError>;

    async fn capture_auth(&self, intent_id: &str) -> Result<IntentStatus, GatewayError>;

    async fn refund(&self, intent_id: &str, amount: &Money) -> Result<IntentStatus, GatewayError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("Inventory unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown hold: {0}")]
    UnknownHold(String),
}

impl InventoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, InventoryError::Unavailable(_))
    }
}

/// External inventory system holding seats, rooms, vehicles.
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn hold(&self, item_refs: &[String], ttl_secs: i64) -> Result<String, InventoryError>;
    async fn release(&self, hold_id: &str) -> Result<(), InventoryError>;
    async fn confirm(&self, hold_id: &str) -> Result<(), InventoryError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("Fulfillment unavailable: {0}")]
    Unavailable(String),
}

impl FulfillmentError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FulfillmentError::Unavailable(_))
    }
}

/// Issues the booking artifact (ticket or voucher) once funds are captured.
#[async_trait]
pub trait FulfillmentService: Send + Sync {
    async fn issue_ticket(
        &self,
        booking_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<String, FulfillmentError>;
}
