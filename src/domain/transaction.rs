//! Payment transaction entity.
//! Owned exclusively by the booking saga that created it; the amount and
//! currency are never mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::{FxSnapshot, Money};
use super::routing::GatewayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    AuthCaptured,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub money: Money,
    pub fx: FxSnapshot,
    pub gateway: GatewayId,
    pub status: TransactionStatus,
    pub intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(money: Money, fx: FxSnapshot, gateway: GatewayId) -> Self {
        Self {
            id: Uuid::new_v4(),
            money,
            fx,
            gateway,
            status: TransactionStatus::Pending,
            intent_id: None,
            created_at: Utc::now(),
        }
    }
}
