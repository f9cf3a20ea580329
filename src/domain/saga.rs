//! Booking saga state machine.
//!
//! States and events form an explicit transition table enforced by a single
//! dispatch function; any pair not in the table is rejected. Every applied
//! transition is appended to the saga history for audit.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::compliance::ComplianceAssessment;
use super::split::VendorPayout;
use super::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingState {
    Holding,
    Held,
    PriceLocked,
    AuthCaptured,
    Ticketed,
    Expired,
    Failed,
    Cancelled,
}

impl BookingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingState::Ticketed
                | BookingState::Expired
                | BookingState::Failed
                | BookingState::Cancelled
        )
    }
}

impl std::fmt::Display for BookingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BookingState::Holding => "HOLDING",
            BookingState::Held => "HELD",
            BookingState::PriceLocked => "PRICE_LOCKED",
            BookingState::AuthCaptured => "AUTH_CAPTURED",
            BookingState::Ticketed => "TICKETED",
            BookingState::Expired => "EXPIRED",
            BookingState::Failed => "FAILED",
            BookingState::Cancelled => "CANCELLED",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingEvent {
    HoldAcquired,
    HoldFailed,
    LockPrice,
    CaptureAuth,
    CaptureFailed,
    Ticket,
    TicketFailed,
    Expire,
    Cancel,
}

impl std::fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BookingEvent::HoldAcquired => "holdAcquired",
            BookingEvent::HoldFailed => "holdFailed",
            BookingEvent::LockPrice => "lockPrice",
            BookingEvent::CaptureAuth => "captureAuth",
            BookingEvent::CaptureFailed => "captureFailed",
            BookingEvent::Ticket => "ticket",
            BookingEvent::TicketFailed => "ticketFailed",
            BookingEvent::Expire => "expire",
            BookingEvent::Cancel => "cancel",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SagaError {
    #[error("Invalid transition: {event} is not allowed from {from}")]
    InvalidTransition {
        from: BookingState,
        event: BookingEvent,
    },

    #[error("Booking {0} hold TTL has expired")]
    Expired(Uuid),
}

/// The transition table. `None` means the pair is rejected; skipping a
/// state (e.g. captureAuth while still HELD) is never allowed.
pub fn next_state(from: BookingState, event: BookingEvent) -> Option<BookingState> {
    use BookingEvent::*;
    use BookingState::*;

    match (from, event) {
        (Holding, HoldAcquired) => Some(Held),
        (Holding, HoldFailed) => Some(Failed),
        (Held, LockPrice) => Some(PriceLocked),
        (PriceLocked, CaptureAuth) => Some(AuthCaptured),
        (PriceLocked, CaptureFailed) => Some(Failed),
        (AuthCaptured, Ticket) => Some(Ticketed),
        (AuthCaptured, TicketFailed) => Some(Failed),
        (Held, Expire) | (PriceLocked, Expire) => Some(Expired),
        (state, Cancel) if !state.is_terminal() => Some(Cancelled),
        _ => None,
    }
}

/// One applied transition, recorded for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: BookingState,
    pub event: BookingEvent,
    pub to: BookingState,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Per-booking saga state. Mutated only through `apply`; all other
/// components submit requests and receive results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSaga {
    pub booking_id: Uuid,
    pub state: BookingState,
    pub ttl_expiry: Option<DateTime<Utc>>,
    pub hold_id: Option<String>,
    pub transaction: Option<Transaction>,
    pub assessment: Option<ComplianceAssessment>,
    pub payouts: Vec<VendorPayout>,
    pub artifact_ref: Option<String>,
    pub history: Vec<TransitionRecord>,
    /// Compensating actions that could not be completed automatically and
    /// await manual reconciliation by ops.
    pub reconciliation: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingSaga {
    pub fn new(booking_id: Uuid) -> Self {
        Self {
            booking_id,
            state: BookingState::Holding,
            ttl_expiry: None,
            hold_id: None,
            transaction: None,
            assessment: None,
            payouts: Vec::new(),
            artifact_ref: None,
            history: Vec::new(),
            reconciliation: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Applies an event through the transition table, appending to history.
    pub fn apply(&mut self, event: BookingEvent) -> Result<BookingState, SagaError> {
        self.apply_with_note(event, None)
    }

    pub fn apply_with_note(
        &mut self,
        event: BookingEvent,
        note: Option<String>,
    ) -> Result<BookingState, SagaError> {
        let from = self.state;
        let to = next_state(from, event).ok_or(SagaError::InvalidTransition { from, event })?;
        self.history.push(TransitionRecord {
            from,
            event,
            to,
            at: Utc::now(),
            note,
        });
        self.state = to;
        Ok(to)
    }

    pub fn set_ttl(&mut self, ttl_secs: i64) {
        self.ttl_expiry = Some(Utc::now() + Duration::seconds(ttl_secs));
    }

    /// TTL guard re-checked at every sensitive transition, not only by the
    /// background sweep.
    pub fn ensure_not_expired(&self, now: DateTime<Utc>) -> Result<(), SagaError> {
        match self.ttl_expiry {
            Some(expiry) if now >= expiry => Err(SagaError::Expired(self.booking_id)),
            _ => Ok(()),
        }
    }

    /// Takes the inventory hold id, guaranteeing at most one release.
    pub fn take_hold(&mut self) -> Option<String> {
        self.hold_id.take()
    }

    pub fn needs_reconciliation(&mut self, action: String) {
        self.reconciliation.push(action);
    }
}
