use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::cart::CartError;
use crate::domain::money::MoneyError;
use crate::domain::saga::SagaError;
use crate::domain::split::SplitError;
use crate::ports::{FulfillmentError, GatewayError, InventoryError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Transition in flight, retry: {0}")]
    Conflict(String),

    #[error("Unsupported gateway: {0}")]
    UnsupportedGateway(String),

    #[error("Over-refund: {0}")]
    OverRefund(String),

    #[error("Booking expired: {0}")]
    Expired(String),

    #[error("Card declined: {0}")]
    ProcessorDeclined(String),

    #[error("Payment processor unreachable: {0}")]
    ProcessorUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::UnknownCurrency(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnsupportedGateway(_) | AppError::OverRefund(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Expired(_) => StatusCode::GONE,
            AppError::ProcessorDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::ProcessorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine code so the storefront can choose retry vs abort
    /// messaging without parsing error text.
    fn code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "configuration_error",
            AppError::Validation(_) => "validation_error",
            AppError::UnknownCurrency(_) => "unknown_currency",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidStateTransition(_) => "invalid_state_transition",
            AppError::Conflict(_) => "transition_in_flight",
            AppError::UnsupportedGateway(_) => "unsupported_gateway",
            AppError::OverRefund(_) => "over_refund",
            AppError::Expired(_) => "booking_expired",
            AppError::ProcessorDeclined(_) => "card_declined",
            AppError::ProcessorUnavailable(_) => "processor_unreachable",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            AppError::Conflict(_) | AppError::ProcessorUnavailable(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
            "retryable": self.retryable(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<MoneyError> for AppError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::UnknownCurrency(code) => AppError::UnknownCurrency(code),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<SplitError> for AppError {
    fn from(err: SplitError) -> Self {
        match err {
            SplitError::UnsupportedGateway(gateway) => {
                AppError::UnsupportedGateway(gateway.to_string())
            }
            SplitError::OverRefund { .. } => AppError::OverRefund(err.to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<SagaError> for AppError {
    fn from(err: SagaError) -> Self {
        match err {
            SagaError::InvalidTransition { .. } => {
                AppError::InvalidStateTransition(err.to_string())
            }
            SagaError::Expired(booking_id) => AppError::Expired(booking_id.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Declined(reason) => AppError::ProcessorDeclined(reason),
            GatewayError::Unavailable(reason) => AppError::ProcessorUnavailable(reason),
        }
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::UnknownHold(id) => AppError::NotFound(format!("hold {}", id)),
            InventoryError::Unavailable(reason) => AppError::ProcessorUnavailable(reason),
        }
    }
}

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::Unavailable(reason) => AppError::ProcessorUnavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("bad amount".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_transition_status_code() {
        let error = AppError::InvalidStateTransition("captureAuth from HELD".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_declined_vs_unreachable_are_distinct() {
        let declined = AppError::ProcessorDeclined("insufficient funds".to_string());
        let unreachable = AppError::ProcessorUnavailable("timeout".to_string());
        assert_eq!(declined.code(), "card_declined");
        assert_eq!(unreachable.code(), "processor_unreachable");
        assert!(!declined.retryable());
        assert!(unreachable.retryable());
    }

    #[test]
    fn test_over_refund_status_code() {
        let error = AppError::OverRefund("requested 10, charged 5".to_string());
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let error = AppError::Expired("b-1".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::GONE);
    }
}
