//! Payment intent orchestration: pick the processor, record the amount
//! with its FX snapshot, and open the intent through the adapter.

use std::sync::Arc;

use bigdecimal::{BigDecimal, One};

use crate::domain::money::{self, Currency};
use crate::domain::routing::{BuyerSignal, RoutingTable};
use crate::domain::transaction::Transaction;
use crate::error::AppError;
use crate::services::gateway_client::GatewayRegistry;

pub struct IntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub buyer: BuyerSignal,
    pub vendor_location: String,
    /// Mid-market rate to the base currency; defaults to 1 when the charge
    /// is already denominated in it.
    pub mid_market_rate: Option<BigDecimal>,
    pub metadata: serde_json::Value,
}

pub struct PaymentOrchestrator {
    routing: RoutingTable,
    gateways: Arc<GatewayRegistry>,
    base_currency: Currency,
}

impl PaymentOrchestrator {
    pub fn new(routing: RoutingTable, gateways: Arc<GatewayRegistry>, base_currency: Currency) -> Self {
        Self {
            routing,
            gateways,
            base_currency,
        }
    }

    /// Routes and opens a payment intent. The returned transaction carries
    /// the immutable FX snapshot and the adapter's intent id.
    pub async fn create_intent(&self, req: IntentRequest) -> Result<Transaction, AppError> {
        if req.amount_minor <= 0 {
            return Err(AppError::Validation(
                "amount_minor must be positive".to_string(),
            ));
        }

        let rate = req.mid_market_rate.unwrap_or_else(BigDecimal::one);
        let (amount, fx) = money::record(
            req.amount_minor,
            &req.currency,
            self.base_currency.code(),
            rate,
        )?;

        let gateway = self
            .routing
            .select(&amount.currency, &req.buyer, &req.vendor_location);
        tracing::debug!(
            "Routed {} {} from vendor {} to {}",
            amount.amount_minor,
            amount.currency,
            req.vendor_location,
            gateway
        );

        let client = self.gateways.get(gateway)?;
        let intent = client.create_payment_intent(&amount, req.metadata).await?;

        let mut transaction = Transaction::new(amount, fx, gateway);
        transaction.intent_id = Some(intent.intent_id);

        tracing::info!(
            "Payment intent {} opened on {} for transaction {}",
            transaction.intent_id.as_deref().unwrap_or("-"),
            gateway,
            transaction.id
        );
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::domain::routing::GatewayId;

    fn orchestrator() -> PaymentOrchestrator {
        let cfg = config::test_config();
        let (registry, _handles) = GatewayRegistry::sandbox(&cfg.gateways);
        PaymentOrchestrator::new(
            RoutingTable::default(),
            Arc::new(registry),
            Currency::parse("USD").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_intent_routes_and_opens() {
        let tx = orchestrator()
            .create_intent(IntentRequest {
                amount_minor: 10_000,
                currency: "USD".to_string(),
                buyer: BuyerSignal::default(),
                vendor_location: "NG".to_string(),
                mid_market_rate: None,
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        assert_eq!(tx.gateway, GatewayId::Stripe);
        assert!(tx.intent_id.is_some());
        assert_eq!(tx.money.amount_minor, 10_000);
    }

    #[tokio::test]
    async fn test_create_intent_rejects_unknown_currency() {
        let err = orchestrator()
            .create_intent(IntentRequest {
                amount_minor: 10_000,
                currency: "WAT".to_string(),
                buyer: BuyerSignal::default(),
                vendor_location: "NG".to_string(),
                mid_market_rate: None,
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownCurrency(_)));
    }

    #[tokio::test]
    async fn test_create_intent_rejects_non_positive_amount() {
        let err = orchestrator()
            .create_intent(IntentRequest {
                amount_minor: 0,
                currency: "USD".to_string(),
                buyer: BuyerSignal::default(),
                vendor_location: "BR".to_string(),
                mid_market_rate: None,
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
