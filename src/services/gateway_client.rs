//! Circuit-breaker wrapper around a gateway adapter, plus the registry of
//! configured processors. A tripped breaker is reported as a transient
//! processor outage so callers classify it correctly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, Error as FailsafeError, StateMachine};

use crate::adapters::sandbox::SandboxGateway;
use crate::config::GatewayCredentials;
use crate::domain::money::Money;
use crate::domain::routing::GatewayId;
use crate::error::AppError;
use crate::ports::{GatewayAdapter, GatewayError, IntentStatus, PaymentIntent};

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

pub struct GatewayClient {
    id: GatewayId,
    adapter: Arc<dyn GatewayAdapter>,
    circuit_breaker: Breaker,
}

impl GatewayClient {
    pub fn new(id: GatewayId, adapter: Arc<dyn GatewayAdapter>) -> Self {
        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = BreakerConfig::new().failure_policy(policy).build();

        Self {
            id,
            adapter,
            circuit_breaker,
        }
    }

    pub fn id(&self) -> GatewayId {
        self.id
    }

    /// Current breaker state, exposed for health reporting.
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    pub async fn create_payment_intent(
        &self,
        amount: &Money,
        metadata: serde_json::Value,
    ) -> Result<PaymentIntent, GatewayError> {
        let adapter = self.adapter.clone();
        let amount = amount.clone();
        let result = self
            .circuit_breaker
            .call(async move { adapter.create_payment_intent(&amount, metadata).await })
            .await;
        Self::unwrap_breaker(self.id, result)
    }

    pub async fn capture_auth(&self, intent_id: &str) -> Result<IntentStatus, GatewayError> {
        let adapter = self.adapter.clone();
        let intent_id = intent_id.to_string();
        let result = self
            .circuit_breaker
            .call(async move { adapter.capture_auth(&intent_id).await })
            .await;
        Self::unwrap_breaker(self.id, result)
    }

    pub async fn refund(
        &self,
        intent_id: &str,
        amount: &Money,
    ) -> Result<IntentStatus, GatewayError> {
        let adapter = self.adapter.clone();
        let intent_id = intent_id.to_string();
        let amount = amount.clone();
        let result = self
            .circuit_breaker
            .call(async move { adapter.refund(&intent_id, &amount).await })
            .await;
        Self::unwrap_breaker(self.id, result)
    }

    fn unwrap_breaker<T>(
        id: GatewayId,
        result: Result<T, FailsafeError<GatewayError>>,
    ) -> Result<T, GatewayError> {
        match result {
            Ok(value) => Ok(value),
            Err(FailsafeError::Inner(err)) => Err(err),
            Err(FailsafeError::Rejected) => Err(GatewayError::Unavailable(format!(
                "circuit breaker open for {}",
                id
            ))),
        }
    }
}

/// All configured processors, keyed by id. Built once at startup; lookup
/// of an unconfigured gateway is an internal error, since routing only
/// returns ids this registry was built with.
pub struct GatewayRegistry {
    clients: HashMap<GatewayId, Arc<GatewayClient>>,
}

impl GatewayRegistry {
    pub fn new(clients: HashMap<GatewayId, Arc<GatewayClient>>) -> Self {
        Self { clients }
    }

    /// Sandbox registry from validated credentials. Returns the concrete
    /// sandbox handles so tests can script declines and outages.
    pub fn sandbox(credentials: &GatewayCredentials) -> (Self, SandboxHandles) {
        let stripe = Arc::new(SandboxGateway::new(
            GatewayId::Stripe,
            &credentials.stripe_secret_key,
        ));
        let paypal = Arc::new(SandboxGateway::new(
            GatewayId::Paypal,
            &credentials.paypal_client_id,
        ));
        let flutterwave = Arc::new(SandboxGateway::new(
            GatewayId::Flutterwave,
            &credentials.flutterwave_secret_key,
        ));
        let paystack = Arc::new(SandboxGateway::new(
            GatewayId::Paystack,
            &credentials.paystack_secret_key,
        ));

        let mut clients = HashMap::new();
        for (id, adapter) in [
            (GatewayId::Stripe, stripe.clone() as Arc<dyn GatewayAdapter>),
            (GatewayId::Paypal, paypal.clone() as Arc<dyn GatewayAdapter>),
            (
                GatewayId::Flutterwave,
                flutterwave.clone() as Arc<dyn GatewayAdapter>,
            ),
            (
                GatewayId::Paystack,
                paystack.clone() as Arc<dyn GatewayAdapter>,
            ),
        ] {
            clients.insert(id, Arc::new(GatewayClient::new(id, adapter)));
        }

        (
            Self { clients },
            SandboxHandles {
                stripe,
                paypal,
                flutterwave,
                paystack,
            },
        )
    }

    pub fn get(&self, id: GatewayId) -> Result<Arc<GatewayClient>, AppError> {
        self.clients
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::Configuration(format!("gateway {} not configured", id)))
    }

    pub fn circuit_states(&self) -> HashMap<String, &'static str> {
        self.clients
            .iter()
            .map(|(id, client)| (id.to_string(), client.circuit_state()))
            .collect()
    }
}

/// Concrete sandbox adapters, for scripting processor behavior in tests.
pub struct SandboxHandles {
    pub stripe: Arc<SandboxGateway>,
    pub paypal: Arc<SandboxGateway>,
    pub flutterwave: Arc<SandboxGateway>,
    pub paystack: Arc<SandboxGateway>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::domain::money::Currency;

    #[tokio::test]
    async fn test_registry_serves_all_configured_gateways() {
        let cfg = config::test_config();
        let (registry, _handles) = GatewayRegistry::sandbox(&cfg.gateways);

        for id in [
            GatewayId::Stripe,
            GatewayId::Paypal,
            GatewayId::Flutterwave,
            GatewayId::Paystack,
        ] {
            let client = registry.get(id).unwrap();
            assert_eq!(client.id(), id);
            assert_eq!(client.circuit_state(), "closed");
        }
    }

    #[tokio::test]
    async fn test_client_passes_through_adapter_calls() {
        let cfg = config::test_config();
        let (registry, _handles) = GatewayRegistry::sandbox(&cfg.gateways);
        let client = registry.get(GatewayId::Stripe).unwrap();

        let money = Money::new(5_000, Currency::parse("USD").unwrap());
        let intent = client
            .create_payment_intent(&money, serde_json::json!({"orderId": "o-1"}))
            .await
            .unwrap();
        assert_eq!(
            client.capture_auth(&intent.intent_id).await.unwrap(),
            IntentStatus::Captured
        );
    }
}
