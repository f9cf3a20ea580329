use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

pub mod fees;

/// Credentials for one payment processor. All four processors must be
/// configured; a missing credential is a startup-time fatal error, never a
/// per-request failure.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayCredentials {
    pub stripe_secret_key: String,
    pub paypal_client_id: String,
    pub flutterwave_secret_key: String,
    pub paystack_secret_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub base_currency: String,
    pub gateways: GatewayCredentials,
    /// Upper bound on sagas concurrently talking to downstream processors.
    pub max_concurrent_sagas: usize,
    /// Default inventory hold TTL when a checkout does not specify one.
    pub default_hold_ttl_secs: i64,
    /// Interval of the background sweep that expires stale holds.
    pub expiry_sweep_interval_secs: u64,
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            base_currency: env::var("BASE_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
            gateways: GatewayCredentials {
                stripe_secret_key: env::var("STRIPE_SECRET_KEY")?,
                paypal_client_id: env::var("PAYPAL_CLIENT_ID")?,
                flutterwave_secret_key: env::var("FLUTTERWAVE_SECRET_KEY")?,
                paystack_secret_key: env::var("PAYSTACK_SECRET_KEY")?,
            },
            max_concurrent_sagas: env::var("MAX_CONCURRENT_SAGAS")
                .unwrap_or_else(|_| "64".to_string())
                .parse()?,
            default_hold_ttl_secs: env::var("DEFAULT_HOLD_TTL_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()?,
            expiry_sweep_interval_secs: env::var("EXPIRY_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
        })
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
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
