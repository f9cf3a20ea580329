use anyhow::Result;

use crate::config::{fees, Config};
use crate::domain::money::Currency;

pub struct ValidationReport {
    pub environment: bool,
    pub currencies: bool,
    pub gateways: bool,
    pub fee_rules: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.currencies && self.gateways && self.fee_rules
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Currency Registry:     {}", status(self.currencies));
        println!("Gateway Credentials:   {}", status(self.gateways));
        println!("Jurisdiction Rules:    {}", status(self.fee_rules));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ OK"
    } else {
        "❌ FAIL"
    }
}

/// Validates everything the service needs before it binds a port. A failed
/// report is fatal; the service never limps along with a half-valid setup.
pub fn validate_environment(config: &Config) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        currencies: true,
        gateways: true,
        fee_rules: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_currencies(config) {
        report.currencies = false;
        report.errors.push(format!("Currencies: {}", e));
    }

    if let Err(e) = validate_gateways(config) {
        report.gateways = false;
        report.errors.push(format!("Gateways: {}", e));
    }

    match fees::default_rules() {
        Ok(rules) => {
            if let Err(e) = fees::validate_rules(&rules) {
                report.fee_rules = false;
                report.errors.push(format!("Fee rules: {}", e));
            }
        }
        Err(e) => {
            report.fee_rules = false;
            report.errors.push(format!("Fee rules: {}", e));
        }
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.max_concurrent_sagas == 0 {
        anyhow::bail!("MAX_CONCURRENT_SAGAS must be greater than 0");
    }
    if config.default_hold_ttl_secs <= 0 {
        anyhow::bail!("DEFAULT_HOLD_TTL_SECS must be greater than 0");
    }
    if config.expiry_sweep_interval_secs == 0 {
        anyhow::bail!("EXPIRY_SWEEP_INTERVAL_SECS must be greater than 0");
    }
    if let Some(origins) = &config.cors_allowed_origins {
        for origin in origins.split(',') {
            url::Url::parse(origin.trim())
                .map_err(|_| anyhow::anyhow!("CORS origin {} is not a valid URL", origin))?;
        }
    }
    Ok(())
}

fn validate_currencies(config: &Config) -> Result<()> {
    Currency::parse(&config.base_currency)
        .map_err(|e| anyhow::anyhow!("BASE_CURRENCY: {}", e))?;
    Ok(())
}

fn validate_gateways(config: &Config) -> Result<()> {
    for (name, value) in [
        ("STRIPE_SECRET_KEY", &config.gateways.stripe_secret_key),
        ("PAYPAL_CLIENT_ID", &config.gateways.paypal_client_id),
        (
            "FLUTTERWAVE_SECRET_KEY",
            &config.gateways.flutterwave_secret_key,
        ),
        ("PAYSTACK_SECRET_KEY", &config.gateways.paystack_secret_key),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("{} is empty", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    #[test]
    fn test_valid_config_passes() {
        let report = validate_environment(&config::test_config()).unwrap();
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn test_empty_credential_fails() {
        let mut cfg = config::test_config();
        cfg.gateways.paystack_secret_key = "".to_string();

        let report = validate_environment(&cfg).unwrap();
        assert!(!report.gateways);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_unknown_base_currency_fails() {
        let mut cfg = config::test_config();
        cfg.base_currency = "DOGE".to_string();

        let report = validate_environment(&cfg).unwrap();
        assert!(!report.currencies);
    }

    #[test]
    fn test_zero_saga_limit_fails() {
        let mut cfg = config::test_config();
        cfg.max_concurrent_sagas = 0;

        let report = validate_environment(&cfg).unwrap();
        assert!(!report.environment);
    }
}
