use clap::{Parser, Subcommand};

use crate::config::{fees, Config};

#[derive(Parser)]
#[command(name = "traveease-commerce")]
#[command(about = "Traveease Commerce - payment and booking orchestration service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Validate configuration and fee rules, then exit
    Config,
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Base Currency: {}", config.base_currency);
    println!("  Max Concurrent Sagas: {}", config.max_concurrent_sagas);
    println!("  Default Hold TTL: {}s", config.default_hold_ttl_secs);
    println!("  Expiry Sweep Interval: {}s", config.expiry_sweep_interval_secs);

    let rules = fees::default_rules()?;
    fees::validate_rules(&rules)?;
    println!("  Jurisdiction Rules: {}", rules.len());
    for rule in &rules {
        println!(
            "    {} ({}): duty {} over {}, VAT {}",
            rule.jurisdiction,
            rule.currency,
            rule.stamp_duty_flat_minor,
            rule.stamp_duty_threshold_minor,
            rule.vat_rate
        );
    }

    let report = crate::startup::validate_environment(config)?;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("Configuration is invalid");
    }

    println!("✓ Configuration is valid");
    Ok(())
}
