use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traveease_commerce::adapters::{InMemoryFulfillment, InMemoryInventory};
use traveease_commerce::cli::{Cli, Commands};
use traveease_commerce::config::{fees, Config};
use traveease_commerce::domain::money::Currency;
use traveease_commerce::domain::routing::RoutingTable;
use traveease_commerce::services::coordinator::BookingCoordinator;
use traveease_commerce::services::gateway_client::GatewayRegistry;
use traveease_commerce::services::orchestrator::PaymentOrchestrator;
use traveease_commerce::{cli, create_app, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let report = startup::validate_environment(&config)?;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("Startup validation failed");
    }

    let fee_rules = fees::default_rules()?;

    let (registry, _handles) = GatewayRegistry::sandbox(&config.gateways);
    let gateways = Arc::new(registry);
    tracing::info!("Gateway registry initialized with sandbox adapters");

    let inventory = Arc::new(InMemoryInventory::new());
    let fulfillment = Arc::new(InMemoryFulfillment::new());

    let coordinator = Arc::new(BookingCoordinator::new(
        &config,
        fee_rules.clone(),
        inventory,
        fulfillment,
        gateways.clone(),
    )?);
    let _sweep =
        coordinator.spawn_expiry_sweep(Duration::from_secs(config.expiry_sweep_interval_secs));
    tracing::info!(
        "Booking coordinator started, sweep every {}s",
        config.expiry_sweep_interval_secs
    );

    let base_currency = Currency::parse(&config.base_currency)
        .map_err(|e| anyhow::anyhow!("BASE_CURRENCY: {}", e))?;
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        RoutingTable::default(),
        gateways.clone(),
        base_currency,
    ));

    let state = AppState {
        coordinator,
        orchestrator,
        gateways,
        fee_rules: Arc::new(fee_rules),
        start_time: Instant::now(),
    };

    let app = create_app(state, config.cors_allowed_origins.as_deref());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
