//! Payflow server binary.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payflow::adapters::http::{payment_router, PaymentAppState};
use payflow::adapters::postgres::{
    PostgresCouponRepository, PostgresPaymentLedger, PostgresRevenueSplitRepository, MIGRATOR,
};
use payflow::adapters::SandboxGateway;
use payflow::application::{GatewayRegistry, PaymentOrchestrator};
use payflow::config::{AppConfig, LogFormat};

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.server.effective_log_format() {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config);

    let pool = config.database.connect_lazy()?;
    if config.database.run_migrations {
        MIGRATOR.run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let payment = &config.payment;
    let sandbox = SandboxGateway::new("sandbox", payment.sandbox_webhook_secret.clone())
        .with_fees(payment.fees)
        .with_max_event_age_secs(payment.max_webhook_age_secs);
    let registry = Arc::new(GatewayRegistry::new());
    registry.register(Arc::new(sandbox));
    registry.set_active(&payment.active_gateway)?;

    let splits = Arc::new(PostgresRevenueSplitRepository::new(pool.clone()));
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        registry,
        Arc::new(PostgresPaymentLedger::new(pool.clone())),
        Arc::new(PostgresCouponRepository::new(pool)),
        splits,
        payment.orchestrator_settings(),
    ));

    let app = payment_router(
        PaymentAppState::new(orchestrator),
        config.server.request_timeout(),
        config.server.body_limit_bytes,
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, gateway = %payment.active_gateway, "Payflow listening");
    axum::serve(listener, app).await?;

    Ok(())
}
