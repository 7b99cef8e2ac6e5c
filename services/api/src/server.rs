use crate::cli::ServeArgs;
use crate::infra::{seed_admin, AppState, InMemoryEntityStore, InMemoryPaymentGateway};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tuition_market::config::AppConfig;
use tuition_market::error::AppError;
use tuition_market::marketplace::Marketplace;
use tuition_market::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryEntityStore::default());
    match config.marketplace.bootstrap_admin.as_deref() {
        Some(email) => {
            if let Err(err) = seed_admin(&store, email) {
                warn!(%email, error = %err, "bootstrap admin was not seeded");
            }
        }
        None => warn!("MARKET_BOOTSTRAP_ADMIN unset; no account can approve tuition posts"),
    }

    let gateway = Arc::new(InMemoryPaymentGateway::default());
    let market = Arc::new(Marketplace::new(store, gateway, &config.marketplace));

    let app = with_marketplace_routes(market)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "tuition marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}
