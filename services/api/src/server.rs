use crate::cli::ServeArgs;
use crate::infra::{in_memory_referral_state, spawn_dashboard_refresh, AppState};
use crate::routes::with_referral_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use neobridge::config::AppConfig;
use neobridge::error::AppError;
use neobridge::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let referrals = in_memory_referral_state(&config.referrals);
    let dashboard = spawn_dashboard_refresh(referrals.clone(), &config.referrals);

    let app = with_referral_routes(referrals)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        locale = ?config.referrals.locale,
        assignment_policy = ?config.referrals.assignment_policy,
        "neobridge referral service ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    dashboard.cancel().await;
    info!("neobridge referral service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
