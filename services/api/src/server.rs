use crate::cli::ServeArgs;
use crate::infra::{build_services, sample_candidates, spawn_arrival_log, AppState};
use crate::routes::with_candidate_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use talent_portal::config::{AppConfig, AppEnvironment};
use talent_portal::error::AppError;
use talent_portal::telemetry;
use talent_portal::workflows::candidates::{BroadcastArrivalNotifier, LoggingMailer, SystemClock};
use tracing::info;

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

    let arrivals = BroadcastArrivalNotifier::new();
    spawn_arrival_log(arrivals.subscribe());

    let services = build_services(
        &config,
        Arc::new(LoggingMailer),
        Arc::new(arrivals),
        Arc::new(SystemClock),
    );
    if config.environment != AppEnvironment::Production {
        for candidate in sample_candidates() {
            services.directory.upsert(candidate);
        }
    }

    let app = with_candidate_routes(services.invites, services.checkin)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        office_lat = config.checkin.office.latitude,
        office_lng = config.checkin.office.longitude,
        allowed_meters = config.checkin.allowed_meters(),
        window_minutes = config.checkin.window_minutes,
        "talent portal ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
