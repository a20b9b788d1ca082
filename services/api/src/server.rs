use crate::cli::ServeArgs;
use crate::infra::{standing_roster, AppState, InMemoryCandidateRepository, TracingNotifier};
use crate::routes::with_panel_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use scholar_panels::config::AppConfig;
use scholar_panels::error::AppError;
use scholar_panels::telemetry;
use scholar_panels::workflows::interview::{CandidateImporter, PanelAllocationService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
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

    let candidates = match args.candidates_csv.take() {
        Some(path) => CandidateImporter::from_path(path)?,
        None => Vec::new(),
    };
    let repository = Arc::new(InMemoryCandidateRepository::seeded(candidates));
    let notifier = Arc::new(TracingNotifier::default());
    let service = Arc::new(PanelAllocationService::new(
        repository.clone(),
        notifier,
        config.console.service_settings(),
    ));
    for number in 1..=args.panels {
        service.create_panel(standing_roster(number, usize::from(args.evaluators)))?;
    }
    info!(
        candidates = repository.len(),
        panels = service.panels().len(),
        faculty = %config.console.scope.faculty,
        department = %config.console.scope.department,
        "panel console seeded"
    );

    let app = with_panel_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "scholar panel console ready");

    axum::serve(listener, app).await?;
    Ok(())
}
