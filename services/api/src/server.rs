use crate::cli::ServeArgs;
use crate::consumer;
use crate::infra::{build_engine, AppState, ReferenceData, TracingAudit, TracingPublisher};
use crate::routes::ops_router;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use incentives::config::AppConfig;
use incentives::error::AppError;
use incentives::telemetry;
use incentives::workflows::reviews::Notifier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let reference = match args.reference_data.take() {
        Some(path) => ReferenceData::from_path(&path)?,
        None => {
            warn!("no reference data supplied; every event will fail prisoner lookup");
            ReferenceData::default()
        }
    };

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let wiring = build_engine(reference, config.policy.clone());
    let notifier = Notifier::new(Arc::new(TracingPublisher), Arc::new(TracingAudit));
    let (processor, _service) = wiring.engine.audited(notifier);
    let processor = Arc::new(processor);

    let app = ops_router()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(err) = consumer::consume(processor, stdin).await {
            error!(error = %err, "event input failed");
        }
    });
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "incentives worker ready");

    axum::serve(listener, app).await?;
    Ok(())
}
