use crate::cli::ServeArgs;
use crate::infra::{
    AppState, DevPaymentProvider, InMemoryOfferingStore, InMemoryReferralRepository,
    LoggingNotifier,
};
use crate::routes::with_referral_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use referly::config::AppConfig;
use referly::error::AppError;
use referly::telemetry;
use referly::workflows::referrals::{OfferingCatalog, ReferralApi, ReferralService};
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

    let repository = Arc::new(InMemoryReferralRepository::default());
    let provider = Arc::new(DevPaymentProvider::default());
    let notifier = Arc::new(LoggingNotifier::default());
    let referral_service = Arc::new(ReferralService::new(
        repository,
        provider,
        notifier,
        config.payments.currency.clone(),
    ));
    let catalog = Arc::new(OfferingCatalog::new(Arc::new(
        InMemoryOfferingStore::default(),
    )));

    let api = ReferralApi {
        service: referral_service,
        catalog: catalog.clone(),
    };
    let app = with_referral_routes(api, catalog)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "referral lifecycle service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
