use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use referly::workflows::referrals::{
    offering_router, referral_router, OfferingCatalog, OfferingStore, PaymentProvider,
    ReferralApi, ReferralRepository, TransitionNotifier,
};
use serde_json::json;
use std::sync::Arc;

/// Compose the referral and offering routers with service plumbing.
pub(crate) fn with_referral_routes<R, P, N, S>(
    api: ReferralApi<R, P, N, S>,
    catalog: Arc<OfferingCatalog<S>>,
) -> axum::Router
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
    S: OfferingStore + 'static,
{
    referral_router(api)
        .merge(offering_router(catalog))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
