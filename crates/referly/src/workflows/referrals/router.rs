use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ActorRole, ArtifactRef, DocumentUpdate, FeeKind, NewReferralRequest, OfferingId,
    ReferralRequestId, ReferralStatus, TransitionPayload,
};
use super::offerings::{CatalogError, OfferingCatalog, OfferingStore};
use super::payments::{PaymentError, PaymentOrderOutcome, PaymentProvider, SignedPaymentPayload};
use super::repository::{ReferralRepository, RepositoryError, TransitionNotifier};
use super::service::{ReferralService, ReferralServiceError};
use super::transitions::TransitionError;

/// Shared handler state: the lifecycle service plus the catalog consulted
/// for default fee amounts at creation time.
pub struct ReferralApi<R, P, N, S> {
    pub service: Arc<ReferralService<R, P, N>>,
    pub catalog: Arc<OfferingCatalog<S>>,
}

impl<R, P, N, S> Clone for ReferralApi<R, P, N, S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

/// Router builder exposing the referral command and query surface.
pub fn referral_router<R, P, N, S>(api: ReferralApi<R, P, N, S>) -> Router
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
    S: OfferingStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/referrals",
            get(list_handler::<R, P, N, S>).post(create_handler::<R, P, N, S>),
        )
        .route(
            "/api/v1/referrals/:request_id",
            get(get_handler::<R, P, N, S>),
        )
        .route(
            "/api/v1/referrals/:request_id/transition",
            post(transition_handler::<R, P, N, S>),
        )
        .route(
            "/api/v1/referrals/:request_id/documents",
            put(documents_handler::<R, P, N, S>),
        )
        .route(
            "/api/v1/referrals/:request_id/payments/:fee/order",
            post(payment_order_handler::<R, P, N, S>),
        )
        .route(
            "/api/v1/referrals/:request_id/payments/:fee/verify",
            post(payment_verify_handler::<R, P, N, S>),
        )
        .with_state(api)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateReferralBody {
    student_id: String,
    mentor_id: String,
    offering_id: Option<String>,
    company_name: String,
    position_name: String,
    job_link: Option<String>,
    resume_url: String,
    cover_letter_url: Option<String>,
    initiation_fee_minor: Option<u64>,
    final_fee_minor: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionBody {
    actor: ActorRole,
    target: ReferralStatus,
    feedback: Option<String>,
    changes_requested: Option<String>,
    proof_url: Option<String>,
    fee_amount_minor: Option<u64>,
    resume_url: Option<String>,
    cover_letter_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentsBody {
    resume_url: Option<String>,
    cover_letter_url: Option<String>,
    position_name: Option<String>,
    job_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    student_id: Option<String>,
    mentor_id: Option<String>,
}

pub(crate) async fn create_handler<R, P, N, S>(
    State(api): State<ReferralApi<R, P, N, S>>,
    axum::Json(body): axum::Json<CreateReferralBody>,
) -> Response
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
    S: OfferingStore + 'static,
{
    let Some(resume) = ArtifactRef::new(body.resume_url) else {
        return unprocessable("resume_url must not be empty");
    };

    // Fee amounts are snapshotted now: either copied from the offering or
    // supplied explicitly. Later catalog edits never touch this request.
    let (initiation_fee_minor, final_fee_minor, offering_id) = match body.offering_id {
        Some(raw) => {
            let offering_id = OfferingId(raw);
            let offering = match api.catalog.get(&offering_id) {
                Ok(offering) => offering,
                Err(CatalogError::NotFound) => {
                    return unprocessable("offering does not exist");
                }
                Err(error) => {
                    let payload = json!({ "error": error.to_string() });
                    return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload))
                        .into_response();
                }
            };
            if !offering.is_active {
                return unprocessable("offering is not accepting new requests");
            }
            (
                body.initiation_fee_minor
                    .unwrap_or(offering.initiation_fee_minor),
                body.final_fee_minor.unwrap_or(offering.final_fee_minor),
                Some(offering.id),
            )
        }
        None => match (body.initiation_fee_minor, body.final_fee_minor) {
            (Some(initiation), Some(fee)) => (initiation, fee, None),
            _ => return unprocessable("fee amounts are required without an offering"),
        },
    };

    let params = NewReferralRequest {
        student_id: body.student_id,
        mentor_id: body.mentor_id,
        offering_id,
        company_name: body.company_name,
        position_name: body.position_name,
        job_link: body.job_link,
        resume,
        cover_letter: body.cover_letter_url.and_then(ArtifactRef::new),
        initiation_fee_minor,
        final_fee_minor,
    };

    match api.service.create_request(params) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record.view())).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn get_handler<R, P, N, S>(
    State(api): State<ReferralApi<R, P, N, S>>,
    Path(request_id): Path<String>,
) -> Response
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
    S: OfferingStore + 'static,
{
    match api.service.get(&ReferralRequestId(request_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn list_handler<R, P, N, S>(
    State(api): State<ReferralApi<R, P, N, S>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
    S: OfferingStore + 'static,
{
    let result = match (&query.student_id, &query.mentor_id) {
        (Some(student_id), None) => api.service.list_for_student(student_id),
        (None, Some(mentor_id)) => api.service.list_for_mentor(mentor_id),
        _ => return unprocessable("exactly one of student_id or mentor_id is required"),
    };

    match result {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn transition_handler<R, P, N, S>(
    State(api): State<ReferralApi<R, P, N, S>>,
    Path(request_id): Path<String>,
    axum::Json(body): axum::Json<TransitionBody>,
) -> Response
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
    S: OfferingStore + 'static,
{
    // System transitions (payment completion, the payment-pending
    // auto-step) are applied internally and never accepted over HTTP.
    if body.actor == ActorRole::System {
        let payload = json!({ "error": "system transitions are applied internally" });
        return (StatusCode::FORBIDDEN, axum::Json(payload)).into_response();
    }

    let payload = TransitionPayload {
        feedback: body.feedback,
        changes_requested: body.changes_requested,
        proof: body.proof_url.and_then(ArtifactRef::new),
        fee_amount_minor: body.fee_amount_minor,
        resume: body.resume_url.and_then(ArtifactRef::new),
        cover_letter: body.cover_letter_url.and_then(ArtifactRef::new),
    };

    match api.service.request_transition(
        &ReferralRequestId(request_id),
        body.actor,
        body.target,
        payload,
    ) {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn documents_handler<R, P, N, S>(
    State(api): State<ReferralApi<R, P, N, S>>,
    Path(request_id): Path<String>,
    axum::Json(body): axum::Json<DocumentsBody>,
) -> Response
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
    S: OfferingStore + 'static,
{
    let update = DocumentUpdate {
        resume: body.resume_url.and_then(ArtifactRef::new),
        cover_letter: body.cover_letter_url.and_then(ArtifactRef::new),
        position_name: body.position_name,
        job_link: body.job_link,
    };

    match api
        .service
        .update_documents(&ReferralRequestId(request_id), update)
    {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn payment_order_handler<R, P, N, S>(
    State(api): State<ReferralApi<R, P, N, S>>,
    Path((request_id, fee)): Path<(String, String)>,
) -> Response
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
    S: OfferingStore + 'static,
{
    let Some(kind) = FeeKind::parse(&fee) else {
        return unprocessable("fee must be 'initiation' or 'final'");
    };

    match api
        .service
        .create_payment_order(&ReferralRequestId(request_id), kind)
    {
        Ok(PaymentOrderOutcome::AlreadyPaid) => {
            let payload = json!({ "fee": kind.label(), "state": "already_paid" });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(PaymentOrderOutcome::Created(order)) => {
            let payload = json!({
                "fee": kind.label(),
                "state": "order_created",
                "order_ref": order.order_ref.0,
                "amount_minor": order.amount_minor,
                "currency": order.currency,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn payment_verify_handler<R, P, N, S>(
    State(api): State<ReferralApi<R, P, N, S>>,
    Path((request_id, fee)): Path<(String, String)>,
    axum::Json(payload): axum::Json<SignedPaymentPayload>,
) -> Response
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
    S: OfferingStore + 'static,
{
    let Some(kind) = FeeKind::parse(&fee) else {
        return unprocessable("fee must be 'initiation' or 'final'");
    };

    match api
        .service
        .apply_payment_verification(&ReferralRequestId(request_id), kind, &payload)
    {
        Ok(outcome) => {
            // A completed request counts toward the offering it came from.
            if outcome.status == ReferralStatus::Completed && !outcome.already_settled {
                if let Some(offering_id) = &outcome.offering_id {
                    if let Err(error) = api.catalog.record_success(offering_id) {
                        tracing::warn!(
                            offering = %offering_id.0,
                            error = %error,
                            "failed to record referral success"
                        );
                    }
                }
            }
            (StatusCode::OK, axum::Json(outcome)).into_response()
        }
        Err(error) => service_error_response(&error),
    }
}

fn unprocessable(message: &str) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
}

fn service_error_response(error: &ReferralServiceError) -> Response {
    let status = match error {
        ReferralServiceError::Transition(TransitionError::InvalidTransition { .. }) => {
            StatusCode::CONFLICT
        }
        ReferralServiceError::Transition(TransitionError::NotAuthorized { .. }) => {
            StatusCode::FORBIDDEN
        }
        ReferralServiceError::Transition(TransitionError::Precondition(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ReferralServiceError::Payment(PaymentError::Verification { .. })
        | ReferralServiceError::Payment(PaymentError::UnknownOrder { .. }) => {
            StatusCode::BAD_REQUEST
        }
        ReferralServiceError::Payment(PaymentError::Gateway(_)) => StatusCode::BAD_GATEWAY,
        ReferralServiceError::NotFound => StatusCode::NOT_FOUND,
        ReferralServiceError::ConcurrentModification => StatusCode::CONFLICT,
        ReferralServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ReferralServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
