use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::referrals::domain::{
    ActorRole, ArtifactRef, FeeKind, NewReferralRequest, OrderRef, ReferralRequest,
    ReferralRequestId, ReferralStatus, TransitionPayload,
};
use crate::workflows::referrals::offerings::{
    CatalogError, NewOffering, OfferingCatalog, OfferingStore, ReferralOffering,
};
use crate::workflows::referrals::payments::{
    GatewayFailure, OrderMetadata, PaymentOrderOutcome, PaymentProvider, ProviderOrder,
    SignedPaymentPayload,
};
use crate::workflows::referrals::repository::{
    NotifyError, ReferralRepository, RepositoryError, TransitionEvent, TransitionNotifier,
    WriteGuard,
};
use crate::workflows::referrals::router::{referral_router, ReferralApi};
use crate::workflows::referrals::service::ReferralService;
use crate::workflows::referrals::OfferingId;

pub(super) fn artifact(url: &str) -> ArtifactRef {
    ArtifactRef::new(url).expect("non-empty artifact url")
}

pub(super) fn new_request_params() -> NewReferralRequest {
    NewReferralRequest {
        student_id: "stu-401".to_string(),
        mentor_id: "men-077".to_string(),
        offering_id: None,
        company_name: "Nimbus Analytics".to_string(),
        position_name: "Backend Engineer".to_string(),
        job_link: Some("https://jobs.nimbus.example/backend-1187".to_string()),
        resume: artifact("https://files.example/resumes/stu-401-v1.pdf"),
        cover_letter: None,
        initiation_fee_minor: 9_900,
        final_fee_minor: 199_900,
    }
}

/// Raw aggregate positioned at an arbitrary workflow state for engine tests.
pub(super) fn request_at(status: ReferralStatus) -> ReferralRequest {
    let mut request = ReferralRequest::new(
        ReferralRequestId("ref-test-01".to_string()),
        new_request_params(),
        chrono::Utc::now(),
    );
    if status != ReferralStatus::Initiated {
        request.initiation_fee.paid = true;
    }
    request.status = status;
    request
}

pub(super) fn sample_offering_params(mentor_id: &str) -> NewOffering {
    NewOffering {
        mentor_id: mentor_id.to_string(),
        title: "FAANG backend referrals".to_string(),
        description: "Referrals for backend and platform roles.".to_string(),
        companies: ["Nimbus Analytics".to_string(), "Vector Labs".to_string()]
            .into_iter()
            .collect(),
        positions: ["Backend Engineer".to_string()].into_iter().collect(),
        initiation_fee_minor: 9_900,
        final_fee_minor: 199_900,
    }
}

pub(super) type TestService =
    ReferralService<MemoryReferralRepository, FakePaymentProvider, MemoryNotifier>;

pub(super) fn build_service() -> (
    Arc<TestService>,
    Arc<MemoryReferralRepository>,
    Arc<FakePaymentProvider>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(MemoryReferralRepository::default());
    let provider = Arc::new(FakePaymentProvider::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = Arc::new(ReferralService::new(
        repository.clone(),
        provider.clone(),
        notifier.clone(),
        "INR",
    ));
    (service, repository, provider, notifier)
}

pub(super) fn build_catalog() -> (
    Arc<OfferingCatalog<MemoryOfferingStore>>,
    Arc<MemoryOfferingStore>,
) {
    let store = Arc::new(MemoryOfferingStore::default());
    (Arc::new(OfferingCatalog::new(store.clone())), store)
}

pub(super) fn build_router() -> (
    axum::Router,
    Arc<TestService>,
    Arc<OfferingCatalog<MemoryOfferingStore>>,
) {
    let (service, _, _, _) = build_service();
    let (catalog, _) = build_catalog();
    let api = ReferralApi {
        service: service.clone(),
        catalog: catalog.clone(),
    };
    (referral_router(api), service, catalog)
}

/// Drive the stored request's fee through order creation and verification.
pub(super) fn pay_fee(service: &TestService, id: &ReferralRequestId, kind: FeeKind) {
    let outcome = service
        .create_payment_order(id, kind)
        .expect("payment order");
    let PaymentOrderOutcome::Created(order) = outcome else {
        panic!("expected a fresh order for an unpaid fee");
    };
    service
        .apply_payment_verification(id, kind, &FakePaymentProvider::signed(&order.order_ref))
        .expect("verification applies");
}

pub(super) fn to_resume_review(service: &TestService, id: &ReferralRequestId) {
    pay_fee(service, id, FeeKind::Initiation);
    service
        .request_transition(
            id,
            ActorRole::Student,
            ReferralStatus::ResumeReview,
            TransitionPayload::default(),
        )
        .expect("student enters review");
}

pub(super) fn to_referral_sent(service: &TestService, id: &ReferralRequestId) {
    to_resume_review(service, id);
    service
        .request_transition(
            id,
            ActorRole::Mentor,
            ReferralStatus::ApprovedForReferral,
            TransitionPayload {
                feedback: Some("Strong profile, submitting as-is.".to_string()),
                ..TransitionPayload::default()
            },
        )
        .expect("mentor approves");
    service
        .request_transition(
            id,
            ActorRole::Mentor,
            ReferralStatus::ReferralSent,
            TransitionPayload {
                proof: Some(artifact("https://files.example/proofs/referral-401.png")),
                ..TransitionPayload::default()
            },
        )
        .expect("mentor marks sent");
}

#[derive(Default, Clone)]
pub(super) struct MemoryReferralRepository {
    records: Arc<Mutex<HashMap<ReferralRequestId, ReferralRequest>>>,
}

impl ReferralRepository for MemoryReferralRepository {
    fn insert(&self, record: ReferralRequest) -> Result<ReferralRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ReferralRequestId) -> Result<Option<ReferralRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, record: ReferralRequest, guard: WriteGuard) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().expect("repository mutex poisoned");
        let stored = records.get(&record.id).ok_or(RepositoryError::NotFound)?;
        let holds = match guard {
            WriteGuard::StatusIs(expected) => stored.status == expected,
            WriteGuard::FeeUnpaid(kind) => !stored.fee(kind).paid,
        };
        if !holds {
            return Err(RepositoryError::PreconditionFailed);
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    fn list_for_student(&self, student_id: &str) -> Result<Vec<ReferralRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| record.student_id == student_id)
            .cloned()
            .collect())
    }

    fn list_for_mentor(&self, mentor_id: &str) -> Result<Vec<ReferralRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| record.mentor_id == mentor_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct FakePaymentProvider {
    sequence: AtomicU64,
    created: Mutex<Vec<(ProviderOrder, OrderMetadata)>>,
}

impl FakePaymentProvider {
    pub(super) fn signature_for(order_ref: &str, payment_ref: &str) -> String {
        format!("sig::{order_ref}::{payment_ref}")
    }

    /// A payload the fake provider will accept for the given order.
    pub(super) fn signed(order_ref: &OrderRef) -> SignedPaymentPayload {
        let payment_ref = format!("pay-{}", order_ref.0);
        SignedPaymentPayload {
            signature: Self::signature_for(&order_ref.0, &payment_ref),
            order_ref: order_ref.clone(),
            payment_ref,
        }
    }

    pub(super) fn created_orders(&self) -> Vec<(ProviderOrder, OrderMetadata)> {
        self.created.lock().expect("provider mutex poisoned").clone()
    }
}

impl PaymentProvider for FakePaymentProvider {
    fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        metadata: OrderMetadata,
    ) -> Result<ProviderOrder, GatewayFailure> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let order = ProviderOrder {
            order_ref: OrderRef(format!("order-{id:04}")),
            amount_minor,
            currency: currency.to_string(),
        };
        self.created
            .lock()
            .expect("provider mutex poisoned")
            .push((order.clone(), metadata));
        Ok(order)
    }

    fn verify_signature(&self, payload: &SignedPaymentPayload) -> bool {
        payload.signature == Self::signature_for(&payload.order_ref.0, &payload.payment_ref)
    }
}

/// Provider whose gateway is down.
pub(super) struct UnreachableProvider;

impl PaymentProvider for UnreachableProvider {
    fn create_order(
        &self,
        _amount_minor: u64,
        _currency: &str,
        _metadata: OrderMetadata,
    ) -> Result<ProviderOrder, GatewayFailure> {
        Err(GatewayFailure("connection timed out".to_string()))
    }

    fn verify_signature(&self, _payload: &SignedPaymentPayload) -> bool {
        false
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<TransitionEvent>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| event.to == ReferralStatus::Completed)
            .count()
    }
}

impl TransitionNotifier for MemoryNotifier {
    fn notify(&self, event: TransitionEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

/// Notifier whose transport always fails; commands must still succeed.
pub(super) struct DeadLetterNotifier;

impl TransitionNotifier for DeadLetterNotifier {
    fn notify(&self, _event: TransitionEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryOfferingStore {
    offerings: Arc<Mutex<HashMap<OfferingId, ReferralOffering>>>,
}

impl OfferingStore for MemoryOfferingStore {
    fn insert(&self, offering: ReferralOffering) -> Result<ReferralOffering, CatalogError> {
        let mut guard = self.offerings.lock().expect("catalog mutex poisoned");
        if guard.contains_key(&offering.id) {
            return Err(CatalogError::Conflict);
        }
        guard.insert(offering.id.clone(), offering.clone());
        Ok(offering)
    }

    fn fetch(&self, id: &OfferingId) -> Result<Option<ReferralOffering>, CatalogError> {
        let guard = self.offerings.lock().expect("catalog mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, offering: ReferralOffering) -> Result<(), CatalogError> {
        let mut guard = self.offerings.lock().expect("catalog mutex poisoned");
        if !guard.contains_key(&offering.id) {
            return Err(CatalogError::NotFound);
        }
        guard.insert(offering.id.clone(), offering);
        Ok(())
    }

    fn set_active(&self, id: &OfferingId, active: bool) -> Result<(), CatalogError> {
        let mut guard = self.offerings.lock().expect("catalog mutex poisoned");
        let offering = guard.get_mut(id).ok_or(CatalogError::NotFound)?;
        offering.is_active = active;
        Ok(())
    }

    fn increment_success(&self, id: &OfferingId) -> Result<(), CatalogError> {
        let mut guard = self.offerings.lock().expect("catalog mutex poisoned");
        let offering = guard.get_mut(id).ok_or(CatalogError::NotFound)?;
        offering.referral_success_count += 1;
        Ok(())
    }

    fn delete(&self, id: &OfferingId) -> Result<(), CatalogError> {
        let mut guard = self.offerings.lock().expect("catalog mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(CatalogError::NotFound)
    }

    fn list(&self) -> Result<Vec<ReferralOffering>, CatalogError> {
        let guard = self.offerings.lock().expect("catalog mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
