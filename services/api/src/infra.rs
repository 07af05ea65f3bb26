use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use referly::workflows::referrals::{
    ArtifactRef, ArtifactStore, CatalogError, GatewayFailure, NotifyError, OfferingId,
    OfferingStore, OrderMetadata, OrderRef, PaymentProvider, ProviderOrder, ReferralOffering,
    ReferralRepository, ReferralRequest, ReferralRequestId, RepositoryError, SignedPaymentPayload,
    TransitionEvent, TransitionNotifier, UploadError, WriteGuard,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryReferralRepository {
    records: Arc<Mutex<HashMap<ReferralRequestId, ReferralRequest>>>,
}

impl ReferralRepository for InMemoryReferralRepository {
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryOfferingStore {
    offerings: Arc<Mutex<HashMap<OfferingId, ReferralOffering>>>,
}

impl OfferingStore for InMemoryOfferingStore {
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

/// Notifier that records events and mirrors them to the log. A production
/// deployment would swap in the e-mail/in-app transport here.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier {
    events: Arc<Mutex<Vec<TransitionEvent>>>,
}

impl LoggingNotifier {
    pub(crate) fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl TransitionNotifier for LoggingNotifier {
    fn notify(&self, event: TransitionEvent) -> Result<(), NotifyError> {
        info!(
            request = %event.request_id.0,
            from = %event.from,
            to = %event.to,
            actor = %event.actor,
            "transition notification"
        );
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

/// Development payment provider: issues sequential order references and
/// accepts payloads signed with `dev_signature`.
#[derive(Default)]
pub(crate) struct DevPaymentProvider {
    sequence: AtomicU64,
}

impl DevPaymentProvider {
    pub(crate) fn dev_signature(order_ref: &str, payment_ref: &str) -> String {
        format!("dev::{order_ref}::{payment_ref}")
    }

    /// Payload the dev provider will accept for the given order.
    pub(crate) fn signed(order_ref: &OrderRef) -> SignedPaymentPayload {
        let payment_ref = format!("pay-{}", order_ref.0);
        SignedPaymentPayload {
            signature: Self::dev_signature(&order_ref.0, &payment_ref),
            order_ref: order_ref.clone(),
            payment_ref,
        }
    }
}

impl PaymentProvider for DevPaymentProvider {
    fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        metadata: OrderMetadata,
    ) -> Result<ProviderOrder, GatewayFailure> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        info!(
            request = %metadata.request_id,
            fee = %metadata.fee,
            amount_minor,
            "dev payment order created"
        );
        Ok(ProviderOrder {
            order_ref: OrderRef(format!("dev-order-{id:04}")),
            amount_minor,
            currency: currency.to_string(),
        })
    }

    fn verify_signature(&self, payload: &SignedPaymentPayload) -> bool {
        payload.signature == Self::dev_signature(&payload.order_ref.0, &payload.payment_ref)
    }
}

/// Artifact store keeping uploads in memory and handing back opaque refs.
#[derive(Default, Clone)]
pub(crate) struct InMemoryArtifactStore {
    uploads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl ArtifactStore for InMemoryArtifactStore {
    fn upload(
        &self,
        bytes: &[u8],
        content_type: &mime::Mime,
        path_hint: &str,
    ) -> Result<ArtifactRef, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Rejected {
                path_hint: path_hint.to_string(),
                reason: "empty upload".to_string(),
            });
        }

        let location = format!("mem://artifacts/{path_hint}");
        self.uploads
            .lock()
            .expect("artifact mutex poisoned")
            .insert(location.clone(), bytes.to_vec());

        ArtifactRef::new(format!("{location}?type={content_type}")).ok_or_else(|| {
            UploadError::Rejected {
                path_hint: path_hint.to_string(),
                reason: "blank reference".to_string(),
            }
        })
    }
}
