use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    ActorRole, DocumentUpdate, FeeKind, NewReferralRequest, OfferingId, ReferralRequest,
    ReferralRequestId, ReferralStatus, TransitionPayload,
};
use super::payments::{
    PaymentError, PaymentGate, PaymentOrderOutcome, PaymentProvider, SignedPaymentPayload,
};
use super::repository::{
    ReferralRepository, RepositoryError, TransitionEvent, TransitionNotifier, WriteGuard,
};
use super::transitions::{PreconditionFailure, StatusTransitionEngine, TransitionError};

/// Command and query facade over the referral lifecycle.
///
/// Orchestration order is fixed: authorize, evaluate, conditional write,
/// timeline, notify. Provider calls always happen before the write so a
/// slow gateway never holds the aggregate hostage.
pub struct ReferralService<R, P, N> {
    repository: Arc<R>,
    gate: PaymentGate<P>,
    notifier: Arc<N>,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> ReferralRequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ReferralRequestId(format!("ref-{id:06}"))
}

/// Error raised by the referral service.
#[derive(Debug, thiserror::Error)]
pub enum ReferralServiceError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error("referral request not found")]
    NotFound,
    #[error("the request changed underneath this operation; refresh and retry")]
    ConcurrentModification,
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ReferralServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::PreconditionFailed => Self::ConcurrentModification,
            other => Self::Repository(other),
        }
    }
}

/// Result of applying a verified payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub request_id: ReferralRequestId,
    pub fee: FeeKind,
    pub status: ReferralStatus,
    /// True when a concurrent verifier (callback vs. webhook) already
    /// applied this payment; the call is still a success.
    pub already_settled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offering_id: Option<OfferingId>,
}

impl<R, P, N> ReferralService<R, P, N>
where
    R: ReferralRepository + 'static,
    P: PaymentProvider + 'static,
    N: TransitionNotifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        provider: Arc<P>,
        notifier: Arc<N>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            gate: PaymentGate::new(provider, currency),
            notifier,
        }
    }

    /// Open a new request in `Initiated` with both fees snapshotted.
    pub fn create_request(
        &self,
        params: NewReferralRequest,
    ) -> Result<ReferralRequest, ReferralServiceError> {
        let record = ReferralRequest::new(next_request_id(), params, Utc::now());
        let stored = self.repository.insert(record)?;
        info!(
            request = %stored.id.0,
            mentor = %stored.mentor_id,
            company = %stored.company_name,
            "referral request created"
        );
        Ok(stored)
    }

    /// Drive the request along one edge of the status graph.
    pub fn request_transition(
        &self,
        id: &ReferralRequestId,
        role: ActorRole,
        target: ReferralStatus,
        payload: TransitionPayload,
    ) -> Result<ReferralRequest, ReferralServiceError> {
        let current = self.fetch_required(id)?;
        let plan = StatusTransitionEngine::evaluate(&current, role, target, &payload)?;
        let updated = plan.apply(&current, Utc::now());

        self.repository
            .update(updated.clone(), WriteGuard::StatusIs(plan.from))?;

        info!(request = %id.0, from = %plan.from, to = %plan.to, actor = %role, "transition applied");
        self.publish(TransitionEvent {
            request_id: updated.id.clone(),
            from: plan.from,
            to: plan.to,
            actor: plan.actor,
        });

        // Accepted requests with an outstanding final fee immediately await
        // payment; the auto-step is a system transition of its own.
        if updated.status == ReferralStatus::ReferralAccepted && !updated.final_fee.paid {
            return self.advance_to_payment_pending(updated);
        }

        Ok(updated)
    }

    fn advance_to_payment_pending(
        &self,
        request: ReferralRequest,
    ) -> Result<ReferralRequest, ReferralServiceError> {
        let plan = StatusTransitionEngine::evaluate(
            &request,
            ActorRole::System,
            ReferralStatus::PaymentPending,
            &TransitionPayload::default(),
        )?;
        let advanced = plan.apply(&request, Utc::now());

        match self
            .repository
            .update(advanced.clone(), WriteGuard::StatusIs(plan.from))
        {
            Ok(()) => {
                self.publish(TransitionEvent {
                    request_id: advanced.id.clone(),
                    from: plan.from,
                    to: plan.to,
                    actor: ActorRole::System,
                });
                Ok(advanced)
            }
            // A payment verification landed between the two writes and
            // completed the request; report whatever is stored now.
            Err(RepositoryError::PreconditionFailed) => self.fetch_required(&request.id),
            Err(other) => Err(other.into()),
        }
    }

    /// Replace student documents while the request is still editable.
    pub fn update_documents(
        &self,
        id: &ReferralRequestId,
        update: DocumentUpdate,
    ) -> Result<ReferralRequest, ReferralServiceError> {
        let current = self.fetch_required(id)?;
        if !current.documents_editable() {
            return Err(TransitionError::Precondition(PreconditionFailure::DocumentsLocked).into());
        }

        let mut updated = current.clone();
        if let Some(resume) = update.resume {
            updated.resume = resume;
        }
        if let Some(cover_letter) = update.cover_letter {
            updated.cover_letter = Some(cover_letter);
        }
        if let Some(position_name) = update.position_name {
            updated.position_name = position_name;
        }
        if let Some(job_link) = update.job_link {
            updated.job_link = Some(job_link);
        }
        updated.updated_at = Utc::now();

        self.repository
            .update(updated.clone(), WriteGuard::StatusIs(current.status))?;
        Ok(updated)
    }

    /// Ask the payment gate for an order covering the given fee.
    pub fn create_payment_order(
        &self,
        id: &ReferralRequestId,
        kind: FeeKind,
    ) -> Result<PaymentOrderOutcome, ReferralServiceError> {
        let current = self.fetch_required(id)?;
        if kind == FeeKind::Final
            && !current.final_fee.paid
            && !current.status.final_fee_payable()
        {
            return Err(TransitionError::Precondition(PreconditionFailure::FinalFeeNotDue).into());
        }

        let outcome = self.gate.create_order(&current, kind)?;

        if let PaymentOrderOutcome::Created(order) = &outcome {
            let mut updated = current;
            updated.fee_mut(kind).order_ref = Some(order.order_ref.clone());
            updated.updated_at = Utc::now();

            match self.repository.update(updated, WriteGuard::FeeUnpaid(kind)) {
                Ok(()) => {}
                // A verification raced us and settled the fee; the fresh
                // order is abandoned rather than overwriting a paid record.
                Err(RepositoryError::PreconditionFailed) => {
                    return Ok(PaymentOrderOutcome::AlreadyPaid)
                }
                Err(other) => return Err(other.into()),
            }
        }

        Ok(outcome)
    }

    /// Apply a signed provider payload to the given fee.
    ///
    /// Safe to invoke from both the client callback and the webhook: the
    /// write is guarded on the fee still being unpaid, and a lost race is
    /// reported as an already-settled success without re-notifying.
    pub fn apply_payment_verification(
        &self,
        id: &ReferralRequestId,
        kind: FeeKind,
        payload: &SignedPaymentPayload,
    ) -> Result<VerificationOutcome, ReferralServiceError> {
        let current = self.fetch_required(id)?;
        if current.fee(kind).paid {
            return Ok(Self::settled_outcome(&current, kind));
        }
        if kind == FeeKind::Final && !current.status.final_fee_payable() {
            return Err(TransitionError::Precondition(PreconditionFailure::FinalFeeNotDue).into());
        }

        self.gate.verify(&current, kind, payload)?;

        let mut updated = current.clone();
        updated.fee_mut(kind).paid = true;
        updated.updated_at = Utc::now();

        // Settling the final fee finishes the workflow in the same write
        // wherever completion is defined; `UnderReview` keeps its status.
        let mut completion = None;
        if kind == FeeKind::Final
            && matches!(
                current.status,
                ReferralStatus::ReferralSent
                    | ReferralStatus::ReferralAccepted
                    | ReferralStatus::PaymentPending
            )
        {
            let plan = StatusTransitionEngine::evaluate(
                &updated,
                ActorRole::System,
                ReferralStatus::Completed,
                &TransitionPayload::default(),
            )?;
            updated = plan.apply(&updated, Utc::now());
            completion = Some(plan);
        }

        match self
            .repository
            .update(updated.clone(), WriteGuard::FeeUnpaid(kind))
        {
            Ok(()) => {}
            Err(RepositoryError::PreconditionFailed) => {
                // The concurrent verifier won; its write already carried any
                // status advance and notification.
                let stored = self.fetch_required(id)?;
                return Ok(Self::settled_outcome(&stored, kind));
            }
            Err(other) => return Err(other.into()),
        }

        info!(request = %id.0, fee = %kind, "payment verified and applied");
        if let Some(plan) = completion {
            self.publish(TransitionEvent {
                request_id: updated.id.clone(),
                from: plan.from,
                to: plan.to,
                actor: ActorRole::System,
            });
        }

        Ok(VerificationOutcome {
            request_id: updated.id.clone(),
            fee: kind,
            status: updated.status,
            already_settled: false,
            offering_id: updated.offering_id.clone(),
        })
    }

    pub fn get(&self, id: &ReferralRequestId) -> Result<ReferralRequest, ReferralServiceError> {
        self.fetch_required(id)
    }

    pub fn list_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<ReferralRequest>, ReferralServiceError> {
        Ok(self.repository.list_for_student(student_id)?)
    }

    pub fn list_for_mentor(
        &self,
        mentor_id: &str,
    ) -> Result<Vec<ReferralRequest>, ReferralServiceError> {
        Ok(self.repository.list_for_mentor(mentor_id)?)
    }

    fn fetch_required(
        &self,
        id: &ReferralRequestId,
    ) -> Result<ReferralRequest, ReferralServiceError> {
        self.repository
            .fetch(id)?
            .ok_or(ReferralServiceError::NotFound)
    }

    fn settled_outcome(request: &ReferralRequest, kind: FeeKind) -> VerificationOutcome {
        VerificationOutcome {
            request_id: request.id.clone(),
            fee: kind,
            status: request.status,
            already_settled: true,
            offering_id: request.offering_id.clone(),
        }
    }

    fn publish(&self, event: TransitionEvent) {
        if let Err(err) = self.notifier.notify(event.clone()) {
            warn!(
                request = %event.request_id.0,
                to = %event.to,
                error = %err,
                "transition notification dropped"
            );
        }
    }
}
