use chrono::{DateTime, Utc};

use super::authorization;
use super::domain::{
    ActorRole, ArtifactRef, ReferralRequest, ReferralStatus, TimelineEntry, TransitionPayload,
};

/// Errors raised while deciding a transition. Nothing here mutates state.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("no transition from {from} to {to}")]
    InvalidTransition {
        from: ReferralStatus,
        to: ReferralStatus,
    },
    #[error("{role} is not allowed to request {to}")]
    NotAuthorized { role: ActorRole, to: ReferralStatus },
    #[error(transparent)]
    Precondition(#[from] PreconditionFailure),
}

/// A reachable transition blocked by a missing fee, artifact, or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionFailure {
    #[error("initiation fee has not been paid")]
    InitiationFeeUnpaid,
    #[error("final fee has not been paid")]
    FinalFeeUnpaid,
    #[error("final fee is already settled")]
    FinalFeeAlreadySettled,
    #[error("final fee is not due before the referral is sent")]
    FinalFeeNotDue,
    #[error("change notes are required when requesting changes")]
    MissingChangeNotes,
    #[error("an updated resume is required to resubmit for review")]
    MissingUpdatedResume,
    #[error("referral proof is required to mark the referral as sent")]
    MissingReferralProof,
    #[error("a final fee amount must be set before the referral is sent")]
    MissingFinalFeeAmount,
    #[error("decision proof is required to record the company decision")]
    MissingDecisionProof,
    #[error("documents can only be updated before review starts or while changes are requested")]
    DocumentsLocked,
}

/// One row of the canonical status graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: ReferralStatus,
    pub to: ReferralStatus,
    pub actor: ActorRole,
}

const fn rule(from: ReferralStatus, to: ReferralStatus, actor: ActorRole) -> TransitionRule {
    TransitionRule { from, to, actor }
}

/// The only edges a referral request may ever follow. Both role views and
/// every mutation path consume this single table.
///
/// `UnderReview` is reserved: reachable from `ReferralSent`, no outgoing
/// edges. `PaymentPending -> Completed` closes the loop opened by the
/// automatic `ReferralAccepted -> PaymentPending` step.
pub const TRANSITIONS: &[TransitionRule] = &[
    rule(
        ReferralStatus::Initiated,
        ReferralStatus::ResumeReview,
        ActorRole::Student,
    ),
    rule(
        ReferralStatus::ResumeReview,
        ReferralStatus::ChangesRequested,
        ActorRole::Mentor,
    ),
    rule(
        ReferralStatus::ResumeReview,
        ReferralStatus::ApprovedForReferral,
        ActorRole::Mentor,
    ),
    rule(
        ReferralStatus::ChangesRequested,
        ReferralStatus::ResumeReview,
        ActorRole::Student,
    ),
    rule(
        ReferralStatus::ApprovedForReferral,
        ReferralStatus::ReferralSent,
        ActorRole::Mentor,
    ),
    rule(
        ReferralStatus::ReferralSent,
        ReferralStatus::UnderReview,
        ActorRole::Mentor,
    ),
    rule(
        ReferralStatus::ReferralSent,
        ReferralStatus::ReferralAccepted,
        ActorRole::Mentor,
    ),
    rule(
        ReferralStatus::ReferralSent,
        ReferralStatus::ReferralRejected,
        ActorRole::Mentor,
    ),
    rule(
        ReferralStatus::ReferralAccepted,
        ReferralStatus::PaymentPending,
        ActorRole::System,
    ),
    rule(
        ReferralStatus::ReferralSent,
        ReferralStatus::Completed,
        ActorRole::System,
    ),
    rule(
        ReferralStatus::ReferralAccepted,
        ReferralStatus::Completed,
        ActorRole::System,
    ),
    rule(
        ReferralStatus::PaymentPending,
        ReferralStatus::Completed,
        ActorRole::System,
    ),
];

/// Field mutations carried by an approved plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionEffects {
    pub mentor_feedback: Option<String>,
    pub changes_requested: Option<String>,
    pub clear_changes_requested: bool,
    pub resume: Option<ArtifactRef>,
    pub cover_letter: Option<ArtifactRef>,
    pub referral_proof: Option<ArtifactRef>,
    pub acceptance_proof: Option<ArtifactRef>,
    pub final_fee_amount_minor: Option<u64>,
}

/// The validated outcome of a transition decision.
///
/// Applying a plan is a pure construction; the caller owns the conditional
/// write keyed on `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub from: ReferralStatus,
    pub to: ReferralStatus,
    pub actor: ActorRole,
    pub effects: TransitionEffects,
}

impl TransitionPlan {
    /// Produce the updated aggregate: new status, field effects, bumped
    /// `updated_at`, appended timeline entry.
    pub fn apply(&self, request: &ReferralRequest, at: DateTime<Utc>) -> ReferralRequest {
        let mut updated = request.clone();
        updated.status = self.to;

        if let Some(feedback) = &self.effects.mentor_feedback {
            updated.mentor_feedback = Some(feedback.clone());
        }
        if let Some(notes) = &self.effects.changes_requested {
            updated.changes_requested = Some(notes.clone());
        }
        if self.effects.clear_changes_requested {
            updated.changes_requested = None;
        }
        if let Some(resume) = &self.effects.resume {
            updated.resume = resume.clone();
        }
        if let Some(cover_letter) = &self.effects.cover_letter {
            updated.cover_letter = Some(cover_letter.clone());
        }
        if let Some(proof) = &self.effects.referral_proof {
            updated.referral_proof = Some(proof.clone());
        }
        if let Some(proof) = &self.effects.acceptance_proof {
            updated.acceptance_proof = Some(proof.clone());
        }
        if let Some(amount) = self.effects.final_fee_amount_minor {
            updated.final_fee.amount_minor = amount;
        }

        updated.updated_at = at;
        updated.timeline.push(TimelineEntry {
            at,
            actor: self.actor,
            from: self.from,
            to: self.to,
            note: self
                .effects
                .changes_requested
                .clone()
                .or_else(|| self.effects.mentor_feedback.clone()),
        });

        updated
    }
}

/// The state machine. A pure decision function over the current aggregate,
/// the requesting role, the target status, and the supplied payload.
pub struct StatusTransitionEngine;

impl StatusTransitionEngine {
    pub fn evaluate(
        request: &ReferralRequest,
        role: ActorRole,
        target: ReferralStatus,
        payload: &TransitionPayload,
    ) -> Result<TransitionPlan, TransitionError> {
        if !authorization::can_perform(role, target) {
            return Err(TransitionError::NotAuthorized { role, to: target });
        }

        let rule = TRANSITIONS
            .iter()
            .find(|rule| rule.from == request.status && rule.to == target)
            .ok_or(TransitionError::InvalidTransition {
                from: request.status,
                to: target,
            })?;

        let effects = Self::check_preconditions(rule, request, payload)?;

        Ok(TransitionPlan {
            from: rule.from,
            to: rule.to,
            actor: rule.actor,
            effects,
        })
    }

    fn check_preconditions(
        rule: &TransitionRule,
        request: &ReferralRequest,
        payload: &TransitionPayload,
    ) -> Result<TransitionEffects, PreconditionFailure> {
        let mut effects = TransitionEffects::default();

        match (rule.from, rule.to) {
            (ReferralStatus::Initiated, ReferralStatus::ResumeReview) => {
                if !request.initiation_fee.paid {
                    return Err(PreconditionFailure::InitiationFeeUnpaid);
                }
            }
            (ReferralStatus::ChangesRequested, ReferralStatus::ResumeReview) => {
                let resume = payload
                    .resume
                    .clone()
                    .ok_or(PreconditionFailure::MissingUpdatedResume)?;
                effects.resume = Some(resume);
                effects.cover_letter = payload.cover_letter.clone();
                effects.clear_changes_requested = true;
            }
            (ReferralStatus::ResumeReview, ReferralStatus::ChangesRequested) => {
                let notes = non_empty(payload.changes_requested.as_deref())
                    .ok_or(PreconditionFailure::MissingChangeNotes)?;
                effects.changes_requested = Some(notes);
            }
            (ReferralStatus::ResumeReview, ReferralStatus::ApprovedForReferral) => {
                effects.mentor_feedback = non_empty(payload.feedback.as_deref());
            }
            (ReferralStatus::ApprovedForReferral, ReferralStatus::ReferralSent) => {
                let proof = payload
                    .proof
                    .clone()
                    .ok_or(PreconditionFailure::MissingReferralProof)?;
                match payload.fee_amount_minor {
                    Some(0) => return Err(PreconditionFailure::MissingFinalFeeAmount),
                    Some(amount) => effects.final_fee_amount_minor = Some(amount),
                    None if request.final_fee.amount_minor == 0 => {
                        return Err(PreconditionFailure::MissingFinalFeeAmount);
                    }
                    None => {}
                }
                effects.referral_proof = Some(proof);
            }
            (ReferralStatus::ReferralSent, ReferralStatus::UnderReview) => {}
            (ReferralStatus::ReferralSent, ReferralStatus::ReferralAccepted)
            | (ReferralStatus::ReferralSent, ReferralStatus::ReferralRejected) => {
                let proof = payload
                    .proof
                    .clone()
                    .ok_or(PreconditionFailure::MissingDecisionProof)?;
                effects.acceptance_proof = Some(proof);
            }
            (ReferralStatus::ReferralAccepted, ReferralStatus::PaymentPending) => {
                if request.final_fee.paid {
                    return Err(PreconditionFailure::FinalFeeAlreadySettled);
                }
            }
            (_, ReferralStatus::Completed) => {
                if !request.final_fee.paid {
                    return Err(PreconditionFailure::FinalFeeUnpaid);
                }
            }
            // every row of TRANSITIONS is matched above
            _ => {}
        }

        Ok(effects)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
