use super::common::*;
use crate::workflows::referrals::domain::{ActorRole, ReferralStatus, TransitionPayload};
use crate::workflows::referrals::transitions::{
    PreconditionFailure, StatusTransitionEngine, TransitionError, TRANSITIONS,
};

fn evaluate(
    status: ReferralStatus,
    role: ActorRole,
    target: ReferralStatus,
    payload: TransitionPayload,
) -> Result<crate::workflows::referrals::transitions::TransitionPlan, TransitionError> {
    StatusTransitionEngine::evaluate(&request_at(status), role, target, &payload)
}

#[test]
fn rejects_edges_missing_from_the_table() {
    let attempts = [
        (
            ReferralStatus::Initiated,
            ActorRole::Mentor,
            ReferralStatus::ApprovedForReferral,
        ),
        (
            ReferralStatus::ResumeReview,
            ActorRole::Mentor,
            ReferralStatus::ReferralSent,
        ),
        (
            ReferralStatus::ApprovedForReferral,
            ActorRole::Mentor,
            ReferralStatus::ReferralAccepted,
        ),
        (
            ReferralStatus::PaymentPending,
            ActorRole::System,
            ReferralStatus::PaymentPending,
        ),
    ];

    for (from, role, to) in attempts {
        match evaluate(from, role, to, TransitionPayload::default()) {
            Err(TransitionError::InvalidTransition { .. }) => {}
            other => panic!("expected invalid transition for {from} -> {to}, got {other:?}"),
        }
    }
}

#[test]
fn terminal_and_reserved_states_have_no_outgoing_edges() {
    for rule in TRANSITIONS {
        assert!(
            !rule.from.is_terminal(),
            "terminal state {} must not have outgoing edges",
            rule.from
        );
        assert_ne!(
            rule.from,
            ReferralStatus::UnderReview,
            "under_review is reserved and has no outgoing edges"
        );
    }
}

#[test]
fn leaving_initiated_requires_paid_initiation_fee() {
    let mut request = request_at(ReferralStatus::Initiated);
    request.initiation_fee.paid = false;

    match StatusTransitionEngine::evaluate(
        &request,
        ActorRole::Student,
        ReferralStatus::ResumeReview,
        &TransitionPayload::default(),
    ) {
        Err(TransitionError::Precondition(PreconditionFailure::InitiationFeeUnpaid)) => {}
        other => panic!("expected unpaid initiation fee, got {other:?}"),
    }

    request.initiation_fee.paid = true;
    let plan = StatusTransitionEngine::evaluate(
        &request,
        ActorRole::Student,
        ReferralStatus::ResumeReview,
        &TransitionPayload::default(),
    )
    .expect("paid fee unlocks review");
    assert_eq!(plan.to, ReferralStatus::ResumeReview);
}

#[test]
fn requesting_changes_requires_non_empty_notes() {
    for notes in [None, Some("".to_string()), Some("   ".to_string())] {
        let payload = TransitionPayload {
            changes_requested: notes,
            ..TransitionPayload::default()
        };
        match evaluate(
            ReferralStatus::ResumeReview,
            ActorRole::Mentor,
            ReferralStatus::ChangesRequested,
            payload,
        ) {
            Err(TransitionError::Precondition(PreconditionFailure::MissingChangeNotes)) => {}
            other => panic!("expected missing change notes, got {other:?}"),
        }
    }

    let plan = evaluate(
        ReferralStatus::ResumeReview,
        ActorRole::Mentor,
        ReferralStatus::ChangesRequested,
        TransitionPayload {
            changes_requested: Some("Add metrics to the impact bullets".to_string()),
            ..TransitionPayload::default()
        },
    )
    .expect("notes satisfy the precondition");
    assert_eq!(
        plan.effects.changes_requested.as_deref(),
        Some("Add metrics to the impact bullets")
    );
}

#[test]
fn resubmission_requires_updated_resume_and_clears_notes() {
    let mut request = request_at(ReferralStatus::ChangesRequested);
    request.changes_requested = Some("Add metrics".to_string());

    match StatusTransitionEngine::evaluate(
        &request,
        ActorRole::Student,
        ReferralStatus::ResumeReview,
        &TransitionPayload::default(),
    ) {
        Err(TransitionError::Precondition(PreconditionFailure::MissingUpdatedResume)) => {}
        other => panic!("expected missing updated resume, got {other:?}"),
    }

    let updated_resume = artifact("https://files.example/resumes/stu-401-v2.pdf");
    let plan = StatusTransitionEngine::evaluate(
        &request,
        ActorRole::Student,
        ReferralStatus::ResumeReview,
        &TransitionPayload {
            resume: Some(updated_resume.clone()),
            ..TransitionPayload::default()
        },
    )
    .expect("updated resume unlocks resubmission");

    let applied = plan.apply(&request, chrono::Utc::now());
    assert_eq!(applied.status, ReferralStatus::ResumeReview);
    assert_eq!(applied.resume, updated_resume);
    assert_eq!(applied.changes_requested, None);
}

#[test]
fn marking_sent_requires_proof_and_final_fee_amount() {
    let request = request_at(ReferralStatus::ApprovedForReferral);

    match StatusTransitionEngine::evaluate(
        &request,
        ActorRole::Mentor,
        ReferralStatus::ReferralSent,
        &TransitionPayload::default(),
    ) {
        Err(TransitionError::Precondition(PreconditionFailure::MissingReferralProof)) => {}
        other => panic!("expected missing referral proof, got {other:?}"),
    }

    // A zero amount in the payload cannot satisfy the fee requirement.
    match StatusTransitionEngine::evaluate(
        &request,
        ActorRole::Mentor,
        ReferralStatus::ReferralSent,
        &TransitionPayload {
            proof: Some(artifact("https://files.example/proofs/referral-401.png")),
            fee_amount_minor: Some(0),
            ..TransitionPayload::default()
        },
    ) {
        Err(TransitionError::Precondition(PreconditionFailure::MissingFinalFeeAmount)) => {}
        other => panic!("expected missing final fee amount, got {other:?}"),
    }

    let mut unfunded = request.clone();
    unfunded.final_fee.amount_minor = 0;
    match StatusTransitionEngine::evaluate(
        &unfunded,
        ActorRole::Mentor,
        ReferralStatus::ReferralSent,
        &TransitionPayload {
            proof: Some(artifact("https://files.example/proofs/referral-401.png")),
            ..TransitionPayload::default()
        },
    ) {
        Err(TransitionError::Precondition(PreconditionFailure::MissingFinalFeeAmount)) => {}
        other => panic!("expected missing final fee amount, got {other:?}"),
    }

    let plan = StatusTransitionEngine::evaluate(
        &unfunded,
        ActorRole::Mentor,
        ReferralStatus::ReferralSent,
        &TransitionPayload {
            proof: Some(artifact("https://files.example/proofs/referral-401.png")),
            fee_amount_minor: Some(249_900),
            ..TransitionPayload::default()
        },
    )
    .expect("proof and amount satisfy the preconditions");

    let applied = plan.apply(&unfunded, chrono::Utc::now());
    assert_eq!(applied.status, ReferralStatus::ReferralSent);
    assert_eq!(applied.final_fee.amount_minor, 249_900);
    assert!(applied.referral_proof.is_some());
}

#[test]
fn recording_decision_requires_proof() {
    for target in [
        ReferralStatus::ReferralAccepted,
        ReferralStatus::ReferralRejected,
    ] {
        match evaluate(
            ReferralStatus::ReferralSent,
            ActorRole::Mentor,
            target,
            TransitionPayload::default(),
        ) {
            Err(TransitionError::Precondition(PreconditionFailure::MissingDecisionProof)) => {}
            other => panic!("expected missing decision proof for {target}, got {other:?}"),
        }
    }

    let plan = evaluate(
        ReferralStatus::ReferralSent,
        ActorRole::Mentor,
        ReferralStatus::ReferralAccepted,
        TransitionPayload {
            proof: Some(artifact("https://files.example/proofs/offer-401.png")),
            ..TransitionPayload::default()
        },
    )
    .expect("proof satisfies the decision precondition");
    assert!(plan.effects.acceptance_proof.is_some());
}

#[test]
fn completion_requires_paid_final_fee() {
    let mut request = request_at(ReferralStatus::PaymentPending);
    request.final_fee.paid = false;

    match StatusTransitionEngine::evaluate(
        &request,
        ActorRole::System,
        ReferralStatus::Completed,
        &TransitionPayload::default(),
    ) {
        Err(TransitionError::Precondition(PreconditionFailure::FinalFeeUnpaid)) => {}
        other => panic!("expected unpaid final fee, got {other:?}"),
    }

    request.final_fee.paid = true;
    let plan = StatusTransitionEngine::evaluate(
        &request,
        ActorRole::System,
        ReferralStatus::Completed,
        &TransitionPayload::default(),
    )
    .expect("paid final fee unlocks completion");
    assert_eq!(plan.to, ReferralStatus::Completed);
}

#[test]
fn payment_pending_auto_step_requires_unpaid_final_fee() {
    let mut request = request_at(ReferralStatus::ReferralAccepted);
    request.final_fee.paid = true;

    match StatusTransitionEngine::evaluate(
        &request,
        ActorRole::System,
        ReferralStatus::PaymentPending,
        &TransitionPayload::default(),
    ) {
        Err(TransitionError::Precondition(PreconditionFailure::FinalFeeAlreadySettled)) => {}
        other => panic!("expected settled final fee rejection, got {other:?}"),
    }
}

#[test]
fn apply_appends_timeline_and_bumps_updated_at() {
    let request = request_at(ReferralStatus::ResumeReview);
    let at = chrono::Utc::now() + chrono::Duration::minutes(5);

    let plan = StatusTransitionEngine::evaluate(
        &request,
        ActorRole::Mentor,
        ReferralStatus::ChangesRequested,
        &TransitionPayload {
            changes_requested: Some("Trim to one page".to_string()),
            ..TransitionPayload::default()
        },
    )
    .expect("plan builds");

    let applied = plan.apply(&request, at);
    assert_eq!(applied.updated_at, at);
    assert_eq!(applied.timeline.len(), request.timeline.len() + 1);

    let entry = applied.timeline.last().expect("timeline entry appended");
    assert_eq!(entry.from, ReferralStatus::ResumeReview);
    assert_eq!(entry.to, ReferralStatus::ChangesRequested);
    assert_eq!(entry.actor, ActorRole::Mentor);
    assert_eq!(entry.note.as_deref(), Some("Trim to one page"));
}
