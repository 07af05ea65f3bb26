use super::domain::{ActorRole, ReferralStatus};

/// Answers whether an actor class may ever request the given target status.
///
/// Deliberately independent of workflow position: stateful checks (fees,
/// artifacts, graph edges) belong to the transition engine. Completion is
/// reserved for the payment-verification path, which acts as `System`.
pub fn can_perform(role: ActorRole, target: ReferralStatus) -> bool {
    matches!(
        (role, target),
        (ActorRole::Student, ReferralStatus::ResumeReview)
            | (ActorRole::Mentor, ReferralStatus::ChangesRequested)
            | (ActorRole::Mentor, ReferralStatus::ApprovedForReferral)
            | (ActorRole::Mentor, ReferralStatus::ReferralSent)
            | (ActorRole::Mentor, ReferralStatus::UnderReview)
            | (ActorRole::Mentor, ReferralStatus::ReferralAccepted)
            | (ActorRole::Mentor, ReferralStatus::ReferralRejected)
            | (ActorRole::System, ReferralStatus::PaymentPending)
            | (ActorRole::System, ReferralStatus::Completed)
    )
}
