//! Referral request lifecycle: status graph, payment gating, proof
//! requirements, and role authorization.
//!
//! The engine is deliberately small and pure; every mutation of a stored
//! request goes through a conditional write so racing callers (a browser
//! payment callback and the provider webhook, or two users acting at once)
//! converge on a single consistent state.

pub mod authorization;
pub mod domain;
pub mod offerings;
pub mod payments;
pub mod repository;
pub mod router;
pub mod service;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use domain::{
    ActorRole, ArtifactRef, DocumentUpdate, FeeKind, FeeRecord, NewReferralRequest, OfferingId,
    OrderRef, ReferralRequest, ReferralRequestId, ReferralRequestView, ReferralStatus,
    TimelineEntry, TransitionPayload,
};
pub use offerings::{
    offering_router, CatalogError, NewOffering, OfferingCatalog, OfferingFilter, OfferingStore,
    OfferingUpdate, ReferralOffering,
};
pub use payments::{
    GatewayFailure, OrderMetadata, PaymentError, PaymentGate, PaymentOrderOutcome,
    PaymentProvider, ProviderOrder, SignedPaymentPayload,
};
pub use repository::{
    ArtifactStore, NotifyError, ReferralRepository, RepositoryError, TransitionEvent,
    TransitionNotifier, UploadError, WriteGuard,
};
pub use router::{referral_router, ReferralApi};
pub use service::{ReferralService, ReferralServiceError, VerificationOutcome};
pub use transitions::{
    PreconditionFailure, StatusTransitionEngine, TransitionError, TransitionPlan, TRANSITIONS,
};
