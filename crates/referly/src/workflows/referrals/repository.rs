use serde::Serialize;

use super::domain::{
    ActorRole, ArtifactRef, FeeKind, ReferralRequest, ReferralRequestId, ReferralStatus,
};

/// Precondition attached to a conditional write.
///
/// Every mutation of a stored request is keyed on the expected prior state;
/// a stale expectation fails the write instead of clobbering a concurrent
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteGuard {
    /// Apply only while the stored status still matches.
    StatusIs(ReferralStatus),
    /// Apply only while the given fee is still unpaid.
    FeeUnpaid(FeeKind),
}

/// Storage abstraction so the service can be exercised in isolation.
pub trait ReferralRepository: Send + Sync {
    fn insert(&self, record: ReferralRequest) -> Result<ReferralRequest, RepositoryError>;
    fn fetch(&self, id: &ReferralRequestId) -> Result<Option<ReferralRequest>, RepositoryError>;
    /// Conditional update: persists `record` only while `guard` holds
    /// against the stored copy, otherwise fails with `PreconditionFailed`.
    fn update(&self, record: ReferralRequest, guard: WriteGuard) -> Result<(), RepositoryError>;
    fn list_for_student(&self, student_id: &str) -> Result<Vec<ReferralRequest>, RepositoryError>;
    fn list_for_mentor(&self, mentor_id: &str) -> Result<Vec<ReferralRequest>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stored record no longer satisfies the write precondition")]
    PreconditionFailed,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Event emitted after a transition has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionEvent {
    pub request_id: ReferralRequestId,
    pub from: ReferralStatus,
    pub to: ReferralStatus,
    pub actor: ActorRole,
}

/// Outbound notification hook (e-mail, in-app, etc.). Fire-and-forget:
/// delivery failures never fail the command that produced the event.
pub trait TransitionNotifier: Send + Sync {
    fn notify(&self, event: TransitionEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// External document storage boundary. The engine stores references and
/// never reads or deletes artifact content.
pub trait ArtifactStore: Send + Sync {
    fn upload(
        &self,
        bytes: &[u8],
        content_type: &mime::Mime,
        path_hint: &str,
    ) -> Result<ArtifactRef, UploadError>;
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("artifact store rejected {path_hint}: {reason}")]
    Rejected { path_hint: String, reason: String },
    #[error("artifact store unavailable: {0}")]
    Unavailable(String),
}
