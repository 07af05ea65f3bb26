use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for referral requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferralRequestId(pub String);

/// Identifier wrapper for catalog offerings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferingId(pub String);

/// Opaque reference to an externally stored document.
///
/// The lifecycle engine records and requires presence; content is never
/// inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Wrap an upload location, rejecting blank values.
    pub fn new(url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            None
        } else {
            Some(Self(url))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Actor classes recognised by the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Student,
    Mentor,
    System,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Student => "student",
            ActorRole::Mentor => "mentor",
            ActorRole::System => "system",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Workflow position of a referral request; the single source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Initiated,
    ResumeReview,
    ChangesRequested,
    ApprovedForReferral,
    ReferralSent,
    UnderReview,
    ReferralAccepted,
    ReferralRejected,
    PaymentPending,
    Completed,
}

impl ReferralStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReferralStatus::Initiated => "initiated",
            ReferralStatus::ResumeReview => "resume_review",
            ReferralStatus::ChangesRequested => "changes_requested",
            ReferralStatus::ApprovedForReferral => "approved_for_referral",
            ReferralStatus::ReferralSent => "referral_sent",
            ReferralStatus::UnderReview => "under_review",
            ReferralStatus::ReferralAccepted => "referral_accepted",
            ReferralStatus::ReferralRejected => "referral_rejected",
            ReferralStatus::PaymentPending => "payment_pending",
            ReferralStatus::Completed => "completed",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            ReferralStatus::Initiated => "Initiated",
            ReferralStatus::ResumeReview => "Resume review",
            ReferralStatus::ChangesRequested => "Changes requested",
            ReferralStatus::ApprovedForReferral => "Approved for referral",
            ReferralStatus::ReferralSent => "Referral sent",
            ReferralStatus::UnderReview => "Under review",
            ReferralStatus::ReferralAccepted => "Referral accepted",
            ReferralStatus::ReferralRejected => "Referral rejected",
            ReferralStatus::PaymentPending => "Payment pending",
            ReferralStatus::Completed => "Completed",
        }
    }

    /// Canonical status-to-badge mapping consumed by every view surface.
    pub const fn badge_color(self) -> &'static str {
        match self {
            ReferralStatus::Initiated => "gray",
            ReferralStatus::ResumeReview | ReferralStatus::UnderReview => "blue",
            ReferralStatus::ChangesRequested => "amber",
            ReferralStatus::ApprovedForReferral | ReferralStatus::ReferralSent => "indigo",
            ReferralStatus::ReferralAccepted => "green",
            ReferralStatus::ReferralRejected => "red",
            ReferralStatus::PaymentPending => "orange",
            ReferralStatus::Completed => "emerald",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ReferralStatus::Completed | ReferralStatus::ReferralRejected
        )
    }

    /// Whether the final fee may be settled at this point in the workflow.
    pub const fn final_fee_payable(self) -> bool {
        matches!(
            self,
            ReferralStatus::ReferralSent
                | ReferralStatus::UnderReview
                | ReferralStatus::ReferralAccepted
                | ReferralStatus::PaymentPending
        )
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two payment obligations attached to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Initiation,
    Final,
}

impl FeeKind {
    pub const fn label(self) -> &'static str {
        match self {
            FeeKind::Initiation => "initiation",
            FeeKind::Final => "final",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "initiation" => Some(Self::Initiation),
            "final" => Some(Self::Final),
            _ => None,
        }
    }
}

impl fmt::Display for FeeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Provider-issued opaque order identifier stored on a fee record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderRef(pub String);

/// One fee obligation. Amounts are integer minor-currency units (paise);
/// fee handling never touches floating point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRecord {
    pub amount_minor: u64,
    pub paid: bool,
    pub order_ref: Option<OrderRef>,
}

impl FeeRecord {
    pub fn unpaid(amount_minor: u64) -> Self {
        Self {
            amount_minor,
            paid: false,
            order_ref: None,
        }
    }
}

/// Audit metadata appended on every applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub at: DateTime<Utc>,
    pub actor: ActorRole,
    pub from: ReferralStatus,
    pub to: ReferralStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Aggregate root for one student's referral application to one mentor.
///
/// All mutation flows through the transition engine and the payment gate;
/// callers persist the result under a conditional write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRequest {
    pub id: ReferralRequestId,
    pub student_id: String,
    pub mentor_id: String,
    /// Provenance only; fee amounts are snapshotted at creation.
    pub offering_id: Option<OfferingId>,
    pub company_name: String,
    pub position_name: String,
    pub job_link: Option<String>,
    pub resume: ArtifactRef,
    pub cover_letter: Option<ArtifactRef>,
    pub mentor_feedback: Option<String>,
    pub changes_requested: Option<String>,
    pub referral_proof: Option<ArtifactRef>,
    pub acceptance_proof: Option<ArtifactRef>,
    pub initiation_fee: FeeRecord,
    pub final_fee: FeeRecord,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub timeline: Vec<TimelineEntry>,
}

impl ReferralRequest {
    pub fn new(id: ReferralRequestId, params: NewReferralRequest, at: DateTime<Utc>) -> Self {
        Self {
            id,
            student_id: params.student_id,
            mentor_id: params.mentor_id,
            offering_id: params.offering_id,
            company_name: params.company_name,
            position_name: params.position_name,
            job_link: params.job_link,
            resume: params.resume,
            cover_letter: params.cover_letter,
            mentor_feedback: None,
            changes_requested: None,
            referral_proof: None,
            acceptance_proof: None,
            initiation_fee: FeeRecord::unpaid(params.initiation_fee_minor),
            final_fee: FeeRecord::unpaid(params.final_fee_minor),
            status: ReferralStatus::Initiated,
            created_at: at,
            updated_at: at,
            timeline: Vec::new(),
        }
    }

    pub fn fee(&self, kind: FeeKind) -> &FeeRecord {
        match kind {
            FeeKind::Initiation => &self.initiation_fee,
            FeeKind::Final => &self.final_fee,
        }
    }

    pub fn fee_mut(&mut self, kind: FeeKind) -> &mut FeeRecord {
        match kind {
            FeeKind::Initiation => &mut self.initiation_fee,
            FeeKind::Final => &mut self.final_fee,
        }
    }

    /// Documents stay editable until the mentor starts (or restarts) review.
    pub fn documents_editable(&self) -> bool {
        matches!(
            self.status,
            ReferralStatus::Initiated | ReferralStatus::ChangesRequested
        )
    }

    pub fn view(&self) -> ReferralRequestView {
        ReferralRequestView {
            id: self.id.clone(),
            student_id: self.student_id.clone(),
            mentor_id: self.mentor_id.clone(),
            company_name: self.company_name.clone(),
            position_name: self.position_name.clone(),
            job_link: self.job_link.clone(),
            status: self.status.label(),
            status_title: self.status.title(),
            badge_color: self.status.badge_color(),
            initiation_fee: FeeView::from(&self.initiation_fee),
            final_fee: FeeView::from(&self.final_fee),
            mentor_feedback: self.mentor_feedback.clone(),
            changes_requested: self.changes_requested.clone(),
            timeline: self.timeline.iter().map(TimelineEntryView::from).collect(),
            updated_at: self.updated_at,
        }
    }
}

/// Creation parameters; fee amounts arrive already snapshotted from the
/// offering (or supplied explicitly).
#[derive(Debug, Clone)]
pub struct NewReferralRequest {
    pub student_id: String,
    pub mentor_id: String,
    pub offering_id: Option<OfferingId>,
    pub company_name: String,
    pub position_name: String,
    pub job_link: Option<String>,
    pub resume: ArtifactRef,
    pub cover_letter: Option<ArtifactRef>,
    pub initiation_fee_minor: u64,
    pub final_fee_minor: u64,
}

/// Free-form inputs accompanying a transition request.
#[derive(Debug, Clone, Default)]
pub struct TransitionPayload {
    pub feedback: Option<String>,
    pub changes_requested: Option<String>,
    pub proof: Option<ArtifactRef>,
    pub fee_amount_minor: Option<u64>,
    pub resume: Option<ArtifactRef>,
    pub cover_letter: Option<ArtifactRef>,
}

/// Partial document update, valid only while the request is editable.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub resume: Option<ArtifactRef>,
    pub cover_letter: Option<ArtifactRef>,
    pub position_name: Option<String>,
    pub job_link: Option<String>,
}

/// Sanitized representation served to both student and mentor views.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralRequestView {
    pub id: ReferralRequestId,
    pub student_id: String,
    pub mentor_id: String,
    pub company_name: String,
    pub position_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_link: Option<String>,
    pub status: &'static str,
    pub status_title: &'static str,
    pub badge_color: &'static str,
    pub initiation_fee: FeeView,
    pub final_fee: FeeView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes_requested: Option<String>,
    pub timeline: Vec<TimelineEntryView>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeView {
    pub amount_minor: u64,
    pub paid: bool,
}

impl From<&FeeRecord> for FeeView {
    fn from(record: &FeeRecord) -> Self {
        Self {
            amount_minor: record.amount_minor,
            paid: record.paid,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntryView {
    pub at: DateTime<Utc>,
    pub actor: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<&TimelineEntry> for TimelineEntryView {
    fn from(entry: &TimelineEntry) -> Self {
        Self {
            at: entry.at,
            actor: entry.actor.label(),
            from: entry.from.label(),
            to: entry.to.label(),
            note: entry.note.clone(),
        }
    }
}
