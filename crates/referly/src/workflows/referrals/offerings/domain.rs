use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::workflows::referrals::domain::OfferingId;

/// A mentor-published catalog entry: which companies and positions the
/// mentor can refer for, with the default fees for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralOffering {
    pub id: OfferingId,
    pub mentor_id: String,
    pub title: String,
    pub description: String,
    pub companies: BTreeSet<String>,
    pub positions: BTreeSet<String>,
    pub initiation_fee_minor: u64,
    pub final_fee_minor: u64,
    pub is_active: bool,
    pub referral_success_count: u64,
}

#[derive(Debug, Clone)]
pub struct NewOffering {
    pub mentor_id: String,
    pub title: String,
    pub description: String,
    pub companies: BTreeSet<String>,
    pub positions: BTreeSet<String>,
    pub initiation_fee_minor: u64,
    pub final_fee_minor: u64,
}

/// Partial edit of the mutable fields. Activation is deliberately not here;
/// it has its own atomic toggle.
#[derive(Debug, Clone, Default)]
pub struct OfferingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub companies: Option<BTreeSet<String>>,
    pub positions: Option<BTreeSet<String>>,
    pub initiation_fee_minor: Option<u64>,
    pub final_fee_minor: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct OfferingFilter {
    pub mentor_id: Option<String>,
    /// Case-insensitive match against the companies an offering covers.
    pub company: Option<String>,
    pub active_only: bool,
}

impl OfferingFilter {
    pub fn matches(&self, offering: &ReferralOffering) -> bool {
        if self.active_only && !offering.is_active {
            return false;
        }
        if let Some(mentor_id) = &self.mentor_id {
            if offering.mentor_id != *mentor_id {
                return false;
            }
        }
        if let Some(company) = &self.company {
            let needle = company.to_ascii_lowercase();
            if !offering
                .companies
                .iter()
                .any(|candidate| candidate.to_ascii_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }
}
