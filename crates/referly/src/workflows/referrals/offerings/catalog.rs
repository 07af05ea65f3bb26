use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use super::domain::{NewOffering, OfferingFilter, OfferingUpdate, ReferralOffering};
use crate::workflows::referrals::domain::OfferingId;

/// Storage abstraction for the offering catalog.
///
/// `set_active` and `increment_success` are single-field operations so the
/// catalog can toggle or count without rewriting the full record.
pub trait OfferingStore: Send + Sync {
    fn insert(&self, offering: ReferralOffering) -> Result<ReferralOffering, CatalogError>;
    fn fetch(&self, id: &OfferingId) -> Result<Option<ReferralOffering>, CatalogError>;
    fn update(&self, offering: ReferralOffering) -> Result<(), CatalogError>;
    fn set_active(&self, id: &OfferingId, active: bool) -> Result<(), CatalogError>;
    fn increment_success(&self, id: &OfferingId) -> Result<(), CatalogError>;
    fn delete(&self, id: &OfferingId) -> Result<(), CatalogError>;
    fn list(&self) -> Result<Vec<ReferralOffering>, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("offering already exists")]
    Conflict,
    #[error("offering not found")]
    NotFound,
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

static OFFERING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_offering_id() -> OfferingId {
    let id = OFFERING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    OfferingId(format!("off-{id:06}"))
}

/// Mentor-facing CRUD over referral offerings.
///
/// Deleting an offering never cascades: existing requests snapshot their
/// fee amounts at creation and keep them.
pub struct OfferingCatalog<S> {
    store: Arc<S>,
}

impl<S: OfferingStore> OfferingCatalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create(&self, params: NewOffering) -> Result<ReferralOffering, CatalogError> {
        let offering = ReferralOffering {
            id: next_offering_id(),
            mentor_id: params.mentor_id,
            title: params.title,
            description: params.description,
            companies: params.companies,
            positions: params.positions,
            initiation_fee_minor: params.initiation_fee_minor,
            final_fee_minor: params.final_fee_minor,
            is_active: true,
            referral_success_count: 0,
        };
        let stored = self.store.insert(offering)?;
        info!(offering = %stored.id.0, mentor = %stored.mentor_id, "offering published");
        Ok(stored)
    }

    pub fn get(&self, id: &OfferingId) -> Result<ReferralOffering, CatalogError> {
        self.store.fetch(id)?.ok_or(CatalogError::NotFound)
    }

    pub fn update(
        &self,
        id: &OfferingId,
        update: OfferingUpdate,
    ) -> Result<ReferralOffering, CatalogError> {
        let mut offering = self.get(id)?;
        if let Some(title) = update.title {
            offering.title = title;
        }
        if let Some(description) = update.description {
            offering.description = description;
        }
        if let Some(companies) = update.companies {
            offering.companies = companies;
        }
        if let Some(positions) = update.positions {
            offering.positions = positions;
        }
        if let Some(amount) = update.initiation_fee_minor {
            offering.initiation_fee_minor = amount;
        }
        if let Some(amount) = update.final_fee_minor {
            offering.final_fee_minor = amount;
        }
        self.store.update(offering.clone())?;
        Ok(offering)
    }

    /// Toggle visibility without resending the record.
    pub fn set_active(&self, id: &OfferingId, active: bool) -> Result<(), CatalogError> {
        self.store.set_active(id, active)
    }

    /// Bump the success counter when a request created from this offering
    /// completes. Tolerates a deleted offering: requests outlive the
    /// catalog entry they were created from.
    pub fn record_success(&self, id: &OfferingId) -> Result<(), CatalogError> {
        match self.store.increment_success(id) {
            Ok(()) => Ok(()),
            Err(CatalogError::NotFound) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// Hard delete; no effect on requests created from the offering.
    pub fn delete(&self, id: &OfferingId) -> Result<(), CatalogError> {
        self.store.delete(id)?;
        info!(offering = %id.0, "offering deleted");
        Ok(())
    }

    pub fn list(&self, filter: &OfferingFilter) -> Result<Vec<ReferralOffering>, CatalogError> {
        let mut offerings: Vec<ReferralOffering> = self
            .store
            .list()?
            .into_iter()
            .filter(|offering| filter.matches(offering))
            .collect();
        offerings.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(offerings)
    }
}
