//! Mentor-managed catalog of referral offerings.
//!
//! Decoupled from the lifecycle engine: offerings supply default fee
//! amounts when a request is created, and requests keep their snapshot
//! afterwards regardless of catalog edits or deletes.

pub mod catalog;
pub mod domain;
pub mod router;

pub use catalog::{CatalogError, OfferingCatalog, OfferingStore};
pub use domain::{NewOffering, OfferingFilter, OfferingUpdate, ReferralOffering};
pub use router::offering_router;
