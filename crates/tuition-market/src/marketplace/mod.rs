//! Tuition marketplace core: the tuition and application lifecycles, the hire
//! transition that links them, and the contact disclosure gate.

pub mod applications;
pub mod contact;
pub mod domain;
pub mod error;
pub mod identity;
pub mod payments;
pub mod repository;
pub mod router;
pub mod stats;
pub mod tuitions;
pub mod users;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::config::MarketplaceConfig;

pub use applications::ApplicationLifecycle;
pub use contact::{disclosure_access, ContactGate};
pub use domain::{
    Application, ApplicationDraft, ApplicationId, ApplicationPitch, ApplicationStatus,
    ApplicationWithPost, ContactCard, ProfileUpdate, Role, TuitionDetails, TuitionDetailsPatch,
    TuitionId, TuitionPost, TuitionStatus, TutorCard, TutorProfile, User, UserProfileView,
};
pub use error::MarketplaceError;
pub use identity::{Access, Identity};
pub use payments::{GatewayError, PaymentDesk, PaymentGateway, PaymentIntent, PaymentRequest};
pub use repository::{
    ApplicationQuery, ApplicationRepository, EntityStore, HireRecord, RepositoryError,
    TuitionQuery, TuitionRepository, UserRepository,
};
pub use router::{marketplace_router, IDENTITY_HEADER};
pub use stats::{StatsProjection, StudentStats, TutorStats};
pub use tuitions::TuitionLifecycle;
pub use users::{Registration, RegistrationOutcome, UserDirectory};

/// Every marketplace service wired against one store and one gateway.
pub struct Marketplace<S, G> {
    pub users: UserDirectory<S>,
    pub tuitions: TuitionLifecycle<S>,
    pub applications: ApplicationLifecycle<S>,
    pub contacts: ContactGate<S>,
    pub stats: StatsProjection<S>,
    pub payments: PaymentDesk<G>,
}

impl<S, G> Marketplace<S, G>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, config: &MarketplaceConfig) -> Self {
        let tuitions = TuitionLifecycle::new(Arc::clone(&store), config.latest_limit);
        Self {
            users: UserDirectory::new(Arc::clone(&store)),
            applications: ApplicationLifecycle::new(Arc::clone(&store), tuitions.clone()),
            contacts: ContactGate::new(Arc::clone(&store)),
            stats: StatsProjection::new(store),
            tuitions,
            payments: PaymentDesk::new(gateway, config.payment_currency.clone()),
        }
    }
}
