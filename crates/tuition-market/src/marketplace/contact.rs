//! Contact disclosure gate.
//!
//! Private contact fields are released only across a confirmed hire: the
//! student sees the tutor they paid for, the tutor sees the student who paid.

use std::sync::Arc;

use super::domain::{ApplicationStatus, ContactCard, Role, TuitionStatus};
use super::error::MarketplaceError;
use super::identity::{Access, Identity};
use super::repository::{
    ApplicationQuery, ApplicationRepository, RepositoryError, TuitionQuery, TuitionRepository,
    UserRepository,
};

pub struct ContactGate<S> {
    store: Arc<S>,
}

impl<S> Clone for ContactGate<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> ContactGate<S>
where
    S: UserRepository + TuitionRepository + ApplicationRepository + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Look up `target_email`'s contact card on behalf of `requester`.
    /// An unknown target is `NotFound`; a known one without a hire is `Forbidden`.
    pub fn contact(
        &self,
        requester: &Identity,
        target_email: &str,
    ) -> Result<ContactCard, MarketplaceError> {
        let target = self
            .store
            .fetch_user(target_email)?
            .ok_or_else(|| MarketplaceError::not_found(format!("contact {target_email}")))?;

        disclosure_access(self.store.as_ref(), requester, target_email)?
            .or_forbid("no confirmed hire links the caller to this contact")?;
        Ok(ContactCard::from(&target))
    }
}

/// Read-only predicate over the hire state of both lifecycles.
pub fn disclosure_access<S>(
    store: &S,
    requester: &Identity,
    target_email: &str,
) -> Result<Access, RepositoryError>
where
    S: TuitionRepository + ApplicationRepository + ?Sized,
{
    let allowed = match requester.role {
        Role::Admin => true,
        Role::Student => !store
            .find_posts(&TuitionQuery {
                student_email: Some(requester.email.clone()),
                hired_tutor_email: Some(target_email.to_string()),
                status: Some(TuitionStatus::Paid),
                limit: Some(1),
            })?
            .is_empty(),
        Role::Tutor => !store
            .find_applications(&ApplicationQuery {
                tutor_email: Some(requester.email.clone()),
                student_email: Some(target_email.to_string()),
                status: Some(ApplicationStatus::PaidConfirmed),
                limit: Some(1),
                ..ApplicationQuery::default()
            })?
            .is_empty(),
    };
    Ok(Access::from_bool(allowed))
}
