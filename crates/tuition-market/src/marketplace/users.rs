use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ProfileUpdate, Role, TutorCard, TutorProfile, User, UserProfileView};
use super::error::MarketplaceError;
use super::identity::{require_role, require_self_or_admin, Identity};
use super::repository::{RepositoryError, UserRepository};

/// Self-registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub tutor_profile: Option<TutorProfile>,
}

/// Result of a registration; `created` is false when the email already existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub created: bool,
    pub user: UserProfileView,
}

/// Account directory; also resolves authenticated emails into identities.
pub struct UserDirectory<S> {
    store: Arc<S>,
}

impl<S> Clone for UserDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> UserDirectory<S>
where
    S: UserRepository + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve an authenticated email to its current role.
    pub fn identify(&self, email: &str) -> Result<Identity, MarketplaceError> {
        match self.store.fetch_user(email)? {
            Some(user) => Ok(Identity::new(user.email, user.role)),
            None => Err(MarketplaceError::Unauthorized),
        }
    }

    pub fn register(
        &self,
        authenticated_email: &str,
        registration: Registration,
    ) -> Result<RegistrationOutcome, MarketplaceError> {
        if registration.email != authenticated_email {
            return Err(MarketplaceError::Forbidden(
                "registration email must match the authenticated caller".to_string(),
            ));
        }
        if let Some(existing) = self.store.fetch_user(&registration.email)? {
            return Ok(RegistrationOutcome {
                created: false,
                user: UserProfileView::from(&existing),
            });
        }
        if registration.role == Role::Admin {
            return Err(MarketplaceError::Forbidden(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }
        if registration.name.trim().is_empty() {
            return Err(MarketplaceError::InvalidArgument(
                "name must not be empty".to_string(),
            ));
        }

        let user = User {
            email: registration.email,
            role: registration.role,
            name: registration.name,
            phone: registration.phone,
            address: registration.address,
            photo: registration.photo,
            tutor_profile: registration.tutor_profile,
            created_at: Utc::now(),
            revision: 0,
        };

        match self.store.insert_user(user) {
            Ok(stored) => {
                info!(email = %stored.email, role = %stored.role, "user registered");
                Ok(RegistrationOutcome {
                    created: true,
                    user: UserProfileView::from(&stored),
                })
            }
            // Lost a registration race; the other writer's record stands.
            Err(RepositoryError::Conflict(_)) => {
                let existing = self.fetch(authenticated_email)?;
                Ok(RegistrationOutcome {
                    created: false,
                    user: UserProfileView::from(&existing),
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    pub fn profile(&self, email: &str) -> Result<UserProfileView, MarketplaceError> {
        self.fetch(email).map(|user| UserProfileView::from(&user))
    }

    pub fn update_profile(
        &self,
        caller: &Identity,
        email: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfileView, MarketplaceError> {
        require_self_or_admin(caller, email)?;
        let mut user = self.fetch(email)?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(MarketplaceError::InvalidArgument(
                    "name must not be empty".to_string(),
                ));
            }
            user.name = name;
        }
        if update.phone.is_some() {
            user.phone = update.phone;
        }
        if update.address.is_some() {
            user.address = update.address;
        }
        if update.photo.is_some() {
            user.photo = update.photo;
        }
        let stored = self.store.update_user(user)?;
        Ok(UserProfileView::from(&stored))
    }

    pub fn change_role(
        &self,
        caller: &Identity,
        email: &str,
        role: Role,
    ) -> Result<UserProfileView, MarketplaceError> {
        require_role(caller, Role::Admin)?;
        let mut user = self.fetch(email)?;
        let previous = user.role;
        user.role = role;
        let stored = self.store.update_user(user)?;
        info!(email = %stored.email, from = %previous, to = %role, admin = %caller.email, "role changed");
        Ok(UserProfileView::from(&stored))
    }

    pub fn list_users(&self, caller: &Identity) -> Result<Vec<UserProfileView>, MarketplaceError> {
        require_role(caller, Role::Admin)?;
        Ok(self
            .store
            .list_users(None)?
            .iter()
            .map(UserProfileView::from)
            .collect())
    }

    pub fn list_tutors(&self) -> Result<Vec<TutorCard>, MarketplaceError> {
        Ok(self
            .store
            .list_users(Some(Role::Tutor))?
            .iter()
            .map(TutorCard::from)
            .collect())
    }

    fn fetch(&self, email: &str) -> Result<User, MarketplaceError> {
        self.store
            .fetch_user(email)?
            .ok_or_else(|| MarketplaceError::not_found(format!("user {email}")))
    }
}
