use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tuition_market::marketplace::{
    Application, ApplicationId, ApplicationQuery, ApplicationRepository, GatewayError, HireRecord,
    PaymentGateway, PaymentIntent, RepositoryError, Role, TuitionId, TuitionPost, TuitionQuery,
    TuitionRepository, TuitionStatus, User, UserRepository,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    posts: HashMap<TuitionId, TuitionPost>,
    applications: HashMap<ApplicationId, Application>,
}

/// Process-local store. A single lock guards all three tables so every
/// conditional write is evaluated and applied in one step.
#[derive(Default, Clone)]
pub(crate) struct InMemoryEntityStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryEntityStore {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("entity store lock poisoned".to_string()))
    }
}

impl UserRepository for InMemoryEntityStore {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.users.contains_key(&user.email) {
            return Err(RepositoryError::Conflict(format!(
                "user {} already exists",
                user.email
            )));
        }
        guard.users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    fn fetch_user(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock()?.users.get(email).cloned())
    }

    fn update_user(&self, mut user: User) -> Result<User, RepositoryError> {
        let mut guard = self.lock()?;
        let slot = guard
            .users
            .get_mut(&user.email)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", user.email)))?;
        if slot.revision != user.revision {
            return Err(RepositoryError::Conflict(format!(
                "user {} changed concurrently",
                user.email
            )));
        }
        user.revision += 1;
        *slot = user.clone();
        Ok(user)
    }

    fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, RepositoryError> {
        let guard = self.lock()?;
        let mut users: Vec<User> = guard
            .users
            .values()
            .filter(|user| role.map_or(true, |role| user.role == role))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }
}

impl TuitionRepository for InMemoryEntityStore {
    fn insert_post(&self, post: TuitionPost) -> Result<TuitionPost, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.posts.contains_key(&post.id) {
            return Err(RepositoryError::Conflict(format!(
                "tuition {} already exists",
                post.id
            )));
        }
        guard.posts.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    fn fetch_post(&self, id: &TuitionId) -> Result<Option<TuitionPost>, RepositoryError> {
        Ok(self.lock()?.posts.get(id).cloned())
    }

    fn update_post(&self, mut post: TuitionPost) -> Result<TuitionPost, RepositoryError> {
        let mut guard = self.lock()?;
        let slot = guard
            .posts
            .get_mut(&post.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("tuition {}", post.id)))?;
        if slot.revision != post.revision {
            return Err(RepositoryError::Conflict(format!(
                "tuition {} changed concurrently",
                post.id
            )));
        }
        post.revision += 1;
        *slot = post.clone();
        Ok(post)
    }

    fn mark_hired(
        &self,
        id: &TuitionId,
        tutor_email: &str,
        at: DateTime<Utc>,
    ) -> Result<HireRecord, RepositoryError> {
        let mut guard = self.lock()?;
        let slot = guard
            .posts
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("tuition {id}")))?;
        if slot.is_hired() {
            return Err(RepositoryError::Conflict(format!(
                "tuition {id} already has a hired tutor"
            )));
        }
        let replaced_status = slot.status;
        slot.status = TuitionStatus::Paid;
        slot.hired_tutor_email = Some(tutor_email.to_string());
        slot.updated_at = at;
        slot.revision += 1;
        Ok(HireRecord {
            post: slot.clone(),
            replaced_status,
        })
    }

    fn delete_post(&self, id: &TuitionId) -> Result<(), RepositoryError> {
        self.lock()?
            .posts
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("tuition {id}")))
    }

    fn find_posts(&self, query: &TuitionQuery) -> Result<Vec<TuitionPost>, RepositoryError> {
        let guard = self.lock()?;
        let mut posts: Vec<TuitionPost> = guard
            .posts
            .values()
            .filter(|post| query.matches(post))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = query.limit {
            posts.truncate(limit);
        }
        Ok(posts)
    }
}

impl ApplicationRepository for InMemoryEntityStore {
    fn insert_application(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict(format!(
                "application {} already exists",
                application.id
            )));
        }
        guard
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self.lock()?.applications.get(id).cloned())
    }

    fn update_application(
        &self,
        mut application: Application,
    ) -> Result<Application, RepositoryError> {
        let mut guard = self.lock()?;
        let slot = guard
            .applications
            .get_mut(&application.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("application {}", application.id)))?;
        if slot.revision != application.revision {
            return Err(RepositoryError::Conflict(format!(
                "application {} changed concurrently",
                application.id
            )));
        }
        application.revision += 1;
        *slot = application.clone();
        Ok(application)
    }

    fn find_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Vec<Application>, RepositoryError> {
        let guard = self.lock()?;
        let mut applications: Vec<Application> = guard
            .applications
            .values()
            .filter(|application| query.matches(application))
            .cloned()
            .collect();
        applications.sort_by(|a, b| {
            b.applied_at
                .cmp(&a.applied_at)
                .then(b.id.cmp(&a.id))
        });
        if let Some(limit) = query.limit {
            applications.truncate(limit);
        }
        Ok(applications)
    }
}

/// Stand-in processor that approves every intent with a locally minted secret.
#[derive(Default)]
pub(crate) struct InMemoryPaymentGateway {
    issued: AtomicU64,
}

impl PaymentGateway for InMemoryPaymentGateway {
    fn create_intent(&self, amount: u64, currency: &str) -> Result<PaymentIntent, GatewayError> {
        let sequence = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(PaymentIntent {
            client_secret: format!("pi_local_{sequence:06}_secret"),
            amount,
            currency: currency.to_string(),
        })
    }
}

pub(crate) fn seed_user(
    store: &InMemoryEntityStore,
    email: &str,
    role: Role,
    name: &str,
) -> Result<User, RepositoryError> {
    store.insert_user(User {
        email: email.to_string(),
        role,
        name: name.to_string(),
        phone: None,
        address: None,
        photo: None,
        tutor_profile: None,
        created_at: Utc::now(),
        revision: 0,
    })
}

pub(crate) fn seed_admin(store: &InMemoryEntityStore, email: &str) -> Result<User, RepositoryError> {
    seed_user(store, email, Role::Admin, "Administrator")
}
