use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::marketplace::domain::{
    Application, ApplicationDraft, ApplicationId, ApplicationPitch, Role, TuitionDetails,
    TuitionId, TuitionPost, TuitionStatus, User,
};
use crate::marketplace::identity::Identity;
use crate::marketplace::payments::{GatewayError, PaymentGateway, PaymentIntent};
use crate::marketplace::repository::{
    ApplicationQuery, ApplicationRepository, HireRecord, RepositoryError, TuitionQuery,
    TuitionRepository, UserRepository,
};
use crate::marketplace::Marketplace;

pub(super) const STUDENT: &str = "sam@example.com";
pub(super) const OTHER_STUDENT: &str = "olivia@example.com";
pub(super) const TUTOR: &str = "tina@example.com";
pub(super) const OTHER_TUTOR: &str = "theo@example.com";
pub(super) const ADMIN: &str = "root@example.com";

/// One-shot callback run right after a read returns, used to interleave a
/// competing write between a service's read and its write.
type ReadHook = Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>;

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) users: Arc<Mutex<HashMap<String, User>>>,
    pub(super) posts: Arc<Mutex<HashMap<TuitionId, TuitionPost>>>,
    pub(super) applications: Arc<Mutex<HashMap<ApplicationId, Application>>>,
    pub(super) fail_application_updates: Arc<AtomicBool>,
    after_user_fetch: ReadHook,
    after_post_fetch: ReadHook,
}

impl MemoryStore {
    pub(super) fn after_next_user_fetch(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_user_fetch.lock().expect("hook mutex poisoned") = Some(Box::new(hook));
    }

    pub(super) fn after_next_post_fetch(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_post_fetch.lock().expect("hook mutex poisoned") = Some(Box::new(hook));
    }
}

fn fire(hook: &ReadHook) {
    let pending = hook.lock().expect("hook mutex poisoned").take();
    if let Some(callback) = pending {
        callback();
    }
}

impl UserRepository for MemoryStore {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.users.lock().expect("user mutex poisoned");
        if guard.contains_key(&user.email) {
            return Err(RepositoryError::Conflict(format!("user {}", user.email)));
        }
        guard.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    fn fetch_user(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = self.users.lock().expect("user mutex poisoned").get(email).cloned();
        fire(&self.after_user_fetch);
        Ok(user)
    }

    fn update_user(&self, mut user: User) -> Result<User, RepositoryError> {
        let mut guard = self.users.lock().expect("user mutex poisoned");
        let slot = guard
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
        let guard = self.users.lock().expect("user mutex poisoned");
        let mut users: Vec<User> = guard
            .values()
            .filter(|user| role.map_or(true, |role| user.role == role))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }
}

impl TuitionRepository for MemoryStore {
    fn insert_post(&self, post: TuitionPost) -> Result<TuitionPost, RepositoryError> {
        let mut guard = self.posts.lock().expect("post mutex poisoned");
        if guard.contains_key(&post.id) {
            return Err(RepositoryError::Conflict(format!("tuition {}", post.id)));
        }
        guard.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    fn fetch_post(&self, id: &TuitionId) -> Result<Option<TuitionPost>, RepositoryError> {
        let post = self.posts.lock().expect("post mutex poisoned").get(id).cloned();
        fire(&self.after_post_fetch);
        Ok(post)
    }

    fn update_post(&self, mut post: TuitionPost) -> Result<TuitionPost, RepositoryError> {
        let mut guard = self.posts.lock().expect("post mutex poisoned");
        let slot = guard
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
        let mut guard = self.posts.lock().expect("post mutex poisoned");
        let slot = guard
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("tuition {id}")))?;
        if slot.is_hired() {
            return Err(RepositoryError::Conflict(format!(
                "tuition {id} already hired"
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
        self.posts
            .lock()
            .expect("post mutex poisoned")
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("tuition {id}")))
    }

    fn find_posts(&self, query: &TuitionQuery) -> Result<Vec<TuitionPost>, RepositoryError> {
        let guard = self.posts.lock().expect("post mutex poisoned");
        let mut posts: Vec<TuitionPost> =
            guard.values().filter(|post| query.matches(post)).cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = query.limit {
            posts.truncate(limit);
        }
        Ok(posts)
    }
}

impl ApplicationRepository for MemoryStore {
    fn insert_application(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError> {
        let mut guard = self.applications.lock().expect("application mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict(format!(
                "application {}",
                application.id
            )));
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self
            .applications
            .lock()
            .expect("application mutex poisoned")
            .get(id)
            .cloned())
    }

    fn update_application(
        &self,
        mut application: Application,
    ) -> Result<Application, RepositoryError> {
        if self.fail_application_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }
        let mut guard = self.applications.lock().expect("application mutex poisoned");
        let slot = guard.get_mut(&application.id).ok_or_else(|| {
            RepositoryError::NotFound(format!("application {}", application.id))
        })?;
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
        let guard = self.applications.lock().expect("application mutex poisoned");
        let mut applications: Vec<Application> = guard
            .values()
            .filter(|application| query.matches(application))
            .cloned()
            .collect();
        applications.sort_by(|a, b| {
            b.applied_at
                .cmp(&a.applied_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(limit) = query.limit {
            applications.truncate(limit);
        }
        Ok(applications)
    }
}

#[derive(Default)]
pub(super) struct MemoryGateway {
    issued: AtomicU64,
}

impl PaymentGateway for MemoryGateway {
    fn create_intent(&self, amount: u64, currency: &str) -> Result<PaymentIntent, GatewayError> {
        let n = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(PaymentIntent {
            client_secret: format!("pi_test_{n}_secret"),
            amount,
            currency: currency.to_string(),
        })
    }
}

pub(super) type TestMarketplace = Marketplace<MemoryStore, MemoryGateway>;

pub(super) fn user(email: &str, role: Role, name: &str) -> User {
    User {
        email: email.to_string(),
        role,
        name: name.to_string(),
        phone: Some(format!("+880-{}", name.len())),
        address: Some("Dhanmondi, Dhaka".to_string()),
        photo: None,
        tutor_profile: None,
        created_at: Utc::now(),
        revision: 0,
    }
}

/// Store seeded with two students, two tutors and an admin.
pub(super) fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    for seed in [
        user(STUDENT, Role::Student, "Sam"),
        user(OTHER_STUDENT, Role::Student, "Olivia"),
        user(TUTOR, Role::Tutor, "Tina"),
        user(OTHER_TUTOR, Role::Tutor, "Theo"),
        user(ADMIN, Role::Admin, "Root"),
    ] {
        store.insert_user(seed).expect("seed user");
    }
    store
}

pub(super) fn build_marketplace() -> (Arc<TestMarketplace>, Arc<MemoryStore>) {
    let store = seeded_store();
    let market = Marketplace::new(
        store.clone(),
        Arc::new(MemoryGateway::default()),
        &MarketplaceConfig::default(),
    );
    (Arc::new(market), store)
}

pub(super) fn identity(email: &str) -> Identity {
    let role = match email {
        STUDENT | OTHER_STUDENT => Role::Student,
        TUTOR | OTHER_TUTOR => Role::Tutor,
        _ => Role::Admin,
    };
    Identity::new(email, role)
}

pub(super) fn details() -> TuitionDetails {
    TuitionDetails {
        subject: "Physics".to_string(),
        class_level: "Class 10".to_string(),
        budget: 6000,
        location: "Mirpur".to_string(),
        schedule: Some("3 days/week".to_string()),
        notes: None,
    }
}

pub(super) fn draft(tuition_id: &TuitionId, tutor_email: &str) -> ApplicationDraft {
    ApplicationDraft {
        tuition_id: tuition_id.clone(),
        tutor_email: tutor_email.to_string(),
        student_email: STUDENT.to_string(),
        pitch: ApplicationPitch {
            tutor_name: Some("Tina".to_string()),
            qualifications: Some("BSc Physics".to_string()),
            experience: Some("4 years".to_string()),
            expected_salary: Some(5500),
        },
    }
}

/// A post owned by [`STUDENT`] that an admin has approved.
pub(super) fn approved_post(market: &TestMarketplace) -> TuitionPost {
    let post = market
        .tuitions
        .create(&identity(STUDENT), details())
        .expect("post created");
    market
        .tuitions
        .set_status(&post.id, TuitionStatus::Approved, &identity(ADMIN))
        .expect("admin approves")
}

pub(super) fn stored_post(store: &MemoryStore, id: &TuitionId) -> TuitionPost {
    store
        .fetch_post(id)
        .expect("fetch succeeds")
        .expect("post present")
}

pub(super) fn stored_application(store: &MemoryStore, id: &ApplicationId) -> Application {
    store
        .fetch_application(id)
        .expect("fetch succeeds")
        .expect("application present")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
