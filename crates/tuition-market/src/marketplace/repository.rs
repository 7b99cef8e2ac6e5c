//! Entity store ports.
//!
//! Adapters only need single-record atomicity: every `update_*` call is a
//! compare-and-set on the record's `revision`, and `mark_hired` is a
//! conditional write that refuses posts which already carry a hire.

use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Role, TuitionId, TuitionPost, TuitionStatus,
    User,
};

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// Duplicate key or a failed conditional write.
    #[error("write rejected: {0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait UserRepository: Send + Sync {
    /// Insert a new user; `Conflict` when the email is taken.
    fn insert_user(&self, user: User) -> Result<User, RepositoryError>;
    fn fetch_user(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    /// Replace the stored user if its revision still equals `user.revision`;
    /// `NotFound` when absent. Returns the stored copy with the bumped revision.
    fn update_user(&self, user: User) -> Result<User, RepositoryError>;
    fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, RepositoryError>;
}

/// Filter for tuition scans. Results come back newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuitionQuery {
    pub student_email: Option<String>,
    pub status: Option<TuitionStatus>,
    pub hired_tutor_email: Option<String>,
    pub limit: Option<usize>,
}

impl TuitionQuery {
    pub fn matches(&self, post: &TuitionPost) -> bool {
        self.student_email
            .as_deref()
            .map_or(true, |email| post.student_email == email)
            && self.status.map_or(true, |status| post.status == status)
            && self
                .hired_tutor_email
                .as_deref()
                .map_or(true, |email| post.hired_tutor_email.as_deref() == Some(email))
    }
}

/// Outcome of a successful conditional hire write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HireRecord {
    pub post: TuitionPost,
    /// Status the hire overwrote, as seen under the store's write guard.
    pub replaced_status: TuitionStatus,
}

pub trait TuitionRepository: Send + Sync {
    fn insert_post(&self, post: TuitionPost) -> Result<TuitionPost, RepositoryError>;
    fn fetch_post(&self, id: &TuitionId) -> Result<Option<TuitionPost>, RepositoryError>;
    /// Replace the stored post if its revision still equals `post.revision`.
    /// Returns the stored copy with the bumped revision.
    fn update_post(&self, post: TuitionPost) -> Result<TuitionPost, RepositoryError>;
    /// Atomically set `Paid` and the hired tutor unless the post is already
    /// hired, in which case `Conflict` is returned and nothing is written.
    fn mark_hired(
        &self,
        id: &TuitionId,
        tutor_email: &str,
        at: DateTime<Utc>,
    ) -> Result<HireRecord, RepositoryError>;
    fn delete_post(&self, id: &TuitionId) -> Result<(), RepositoryError>;
    fn find_posts(&self, query: &TuitionQuery) -> Result<Vec<TuitionPost>, RepositoryError>;
}

/// Filter for application scans. Results come back newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationQuery {
    pub tutor_email: Option<String>,
    pub student_email: Option<String>,
    pub tuition_ids: Option<Vec<TuitionId>>,
    pub status: Option<ApplicationStatus>,
    pub limit: Option<usize>,
}

impl ApplicationQuery {
    pub fn matches(&self, application: &Application) -> bool {
        self.tutor_email
            .as_deref()
            .map_or(true, |email| application.tutor_email == email)
            && self
                .student_email
                .as_deref()
                .map_or(true, |email| application.student_email == email)
            && self
                .tuition_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&application.tuition_id))
            && self
                .status
                .map_or(true, |status| application.status == status)
    }
}

pub trait ApplicationRepository: Send + Sync {
    fn insert_application(&self, application: Application)
        -> Result<Application, RepositoryError>;
    fn fetch_application(&self, id: &ApplicationId)
        -> Result<Option<Application>, RepositoryError>;
    /// Compare-and-set on `application.revision`.
    fn update_application(&self, application: Application)
        -> Result<Application, RepositoryError>;
    fn find_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Vec<Application>, RepositoryError>;
}

/// Everything the marketplace facade needs from a single backing store.
pub trait EntityStore: UserRepository + TuitionRepository + ApplicationRepository {}

impl<T> EntityStore for T where T: UserRepository + TuitionRepository + ApplicationRepository {}
