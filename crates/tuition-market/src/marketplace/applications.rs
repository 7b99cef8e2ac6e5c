//! Application lifecycle: `Applied -> Paid-Confirmed`.
//!
//! Confirming a payment is a two-step saga against two records. The tuition
//! post is written first through its conditional hire guard; the application
//! is only promoted after that write wins. A losing racer therefore never
//! touches its application, and a failed second step releases the hire.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::domain::{
    Application, ApplicationDraft, ApplicationId, ApplicationStatus, ApplicationWithPost,
    TuitionPost,
};
use super::error::MarketplaceError;
use super::identity::Identity;
use super::repository::{ApplicationQuery, ApplicationRepository, TuitionQuery, TuitionRepository};
use super::tuitions::TuitionLifecycle;

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

pub struct ApplicationLifecycle<S> {
    store: Arc<S>,
    tuitions: TuitionLifecycle<S>,
}

impl<S> Clone for ApplicationLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tuitions: self.tuitions.clone(),
        }
    }
}

impl<S> ApplicationLifecycle<S>
where
    S: TuitionRepository + ApplicationRepository + 'static,
{
    pub fn new(store: Arc<S>, tuitions: TuitionLifecycle<S>) -> Self {
        Self { store, tuitions }
    }

    /// Record a tutor's bid. The post's review state is not checked; a tutor
    /// may apply to a post in any state.
    pub fn apply(&self, draft: ApplicationDraft) -> Result<Application, MarketplaceError> {
        if draft.tutor_email.trim().is_empty() {
            return Err(MarketplaceError::InvalidArgument(
                "tutorEmail must not be empty".to_string(),
            ));
        }
        let post = self.tuitions.get(&draft.tuition_id)?;
        if post.student_email != draft.student_email {
            return Err(MarketplaceError::InvalidArgument(format!(
                "studentEmail does not own tuition {}",
                post.id
            )));
        }

        let now = Utc::now();
        let application = Application {
            id: next_application_id(),
            tuition_id: draft.tuition_id,
            tutor_email: draft.tutor_email,
            student_email: post.student_email,
            pitch: draft.pitch,
            status: ApplicationStatus::Applied,
            applied_at: now,
            updated_at: now,
            revision: 0,
        };

        Ok(self.store.insert_application(application)?)
    }

    pub fn get(&self, id: &ApplicationId) -> Result<Application, MarketplaceError> {
        self.store
            .fetch_application(id)?
            .ok_or_else(|| MarketplaceError::not_found(format!("application {id}")))
    }

    /// Hire the application's tutor. Only the student who currently owns the
    /// referenced post may confirm, and only one confirmation per post can
    /// ever succeed; later or concurrent ones fail with `Conflict`.
    pub fn confirm_payment(
        &self,
        id: &ApplicationId,
        caller_email: &str,
    ) -> Result<Application, MarketplaceError> {
        let application = self.get(id)?;
        self.owned_post(&application, caller_email)?;

        if application.status == ApplicationStatus::PaidConfirmed {
            return Err(MarketplaceError::Conflict(format!(
                "application {id} is already confirmed"
            )));
        }

        let hire = match self
            .tuitions
            .mark_hired(&application.tuition_id, &application.tutor_email)
        {
            Ok(hire) => hire,
            Err(MarketplaceError::Conflict(detail)) => {
                warn!(
                    application_id = %id,
                    tuition_id = %application.tuition_id,
                    "payment confirmation lost: tuition already hired"
                );
                return Err(MarketplaceError::Conflict(detail));
            }
            Err(other) => return Err(other),
        };

        let mut promoted = application;
        promoted.status = ApplicationStatus::PaidConfirmed;
        promoted.updated_at = Utc::now();

        match self.store.update_application(promoted) {
            Ok(stored) => {
                info!(
                    application_id = %stored.id,
                    tuition_id = %stored.tuition_id,
                    tutor_email = %stored.tutor_email,
                    "hire confirmed"
                );
                Ok(stored)
            }
            Err(write_error) => {
                let tuition_id = hire.post.id.clone();
                if let Err(release_error) = self.tuitions.release_hire(hire) {
                    error!(
                        application_id = %id,
                        tuition_id = %tuition_id,
                        %release_error,
                        "failed to release hire after application write failed"
                    );
                } else {
                    warn!(application_id = %id, tuition_id = %tuition_id, "hire released");
                }
                Err(write_error.into())
            }
        }
    }

    /// Generic status write. The confirmation value runs the full hire
    /// transition; anything else is stored as-is on the application only.
    pub fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        caller_email: &str,
    ) -> Result<Application, MarketplaceError> {
        if status == ApplicationStatus::PaidConfirmed {
            return self.confirm_payment(id, caller_email);
        }

        let mut application = self.get(id)?;
        self.owned_post(&application, caller_email)?;
        if application.status == ApplicationStatus::PaidConfirmed {
            return Err(MarketplaceError::Conflict(format!(
                "application {id} is confirmed and cannot change status"
            )));
        }
        if application.status == status {
            return Ok(application);
        }

        application.status = status;
        application.updated_at = Utc::now();
        Ok(self.store.update_application(application)?)
    }

    pub fn by_tutor(&self, caller: &Identity) -> Result<Vec<Application>, MarketplaceError> {
        Ok(self.store.find_applications(&ApplicationQuery {
            tutor_email: Some(caller.email.clone()),
            ..ApplicationQuery::default()
        })?)
    }

    /// Applications against every post the student owns, joined with the
    /// post's descriptive fields.
    pub fn by_student_posts(
        &self,
        caller: &Identity,
        student_email: &str,
    ) -> Result<Vec<ApplicationWithPost>, MarketplaceError> {
        if !caller.is(student_email) {
            return Err(MarketplaceError::Forbidden(
                "applications are only listed for the caller's own posts".to_string(),
            ));
        }

        let posts = self.store.find_posts(&TuitionQuery {
            student_email: Some(student_email.to_string()),
            ..TuitionQuery::default()
        })?;
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let applications = self.store.find_applications(&ApplicationQuery {
            tuition_ids: Some(posts.iter().map(|post| post.id.clone()).collect()),
            ..ApplicationQuery::default()
        })?;

        let by_id: HashMap<_, _> = posts.iter().map(|post| (&post.id, post)).collect();
        Ok(applications
            .into_iter()
            .map(|application| {
                let post = by_id.get(&application.tuition_id);
                ApplicationWithPost {
                    tuition_subject: post.map(|post| post.details.subject.clone()),
                    tuition_class: post.map(|post| post.details.class_level.clone()),
                    tuition_location: post.map(|post| post.details.location.clone()),
                    application,
                }
            })
            .collect())
    }

    /// Resolve the referenced post fresh and check the caller owns it.
    fn owned_post(
        &self,
        application: &Application,
        caller_email: &str,
    ) -> Result<TuitionPost, MarketplaceError> {
        let post = self.tuitions.get(&application.tuition_id)?;
        if post.student_email != caller_email {
            return Err(MarketplaceError::Forbidden(
                "only the student who owns the tuition may confirm its applications".to_string(),
            ));
        }
        Ok(post)
    }
}
