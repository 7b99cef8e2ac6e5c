use std::sync::Arc;

use serde::Serialize;

use super::domain::{ApplicationStatus, Role, TuitionStatus};
use super::error::MarketplaceError;
use super::identity::{require_role, require_self_or_admin, Identity};
use super::repository::{ApplicationQuery, ApplicationRepository, TuitionQuery, TuitionRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub total_posts: usize,
    pub total_applications: usize,
    pub hired_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorStats {
    pub total_applications: usize,
    pub hired_count: usize,
    pub pending: usize,
}

/// Dashboard counters derived from the two lifecycles.
pub struct StatsProjection<S> {
    store: Arc<S>,
}

impl<S> Clone for StatsProjection<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> StatsProjection<S>
where
    S: TuitionRepository + ApplicationRepository + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn student(
        &self,
        caller: &Identity,
        student_email: &str,
    ) -> Result<StudentStats, MarketplaceError> {
        require_self_or_admin(caller, student_email)?;
        let posts = self.store.find_posts(&TuitionQuery {
            student_email: Some(student_email.to_string()),
            ..TuitionQuery::default()
        })?;
        let total_applications = if posts.is_empty() {
            0
        } else {
            self.store
                .find_applications(&ApplicationQuery {
                    tuition_ids: Some(posts.iter().map(|post| post.id.clone()).collect()),
                    ..ApplicationQuery::default()
                })?
                .len()
        };

        Ok(StudentStats {
            total_posts: posts.len(),
            total_applications,
            hired_count: posts
                .iter()
                .filter(|post| post.status == TuitionStatus::Paid)
                .count(),
        })
    }

    pub fn tutor(
        &self,
        caller: &Identity,
        tutor_email: &str,
    ) -> Result<TutorStats, MarketplaceError> {
        if !caller.is_admin() {
            require_role(caller, Role::Tutor)?;
            require_self_or_admin(caller, tutor_email)?;
        }
        let applications = self.store.find_applications(&ApplicationQuery {
            tutor_email: Some(tutor_email.to_string()),
            ..ApplicationQuery::default()
        })?;
        let count = |status: ApplicationStatus| {
            applications
                .iter()
                .filter(|application| application.status == status)
                .count()
        };

        Ok(TutorStats {
            total_applications: applications.len(),
            hired_count: count(ApplicationStatus::PaidConfirmed),
            pending: count(ApplicationStatus::Applied),
        })
    }
}
