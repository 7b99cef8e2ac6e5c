//! Tuition post lifecycle: `Pending -> Approved -> Paid`.
//!
//! `Paid` is only reachable through [`TuitionLifecycle::mark_hired`], which the
//! application lifecycle calls while confirming a payment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{
    Role, TuitionDetails, TuitionDetailsPatch, TuitionId, TuitionPost, TuitionStatus,
};
use super::error::MarketplaceError;
use super::identity::{owner_or_admin_access, require_role, require_self_or_admin, Identity};
use super::repository::{HireRecord, TuitionQuery, TuitionRepository};

static TUITION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_tuition_id() -> TuitionId {
    let id = TUITION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TuitionId(format!("tuition-{id:06}"))
}

pub struct TuitionLifecycle<S> {
    store: Arc<S>,
    latest_limit: usize,
}

impl<S> Clone for TuitionLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            latest_limit: self.latest_limit,
        }
    }
}

impl<S> TuitionLifecycle<S>
where
    S: TuitionRepository + 'static,
{
    pub fn new(store: Arc<S>, latest_limit: usize) -> Self {
        Self {
            store,
            latest_limit: latest_limit.max(1),
        }
    }

    /// Publish a new post for review. It always starts out `Pending`.
    pub fn create(
        &self,
        caller: &Identity,
        details: TuitionDetails,
    ) -> Result<TuitionPost, MarketplaceError> {
        validate_details(&details)?;
        let now = Utc::now();
        let post = TuitionPost {
            id: next_tuition_id(),
            student_email: caller.email.clone(),
            details,
            status: TuitionStatus::Pending,
            hired_tutor_email: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        };

        let stored = self.store.insert_post(post)?;
        debug!(tuition_id = %stored.id, student_email = %stored.student_email, "tuition post created");
        Ok(stored)
    }

    pub fn get(&self, id: &TuitionId) -> Result<TuitionPost, MarketplaceError> {
        self.store
            .fetch_post(id)?
            .ok_or_else(|| MarketplaceError::not_found(format!("tuition {id}")))
    }

    /// Merge an edit from the owning student. Any accepted edit sends the post
    /// back to `Pending` for another review.
    pub fn edit(
        &self,
        id: &TuitionId,
        patch: TuitionDetailsPatch,
        caller_email: &str,
    ) -> Result<TuitionPost, MarketplaceError> {
        let mut post = self.get(id)?;
        if post.student_email != caller_email {
            return Err(MarketplaceError::Forbidden(
                "only the owning student may edit a tuition post".to_string(),
            ));
        }
        if patch.is_empty() {
            return Err(MarketplaceError::InvalidArgument(
                "edit carries no changes".to_string(),
            ));
        }

        patch.apply_to(&mut post.details);
        validate_details(&post.details)?;
        let previous = post.status;
        post.status = TuitionStatus::Pending;
        post.updated_at = Utc::now();

        let stored = self.store.update_post(post)?;
        if previous != TuitionStatus::Pending {
            info!(tuition_id = %stored.id, from = previous.label(), "edit returned tuition post to review");
        }
        Ok(stored)
    }

    /// Administrative review transition. `Paid` can never be set here and a
    /// hired post cannot be moved.
    pub fn set_status(
        &self,
        id: &TuitionId,
        status: TuitionStatus,
        caller: &Identity,
    ) -> Result<TuitionPost, MarketplaceError> {
        require_role(caller, Role::Admin)?;
        if status == TuitionStatus::Paid {
            return Err(MarketplaceError::InvalidArgument(
                "Paid is only reachable by confirming a payment".to_string(),
            ));
        }

        let mut post = self.get(id)?;
        if post.status == TuitionStatus::Paid {
            return Err(MarketplaceError::Conflict(format!(
                "tuition {id} is already paid"
            )));
        }
        if post.status == status {
            return Ok(post);
        }

        post.status = status;
        post.updated_at = Utc::now();
        let stored = self.store.update_post(post)?;
        info!(tuition_id = %stored.id, status = status.label(), admin = %caller.email, "tuition status set");
        Ok(stored)
    }

    pub fn delete(&self, id: &TuitionId, caller: &Identity) -> Result<(), MarketplaceError> {
        let post = self.get(id)?;
        owner_or_admin_access(caller, &post.student_email)
            .or_forbid("only the owner or an Admin may delete a tuition post")?;
        self.store.delete_post(id)?;
        info!(tuition_id = %id, by = %caller.email, "tuition post deleted");
        Ok(())
    }

    /// Terminal hire write. Fails with `Conflict` when the post already
    /// carries a hire, leaving it untouched.
    pub(crate) fn mark_hired(
        &self,
        id: &TuitionId,
        tutor_email: &str,
    ) -> Result<HireRecord, MarketplaceError> {
        Ok(self.store.mark_hired(id, tutor_email, Utc::now())?)
    }

    /// Compensating write used when the application half of a hire fails.
    /// Restores the status the hire replaced and clears the marker.
    pub(crate) fn release_hire(&self, hire: HireRecord) -> Result<TuitionPost, MarketplaceError> {
        let mut restored = hire.post;
        restored.status = hire.replaced_status;
        restored.hired_tutor_email = None;
        restored.updated_at = Utc::now();
        Ok(self.store.update_post(restored)?)
    }

    pub fn approved(&self) -> Result<Vec<TuitionPost>, MarketplaceError> {
        self.find(TuitionQuery {
            status: Some(TuitionStatus::Approved),
            ..TuitionQuery::default()
        })
    }

    pub fn latest(&self) -> Result<Vec<TuitionPost>, MarketplaceError> {
        self.find(TuitionQuery {
            status: Some(TuitionStatus::Approved),
            limit: Some(self.latest_limit),
            ..TuitionQuery::default()
        })
    }

    pub fn posts_by_owner(
        &self,
        caller: &Identity,
        student_email: &str,
    ) -> Result<Vec<TuitionPost>, MarketplaceError> {
        require_self_or_admin(caller, student_email)?;
        self.find(TuitionQuery {
            student_email: Some(student_email.to_string()),
            ..TuitionQuery::default()
        })
    }

    pub fn all_posts(&self, caller: &Identity) -> Result<Vec<TuitionPost>, MarketplaceError> {
        require_role(caller, Role::Admin)?;
        self.find(TuitionQuery::default())
    }

    fn find(&self, query: TuitionQuery) -> Result<Vec<TuitionPost>, MarketplaceError> {
        Ok(self.store.find_posts(&query)?)
    }
}

fn validate_details(details: &TuitionDetails) -> Result<(), MarketplaceError> {
    let required = [
        ("subject", &details.subject),
        ("classLevel", &details.class_level),
        ("location", &details.location),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(MarketplaceError::InvalidArgument(format!(
            "{field} must not be empty"
        )));
    }
    if details.budget == 0 {
        return Err(MarketplaceError::InvalidArgument(
            "budget must be positive".to_string(),
        ));
    }
    Ok(())
}
