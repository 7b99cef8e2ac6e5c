use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    Application, ApplicationDraft, ApplicationId, ApplicationStatus, ApplicationWithPost,
    ContactCard, ProfileUpdate, Role, TuitionDetails, TuitionDetailsPatch, TuitionId, TuitionPost,
    TuitionStatus, TutorCard, UserProfileView,
};
use super::error::MarketplaceError;
use super::identity::Identity;
use super::payments::{PaymentGateway, PaymentIntent, PaymentRequest};
use super::repository::EntityStore;
use super::stats::{StudentStats, TutorStats};
use super::users::Registration;
use super::Marketplace;

/// Header carrying the email the upstream authentication layer verified.
pub const IDENTITY_HEADER: &str = "x-identity-email";

type MarketState<S, G> = State<Arc<Marketplace<S, G>>>;

/// Router exposing the marketplace under `/api/v1`.
pub fn marketplace_router<S, G>(market: Arc<Marketplace<S, G>>) -> Router
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/users",
            post(register_handler::<S, G>).get(list_users_handler::<S, G>),
        )
        .route("/api/v1/users/:email", get(profile_handler::<S, G>))
        .route("/api/v1/users/role/:email", patch(change_role_handler::<S, G>))
        .route(
            "/api/v1/users/update/:email",
            patch(update_profile_handler::<S, G>),
        )
        .route("/api/v1/users/contact/:email", get(contact_handler::<S, G>))
        .route("/api/v1/tutors", get(tutors_handler::<S, G>))
        .route(
            "/api/v1/tuitions",
            post(create_post_handler::<S, G>).get(list_posts_handler::<S, G>),
        )
        .route("/api/v1/tuitions/approved", get(approved_handler::<S, G>))
        .route("/api/v1/tuitions/latest", get(latest_handler::<S, G>))
        .route("/api/v1/tuitions/my-posts", get(my_posts_handler::<S, G>))
        .route(
            "/api/v1/tuitions/:id",
            get(get_post_handler::<S, G>)
                .patch(edit_post_handler::<S, G>)
                .delete(delete_post_handler::<S, G>),
        )
        .route(
            "/api/v1/tuitions/status/:id",
            patch(set_post_status_handler::<S, G>),
        )
        .route("/api/v1/applications", post(apply_handler::<S, G>))
        .route(
            "/api/v1/applications/my-applications",
            get(my_applications_handler::<S, G>),
        )
        .route(
            "/api/v1/applications/by-student-posts",
            get(student_applications_handler::<S, G>),
        )
        .route(
            "/api/v1/applications/status/:id",
            patch(application_status_handler::<S, G>),
        )
        .route(
            "/api/v1/applications/confirm/:id",
            post(confirm_payment_handler::<S, G>),
        )
        .route(
            "/api/v1/stats/student/:email",
            get(student_stats_handler::<S, G>),
        )
        .route("/api/v1/stats/tutor/:email", get(tutor_stats_handler::<S, G>))
        .route("/api/v1/payments/intent", post(payment_intent_handler::<S, G>))
        .with_state(market)
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let status = match &self {
            MarketplaceError::Unauthorized => StatusCode::UNAUTHORIZED,
            MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketplaceError::Conflict(_) => StatusCode::CONFLICT,
            MarketplaceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            MarketplaceError::Repository(_) => StatusCode::SERVICE_UNAVAILABLE,
            MarketplaceError::Gateway(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn authenticated_email(headers: &HeaderMap) -> Result<String, MarketplaceError> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(MarketplaceError::Unauthorized)
}

fn caller<S, G>(
    market: &Marketplace<S, G>,
    headers: &HeaderMap,
) -> Result<Identity, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    market.users.identify(&authenticated_email(headers)?)
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerFilter {
    #[serde(default)]
    pub(crate) email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TuitionStatusChange {
    pub(crate) status: TuitionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApplicationStatusChange {
    pub(crate) new_status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleChange {
    pub(crate) role: Role,
}

pub(crate) async fn register_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Json(registration): Json<Registration>,
) -> Result<Response, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let email = authenticated_email(&headers)?;
    let outcome = market.users.register(&email, registration)?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)).into_response())
}

pub(crate) async fn list_users_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserProfileView>>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.users.list_users(&identity)?))
}

pub(crate) async fn profile_handler<S, G>(
    State(market): MarketState<S, G>,
    Path(email): Path<String>,
) -> Result<Json<UserProfileView>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    Ok(Json(market.users.profile(&email)?))
}

pub(crate) async fn change_role_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(email): Path<String>,
    Json(change): Json<RoleChange>,
) -> Result<Json<UserProfileView>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.users.change_role(&identity, &email, change.role)?))
}

pub(crate) async fn update_profile_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(email): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfileView>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.users.update_profile(&identity, &email, update)?))
}

pub(crate) async fn contact_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> Result<Json<ContactCard>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.contacts.contact(&identity, &email)?))
}

pub(crate) async fn tutors_handler<S, G>(
    State(market): MarketState<S, G>,
) -> Result<Json<Vec<TutorCard>>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    Ok(Json(market.users.list_tutors()?))
}

pub(crate) async fn create_post_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Json(details): Json<TuitionDetails>,
) -> Result<(StatusCode, Json<TuitionPost>), MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    let post = market.tuitions.create(&identity, details)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub(crate) async fn list_posts_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Query(filter): Query<OwnerFilter>,
) -> Result<Json<Vec<TuitionPost>>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    let posts = match filter.email {
        Some(email) => market.tuitions.posts_by_owner(&identity, &email)?,
        None => market.tuitions.all_posts(&identity)?,
    };
    Ok(Json(posts))
}

pub(crate) async fn approved_handler<S, G>(
    State(market): MarketState<S, G>,
) -> Result<Json<Vec<TuitionPost>>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    Ok(Json(market.tuitions.approved()?))
}

pub(crate) async fn latest_handler<S, G>(
    State(market): MarketState<S, G>,
) -> Result<Json<Vec<TuitionPost>>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    Ok(Json(market.tuitions.latest()?))
}

pub(crate) async fn my_posts_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
) -> Result<Json<Vec<TuitionPost>>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(
        market.tuitions.posts_by_owner(&identity, &identity.email)?,
    ))
}

pub(crate) async fn get_post_handler<S, G>(
    State(market): MarketState<S, G>,
    Path(id): Path<String>,
) -> Result<Json<TuitionPost>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    Ok(Json(market.tuitions.get(&TuitionId(id))?))
}

pub(crate) async fn edit_post_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<TuitionDetailsPatch>,
) -> Result<Json<TuitionPost>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(
        market
            .tuitions
            .edit(&TuitionId(id), patch, &identity.email)?,
    ))
}

pub(crate) async fn delete_post_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    market.tuitions.delete(&TuitionId(id), &identity)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn set_post_status_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(change): Json<TuitionStatusChange>,
) -> Result<Json<TuitionPost>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.tuitions.set_status(
        &TuitionId(id),
        change.status,
        &identity,
    )?))
}

pub(crate) async fn apply_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Json(draft): Json<ApplicationDraft>,
) -> Result<(StatusCode, Json<Application>), MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    if !identity.is(&draft.tutor_email) {
        return Err(MarketplaceError::Forbidden(
            "tutors may only apply on their own behalf".to_string(),
        ));
    }
    let application = market.applications.apply(draft)?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub(crate) async fn my_applications_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
) -> Result<Json<Vec<Application>>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.applications.by_tutor(&identity)?))
}

pub(crate) async fn student_applications_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Query(filter): Query<OwnerFilter>,
) -> Result<Json<Vec<ApplicationWithPost>>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    let email = filter.email.unwrap_or_else(|| identity.email.clone());
    Ok(Json(
        market.applications.by_student_posts(&identity, &email)?,
    ))
}

pub(crate) async fn application_status_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(change): Json<ApplicationStatusChange>,
) -> Result<Json<Application>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.applications.update_status(
        &ApplicationId(id),
        change.new_status,
        &identity.email,
    )?))
}

pub(crate) async fn confirm_payment_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Application>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(
        market
            .applications
            .confirm_payment(&ApplicationId(id), &identity.email)?,
    ))
}

pub(crate) async fn student_stats_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> Result<Json<StudentStats>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.stats.student(&identity, &email)?))
}

pub(crate) async fn tutor_stats_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> Result<Json<TutorStats>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.stats.tutor(&identity, &email)?))
}

pub(crate) async fn payment_intent_handler<S, G>(
    State(market): MarketState<S, G>,
    headers: HeaderMap,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaymentIntent>, MarketplaceError>
where
    S: EntityStore + 'static,
    G: PaymentGateway + 'static,
{
    let identity = caller(&market, &headers)?;
    Ok(Json(market.payments.create_intent(&identity, request)?))
}
