use super::common::*;
use crate::marketplace::domain::{ProfileUpdate, Role, TutorProfile};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::payments::PaymentRequest;
use crate::marketplace::repository::UserRepository;
use crate::marketplace::users::Registration;
use std::sync::Arc;

fn registration(email: &str, role: Role) -> Registration {
    Registration {
        email: email.to_string(),
        name: "Nadia".to_string(),
        role,
        phone: Some("+880-1700".to_string()),
        address: None,
        photo: None,
        tutor_profile: Some(TutorProfile {
            subjects: vec!["Chemistry".to_string()],
            experience: Some("2 years".to_string()),
            education: Some("BUET".to_string()),
            area: Some("Banani".to_string()),
        }),
    }
}

#[test]
fn register_is_idempotent() {
    let (market, _) = build_marketplace();
    let email = "nadia@example.com";

    let first = market
        .users
        .register(email, registration(email, Role::Tutor))
        .expect("registers");
    assert!(first.created);

    let mut again = registration(email, Role::Student);
    again.name = "Someone Else".to_string();
    let second = market.users.register(email, again).expect("re-registers");
    assert!(!second.created);
    assert_eq!(second.user.role, Role::Tutor);
    assert_eq!(second.user.name, "Nadia");
}

#[test]
fn register_refuses_admin_and_foreign_emails() {
    let (market, _) = build_marketplace();
    let email = "mallory@example.com";

    assert!(matches!(
        market
            .users
            .register(email, registration(email, Role::Admin)),
        Err(MarketplaceError::Forbidden(_))
    ));
    assert!(matches!(
        market
            .users
            .register(email, registration("victim@example.com", Role::Student)),
        Err(MarketplaceError::Forbidden(_))
    ));
}

#[test]
fn identify_rejects_unregistered_callers() {
    let (market, _) = build_marketplace();

    assert_eq!(
        market.users.identify(TUTOR).expect("known caller").role,
        Role::Tutor
    );
    assert!(matches!(
        market.users.identify("ghost@example.com"),
        Err(MarketplaceError::Unauthorized)
    ));
}

#[test]
fn role_changes_are_admin_only() {
    let (market, _) = build_marketplace();

    assert!(matches!(
        market
            .users
            .change_role(&identity(STUDENT), STUDENT, Role::Admin),
        Err(MarketplaceError::Forbidden(_))
    ));
    let promoted = market
        .users
        .change_role(&identity(ADMIN), STUDENT, Role::Tutor)
        .expect("admin changes role");
    assert_eq!(promoted.role, Role::Tutor);
    assert_eq!(
        market.users.identify(STUDENT).expect("known").role,
        Role::Tutor
    );
}

#[test]
fn profile_updates_are_self_service() {
    let (market, _) = build_marketplace();
    let update = ProfileUpdate {
        phone: Some("+880-1999".to_string()),
        ..ProfileUpdate::default()
    };

    assert!(matches!(
        market
            .users
            .update_profile(&identity(TUTOR), STUDENT, update.clone()),
        Err(MarketplaceError::Forbidden(_))
    ));
    let updated = market
        .users
        .update_profile(&identity(STUDENT), STUDENT, update)
        .expect("self update");
    assert_eq!(updated.phone.as_deref(), Some("+880-1999"));
    assert_eq!(updated.name, "Sam");
}

#[test]
fn profile_update_cannot_undo_concurrent_role_change() {
    let (market, store) = build_marketplace();
    let admin_market = Arc::clone(&market);
    store.after_next_user_fetch(move || {
        admin_market
            .users
            .change_role(&identity(ADMIN), STUDENT, Role::Tutor)
            .expect("admin changes role");
    });

    let result = market.users.update_profile(
        &identity(STUDENT),
        STUDENT,
        ProfileUpdate {
            phone: Some("+880-1555".to_string()),
            ..ProfileUpdate::default()
        },
    );

    assert!(matches!(result, Err(MarketplaceError::Conflict(_))));
    let stored = store
        .fetch_user(STUDENT)
        .expect("fetch succeeds")
        .expect("user present");
    assert_eq!(stored.role, Role::Tutor);
    assert_ne!(stored.phone.as_deref(), Some("+880-1555"));
}

#[test]
fn tutor_listing_only_contains_tutors() {
    let (market, _) = build_marketplace();
    let tutors = market.users.list_tutors().expect("listing");
    let emails: Vec<_> = tutors.iter().map(|card| card.email.as_str()).collect();
    assert_eq!(emails, vec![OTHER_TUTOR, TUTOR]);

    assert!(matches!(
        market.users.list_users(&identity(TUTOR)),
        Err(MarketplaceError::Forbidden(_))
    ));
    assert_eq!(
        market
            .users
            .list_users(&identity(ADMIN))
            .expect("admin listing")
            .len(),
        5
    );
}

#[test]
fn stats_reflect_hire_state() {
    let (market, _) = build_marketplace();
    let post = approved_post(&market);
    approved_post(&market);
    let hired = market
        .applications
        .apply(draft(&post.id, TUTOR))
        .expect("tutor applies");
    market
        .applications
        .apply(draft(&post.id, OTHER_TUTOR))
        .expect("other tutor applies");
    market
        .applications
        .confirm_payment(&hired.id, STUDENT)
        .expect("confirmed");

    let student = market
        .stats
        .student(&identity(STUDENT), STUDENT)
        .expect("student stats");
    assert_eq!(student.total_posts, 2);
    assert_eq!(student.total_applications, 2);
    assert_eq!(student.hired_count, 1);

    let tutor = market
        .stats
        .tutor(&identity(OTHER_TUTOR), OTHER_TUTOR)
        .expect("tutor stats");
    assert_eq!(tutor.total_applications, 1);
    assert_eq!(tutor.hired_count, 0);
    assert_eq!(tutor.pending, 1);

    assert!(matches!(
        market.stats.tutor(&identity(STUDENT), STUDENT),
        Err(MarketplaceError::Forbidden(_))
    ));
    assert!(matches!(
        market.stats.student(&identity(TUTOR), STUDENT),
        Err(MarketplaceError::Forbidden(_))
    ));
}

#[test]
fn payment_intent_uses_configured_currency() {
    let (market, _) = build_marketplace();
    let intent = market
        .payments
        .create_intent(&identity(STUDENT), PaymentRequest { price: 45.5 })
        .expect("intent created");
    assert_eq!(intent.amount, 4550);
    assert_eq!(intent.currency, "bdt");
    assert!(intent.client_secret.ends_with("_secret"));

    assert!(matches!(
        market
            .payments
            .create_intent(&identity(STUDENT), PaymentRequest { price: 0.0 }),
        Err(MarketplaceError::InvalidArgument(_))
    ));
}
