use crate::infra::{seed_admin, seed_user, InMemoryEntityStore, InMemoryPaymentGateway};
use clap::Args;
use std::sync::{Arc, Barrier};
use std::thread;
use tuition_market::config::MarketplaceConfig;
use tuition_market::error::AppError;
use tuition_market::marketplace::{
    ApplicationDraft, ApplicationPitch, Identity, Marketplace, MarketplaceError, Role,
    TuitionDetails, TuitionPost, TuitionStatus,
};

type DemoMarket = Marketplace<InMemoryEntityStore, InMemoryPaymentGateway>;

const STUDENT: &str = "nadia@example.com";
const ADMIN: &str = "ops@example.com";
const TUTORS: [&str; 2] = ["farhan@example.com", "lamia@example.com"];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the concurrent confirmation race.
    #[arg(long)]
    pub(crate) skip_race: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Tuition marketplace demo");

    let store = Arc::new(InMemoryEntityStore::default());
    let seeded = seed_admin(&store, ADMIN)
        .and_then(|_| seed_user(&store, STUDENT, Role::Student, "Nadia"))
        .and_then(|_| seed_user(&store, TUTORS[0], Role::Tutor, "Farhan"))
        .and_then(|_| seed_user(&store, TUTORS[1], Role::Tutor, "Lamia"));
    if let Err(err) = seeded {
        println!("  Seeding failed: {err}");
        return Ok(());
    }

    let market = Arc::new(Marketplace::new(
        store,
        Arc::new(InMemoryPaymentGateway::default()),
        &MarketplaceConfig::default(),
    ));

    println!("\nHiring walkthrough");
    if let Err(err) = hiring_walkthrough(&market) {
        println!("  Walkthrough halted: {err}");
        return Ok(());
    }

    if args.skip_race {
        return Ok(());
    }

    println!("\nConcurrent confirmation race");
    if let Err(err) = confirmation_race(&market) {
        println!("  Race halted: {err}");
    }
    Ok(())
}

fn hiring_walkthrough(market: &DemoMarket) -> Result<(), MarketplaceError> {
    let student = Identity::new(STUDENT, Role::Student);
    let admin = Identity::new(ADMIN, Role::Admin);
    let tutor = Identity::new(TUTORS[0], Role::Tutor);

    let post = market.tuitions.create(&student, demo_details("Mathematics"))?;
    println!("- {} posted {} -> {}", STUDENT, post.id, post.status.label());

    let post = market
        .tuitions
        .set_status(&post.id, TuitionStatus::Approved, &admin)?;
    println!("- {} approved {} -> {}", ADMIN, post.id, post.status.label());

    match market.contacts.contact(&tutor, STUDENT) {
        Ok(_) => println!("- unexpected: contact disclosed before hire"),
        Err(err) => println!("- contact before hire refused: {err}"),
    }

    let application = market.applications.apply(demo_draft(&post, TUTORS[0]))?;
    println!(
        "- {} applied with {} -> {}",
        TUTORS[0],
        application.id,
        application.status.label()
    );

    let confirmed = market
        .applications
        .confirm_payment(&application.id, STUDENT)?;
    let post = market.tuitions.get(&post.id)?;
    println!(
        "- payment confirmed: application {} | post {} hired {}",
        confirmed.status.label(),
        post.status.label(),
        post.hired_tutor_email.as_deref().unwrap_or("-")
    );

    let card = market.contacts.contact(&tutor, STUDENT)?;
    println!(
        "- contact now disclosed to tutor: {} <{}> {}",
        card.name,
        card.email,
        card.phone.as_deref().unwrap_or("(no phone)")
    );

    let stats = market.stats.student(&student, STUDENT)?;
    println!(
        "- student stats: {} posts | {} applications | {} hired",
        stats.total_posts, stats.total_applications, stats.hired_count
    );
    Ok(())
}

fn confirmation_race(market: &Arc<DemoMarket>) -> Result<(), MarketplaceError> {
    let student = Identity::new(STUDENT, Role::Student);
    let post = market.tuitions.create(&student, demo_details("Chemistry"))?;
    let applications = TUTORS
        .iter()
        .map(|tutor| market.applications.apply(demo_draft(&post, tutor)))
        .collect::<Result<Vec<_>, _>>()?;
    println!(
        "- {} applications against {}, confirming both at once",
        applications.len(),
        post.id
    );

    let barrier = Arc::new(Barrier::new(applications.len()));
    let handles: Vec<_> = applications
        .into_iter()
        .map(|application| {
            let market = Arc::clone(market);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let outcome = market.applications.confirm_payment(&application.id, STUDENT);
                (application.tutor_email, outcome)
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok((tutor, Ok(_))) => println!("  - {tutor}: hired"),
            Ok((tutor, Err(err))) => println!("  - {tutor}: rejected ({err})"),
            Err(_) => println!("  - confirmation thread panicked"),
        }
    }

    let post = market.tuitions.get(&post.id)?;
    println!(
        "- final post state: {} hired {}",
        post.status.label(),
        post.hired_tutor_email.as_deref().unwrap_or("-")
    );
    Ok(())
}

fn demo_details(subject: &str) -> TuitionDetails {
    TuitionDetails {
        subject: subject.to_string(),
        class_level: "Class 10".to_string(),
        budget: 5000,
        location: "Mirpur, Dhaka".to_string(),
        schedule: Some("Sun/Tue/Thu evenings".to_string()),
        notes: None,
    }
}

fn demo_draft(post: &TuitionPost, tutor_email: &str) -> ApplicationDraft {
    ApplicationDraft {
        tuition_id: post.id.clone(),
        tutor_email: tutor_email.to_string(),
        student_email: post.student_email.clone(),
        pitch: ApplicationPitch {
            expected_salary: Some(post.details.budget),
            ..ApplicationPitch::default()
        },
    }
}
