//! Database seeder for Kosh development and testing.
//!
//! Seeds the current academic session, a yearly tuition structure for every
//! class, and a handful of demo students enrolled in the session with fee
//! line items and some payments already taken. Re-running skips rows that
//! already exist.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::Utc;
use kosh_core::StorePolicy;
use kosh_core::enrollment::{CLASS_GRADES, EnrollmentService, NewStudent};
use kosh_core::ledger::{FeeAssignment, FeeType, LedgerService, PaymentInput, PaymentMethod};
use kosh_db::entities::{academic_sessions, class_fee_structures, students};
use kosh_db::{ActivityRepository, EnrollmentRepository, FeeRepository, SessionRepository};
use kosh_shared::types::AcademicSessionId;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

/// Session created (and activated) when the database has none.
const SEED_SESSION: &str = "2025-26";

/// Yearly tuition in rupees, in `CLASS_GRADES` order.
const TUITION_FEES: [i64; 15] = [
    12_000, 13_000, 13_000, 15_000, 15_000, 16_000, 16_000, 18_000, 18_000, 20_000, 20_000,
    22_000, 24_000, 28_000, 28_000,
];

/// Actor recorded in the activity log for seeded rows.
const SEED_ACTOR: &str = "seeder";

/// A demo student: identity, class, transport fee and amount already paid
/// towards tuition.
struct DemoStudent {
    scholar_no: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    parent_name: &'static str,
    parent_phone: &'static str,
    class_grade: &'static str,
    transport_fee: Option<i64>,
    tuition_paid: i64,
}

const DEMO_STUDENTS: [DemoStudent; 4] = [
    DemoStudent {
        scholar_no: "DEMO-001",
        first_name: "Aarav",
        last_name: "Sharma",
        parent_name: "Rakesh Sharma",
        parent_phone: "9876543210",
        class_grade: "5th",
        transport_fee: Some(6_000),
        tuition_paid: 15_000,
    },
    DemoStudent {
        scholar_no: "DEMO-002",
        first_name: "Diya",
        last_name: "Patel",
        parent_name: "Meena Patel",
        parent_phone: "9812345678",
        class_grade: "5th",
        transport_fee: None,
        tuition_paid: 5_000,
    },
    DemoStudent {
        scholar_no: "DEMO-003",
        first_name: "Kabir",
        last_name: "Verma",
        parent_name: "Anil Verma",
        parent_phone: "9898989898",
        class_grade: "8th",
        transport_fee: Some(7_500),
        tuition_paid: 0,
    },
    DemoStudent {
        scholar_no: "DEMO-004",
        first_name: "Ananya",
        last_name: "Singh",
        parent_name: "Pooja Singh",
        parent_phone: "9123456780",
        class_grade: "10th",
        transport_fee: None,
        tuition_paid: 10_000,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    println!("Connecting to database...");
    let db = kosh_db::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    println!("Seeding academic session...");
    let session_id = seed_session(&db).await?;

    println!("Seeding class fee structures...");
    seed_fee_structures(&db).await?;

    println!("Seeding demo students...");
    seed_demo_students(&db, session_id).await?;

    println!("Seeding complete!");
    Ok(())
}

/// Seeds the current session, active only if nothing else is. Returns its id.
async fn seed_session(db: &DatabaseConnection) -> anyhow::Result<AcademicSessionId> {
    if let Some(existing) = academic_sessions::Entity::find()
        .filter(academic_sessions::Column::Name.eq(SEED_SESSION))
        .one(db)
        .await?
    {
        println!("  Session {SEED_SESSION} already exists, skipping...");
        return Ok(AcademicSessionId::from_uuid(existing.id));
    }

    let any_active = academic_sessions::Entity::find()
        .filter(academic_sessions::Column::IsActive.eq(true))
        .one(db)
        .await?
        .is_some();

    let session = academic_sessions::ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(SEED_SESSION.to_string()),
        is_active: Set(!any_active),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    println!("  Created session {SEED_SESSION} (active: {})", !any_active);
    Ok(AcademicSessionId::from_uuid(session.id))
}

async fn seed_fee_structures(db: &DatabaseConnection) -> anyhow::Result<()> {
    for (class_grade, tuition) in CLASS_GRADES.iter().zip(TUITION_FEES) {
        let exists = class_fee_structures::Entity::find()
            .filter(class_fee_structures::Column::ClassGrade.eq(*class_grade))
            .filter(class_fee_structures::Column::IsActive.eq(true))
            .one(db)
            .await?
            .is_some();
        if exists {
            println!("  {class_grade}: already has an active structure, skipping...");
            continue;
        }

        class_fee_structures::ActiveModel {
            id: Set(Uuid::now_v7()),
            class_grade: Set((*class_grade).to_string()),
            tuition_fee_yearly: Set(Decimal::from(tuition)),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await?;

        println!("  {class_grade}: {tuition}");
    }
    Ok(())
}

/// Registers the demo students through the services, so every seeded row
/// passes the same validation and lands in the activity log.
async fn seed_demo_students(
    db: &DatabaseConnection,
    session_id: AcademicSessionId,
) -> anyhow::Result<()> {
    let policy = StorePolicy::default();
    let enrollments = EnrollmentService::new(
        EnrollmentRepository::new(db.clone()),
        SessionRepository::new(db.clone()),
        ActivityRepository::new(db.clone()),
        policy,
    );
    let ledger = LedgerService::new(
        FeeRepository::new(db.clone()),
        ActivityRepository::new(db.clone()),
        policy,
    );

    for demo in &DEMO_STUDENTS {
        let exists = students::Entity::find()
            .filter(students::Column::ScholarNo.eq(demo.scholar_no))
            .one(db)
            .await?
            .is_some();
        if exists {
            println!("  {}: already registered, skipping...", demo.scholar_no);
            continue;
        }

        let tuition = CLASS_GRADES
            .iter()
            .position(|c| *c == demo.class_grade)
            .map(|i| Decimal::from(TUITION_FEES[i]))
            .with_context(|| format!("No tuition configured for class {}", demo.class_grade))?;

        let student = enrollments
            .register_student(
                NewStudent {
                    scholar_no: demo.scholar_no.to_string(),
                    first_name: demo.first_name.to_string(),
                    last_name: demo.last_name.to_string(),
                    parent_name: demo.parent_name.to_string(),
                    parent_phone: demo.parent_phone.to_string(),
                    parent_email: None,
                },
                SEED_ACTOR,
            )
            .await?;
        enrollments
            .enroll_student(student.id, session_id, demo.class_grade, None, SEED_ACTOR)
            .await?;

        let tuition_item = ledger
            .add_fee_assignment(
                FeeAssignment {
                    student_id: student.id,
                    session_id,
                    fee_type: FeeType::Tuition,
                    total_amount: tuition,
                    previous_year_fees: Decimal::ZERO,
                },
                SEED_ACTOR,
            )
            .await?;
        if let Some(transport) = demo.transport_fee {
            ledger
                .add_fee_assignment(
                    FeeAssignment {
                        student_id: student.id,
                        session_id,
                        fee_type: FeeType::Transport,
                        total_amount: Decimal::from(transport),
                        previous_year_fees: Decimal::ZERO,
                    },
                    SEED_ACTOR,
                )
                .await?;
        }
        if demo.tuition_paid > 0 {
            ledger
                .record_payment(
                    PaymentInput {
                        line_item_id: tuition_item.id,
                        amount: Decimal::from(demo.tuition_paid),
                        method: PaymentMethod::Cash,
                        reference: None,
                        remarks: Some("Opening balance".to_string()),
                    },
                    SEED_ACTOR,
                )
                .await?;
        }

        println!(
            "  {}: {} {} in {} (tuition {tuition}, paid {})",
            demo.scholar_no, demo.first_name, demo.last_name, demo.class_grade, demo.tuition_paid
        );
    }
    Ok(())
}
