//! Initial database migration.
//!
//! Creates the session, student, fee and activity tables. Ledger invariants
//! that must hold for every row are repeated here as CHECK constraints so a
//! bad write fails in the database even if it slips past the service layer.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: SESSIONS AND STUDENTS
        // ============================================================
        db.execute_unprepared(ACADEMIC_SESSIONS_SQL).await?;
        db.execute_unprepared(STUDENTS_SQL).await?;
        db.execute_unprepared(CLASS_FEE_STRUCTURES_SQL).await?;
        db.execute_unprepared(ENROLLMENTS_SQL).await?;

        // ============================================================
        // PART 2: FEE LEDGER
        // ============================================================
        db.execute_unprepared(FEE_LINE_ITEMS_SQL).await?;
        db.execute_unprepared(FEE_TRANSACTIONS_SQL).await?;

        // ============================================================
        // PART 3: AUDIT
        // ============================================================
        db.execute_unprepared(ACTIVITY_LOGS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ACADEMIC_SESSIONS_SQL: &str = r"
CREATE TABLE academic_sessions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(7) NOT NULL UNIQUE,
    is_active BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_session_name CHECK (name ~ '^[0-9]{4}-[0-9]{2}$'),
    -- At most one active session. Deferred so a single UPDATE can move the flag.
    CONSTRAINT excl_single_active_session
        EXCLUDE USING btree (is_active WITH =) WHERE (is_active)
        DEFERRABLE INITIALLY DEFERRED
);
";

const STUDENTS_SQL: &str = r"
CREATE TABLE students (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    scholar_no VARCHAR(32) NOT NULL UNIQUE,
    first_name VARCHAR(100) NOT NULL,
    last_name VARCHAR(100) NOT NULL DEFAULT '',
    parent_name VARCHAR(200) NOT NULL,
    parent_phone VARCHAR(20) NOT NULL,
    parent_email VARCHAR(255),
    status VARCHAR(16) NOT NULL DEFAULT 'active',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_student_status CHECK (status IN ('active', 'inactive'))
);

CREATE INDEX idx_students_name ON students(lower(first_name), lower(last_name));
";

const CLASS_FEE_STRUCTURES_SQL: &str = r"
CREATE TABLE class_fee_structures (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    class_grade VARCHAR(16) NOT NULL,
    tuition_fee_yearly NUMERIC(12, 2) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_tuition_non_negative CHECK (tuition_fee_yearly >= 0)
);

-- One active structure per class
CREATE UNIQUE INDEX idx_class_fee_structures_active
    ON class_fee_structures(class_grade) WHERE is_active;
";

const ENROLLMENTS_SQL: &str = r"
CREATE TABLE enrollments (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID NOT NULL REFERENCES students(id) ON DELETE RESTRICT,
    session_id UUID NOT NULL REFERENCES academic_sessions(id) ON DELETE RESTRICT,
    class_grade VARCHAR(16) NOT NULL,
    section VARCHAR(8),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_enrollment_student_session UNIQUE (student_id, session_id)
);

CREATE INDEX idx_enrollments_session ON enrollments(session_id, class_grade);
";

const FEE_LINE_ITEMS_SQL: &str = r"
CREATE TABLE fee_line_items (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID NOT NULL REFERENCES students(id) ON DELETE RESTRICT,
    session_id UUID NOT NULL REFERENCES academic_sessions(id) ON DELETE RESTRICT,
    fee_type VARCHAR(32) NOT NULL,
    total_amount NUMERIC(12, 2) NOT NULL,
    previous_year_fees NUMERIC(12, 2) NOT NULL DEFAULT 0,
    paid_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
    carried_forward_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
    outstanding_amount NUMERIC(12, 2) NOT NULL,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_fee_type CHECK (fee_type IN (
        'tuition', 'admission', 'transport', 'sports', 'library',
        'examination', 'annual', 'miscellaneous', 'other', 'previous_year'
    )),
    CONSTRAINT chk_amounts_non_negative CHECK (
        total_amount >= 0 AND previous_year_fees >= 0
        AND paid_amount >= 0 AND carried_forward_amount >= 0
        AND outstanding_amount >= 0
    ),
    CONSTRAINT chk_fee_reconciled CHECK (
        outstanding_amount
            = total_amount + previous_year_fees - paid_amount - carried_forward_amount
    ),
    CONSTRAINT uq_fee_line_item UNIQUE (student_id, session_id, fee_type)
);

CREATE INDEX idx_fee_line_items_session ON fee_line_items(session_id);

-- Defaulters report
CREATE INDEX idx_fee_line_items_outstanding
    ON fee_line_items(session_id, student_id) WHERE outstanding_amount > 0;
";

const FEE_TRANSACTIONS_SQL: &str = r"
CREATE TABLE fee_transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID NOT NULL REFERENCES students(id) ON DELETE RESTRICT,
    session_id UUID NOT NULL REFERENCES academic_sessions(id) ON DELETE RESTRICT,
    line_item_id UUID NOT NULL REFERENCES fee_line_items(id) ON DELETE RESTRICT,
    fee_type VARCHAR(32) NOT NULL,
    amount NUMERIC(12, 2) NOT NULL,
    method VARCHAR(16) NOT NULL,
    reference VARCHAR(100),
    remarks TEXT,
    recorded_by VARCHAR(100) NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_payment_positive CHECK (amount > 0),
    CONSTRAINT chk_payment_method CHECK (method IN (
        'cash', 'upi', 'bank_transfer', 'cheque', 'card'
    ))
);

CREATE INDEX idx_fee_transactions_student ON fee_transactions(student_id, session_id);
CREATE INDEX idx_fee_transactions_recorded ON fee_transactions(recorded_at DESC);
";

const ACTIVITY_LOGS_SQL: &str = r"
CREATE TABLE activity_logs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    actor VARCHAR(100) NOT NULL,
    action VARCHAR(16) NOT NULL,
    module VARCHAR(32) NOT NULL,
    description TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_activity_logs_created ON activity_logs(created_at DESC);
CREATE INDEX idx_activity_logs_module ON activity_logs(module, created_at DESC);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS activity_logs CASCADE;
DROP TABLE IF EXISTS fee_transactions CASCADE;
DROP TABLE IF EXISTS fee_line_items CASCADE;
DROP TABLE IF EXISTS enrollments CASCADE;
DROP TABLE IF EXISTS class_fee_structures CASCADE;
DROP TABLE IF EXISTS students CASCADE;
DROP TABLE IF EXISTS academic_sessions CASCADE;
";
