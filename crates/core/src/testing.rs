//! In-memory store for service tests, with fault injection.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kosh_shared::types::{
    AcademicSessionId, ActivityLogId, ClassFeeStructureId, EnrollmentId, ExpenseId,
    FeeLineItemId, FeeTransactionId, StudentId,
};
use rust_decimal::Decimal;

use crate::audit::{ActivityFilter, ActivityLog, ActivitySink, NewActivityLog};
use crate::enrollment::{
    ClassFeeStructure, Enrollment, NewEnrollment, NewStudent, Student, StudentStatus,
};
use crate::expenses::{Expense, ExpenseFilter, NewExpense};
use crate::ledger::{
    Balance, FeeLineItem, FeeLineItemPatch, FeeTransaction, FeeType, NewFeeLineItem,
    OutstandingLineItem, PaymentCommit, PaymentMethod, PaymentReceipt, TransactionFilter,
};
use crate::promotion::PromotionWrite;
use crate::session::AcademicSession;
use crate::store::{
    EnrollmentStore, ExpenseStore, FeeStore, PersistenceError, SessionStore, StorePolicy,
};

/// Policy with short timeouts and no real backoff.
pub fn fast_policy() -> StorePolicy {
    StorePolicy {
        call_timeout: Duration::from_millis(200),
        read_retries: 2,
        read_backoff: Duration::from_millis(1),
        cas_retries: 3,
    }
}

/// A detached line item with the given money fields.
pub fn line_item(
    fee_type: FeeType,
    total: Decimal,
    previous: Decimal,
    paid: Decimal,
) -> FeeLineItem {
    let now = Utc::now();
    FeeLineItem {
        id: FeeLineItemId::new(),
        student_id: StudentId::new(),
        session_id: AcademicSessionId::new(),
        fee_type,
        total_amount: total,
        previous_year_fees: previous,
        paid_amount: paid,
        carried_forward_amount: Decimal::ZERO,
        outstanding_amount: total + previous - paid,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

/// Valid registration fields; every test student is a Kumar.
pub fn new_student(scholar_no: &str, first_name: &str) -> NewStudent {
    NewStudent {
        scholar_no: scholar_no.into(),
        first_name: first_name.into(),
        last_name: "Kumar".into(),
        parent_name: "Suresh Kumar".into(),
        parent_phone: "98765 43210".into(),
        parent_email: None,
    }
}

#[derive(Default)]
struct State {
    students: Vec<Student>,
    sessions: Vec<AcademicSession>,
    enrollments: Vec<Enrollment>,
    line_items: Vec<FeeLineItem>,
    transactions: Vec<FeeTransaction>,
    structures: Vec<ClassFeeStructure>,
    logs: Vec<ActivityLog>,
    expenses: Vec<Expense>,
    cas_conflicts: u32,
    fail_next_commit: bool,
    failing_promotions: HashSet<StudentId>,
    touch_source_items: bool,
}

impl State {
    fn take_conflict(&mut self) -> bool {
        if self.cas_conflicts > 0 {
            self.cas_conflicts -= 1;
            return true;
        }
        false
    }

    fn materialize(&mut self, item: NewFeeLineItem) -> FeeLineItem {
        let now = Utc::now();
        let item = FeeLineItem {
            id: FeeLineItemId::new(),
            student_id: item.student_id,
            session_id: item.session_id,
            fee_type: item.fee_type,
            total_amount: item.balance.total_amount,
            previous_year_fees: item.balance.previous_year_fees,
            paid_amount: item.balance.paid_amount,
            carried_forward_amount: item.balance.carried_forward_amount,
            outstanding_amount: item.balance.outstanding_amount,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.line_items.push(item.clone());
        item
    }

    fn enroll(&mut self, e: NewEnrollment) -> Result<Enrollment, PersistenceError> {
        if self
            .enrollments
            .iter()
            .any(|x| x.student_id == e.student_id && x.session_id == e.session_id)
        {
            return Err(PersistenceError::Conflict {
                operation: "insert_enrollment",
                message: "enrollments_student_session_key".into(),
            });
        }
        let enrollment = Enrollment {
            id: EnrollmentId::new(),
            student_id: e.student_id,
            session_id: e.session_id,
            class_grade: e.class_grade,
            section: e.section,
            created_at: Utc::now(),
        };
        self.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }
}

fn apply(item: &mut FeeLineItem, balance: Balance) {
    item.total_amount = balance.total_amount;
    item.previous_year_fees = balance.previous_year_fees;
    item.paid_amount = balance.paid_amount;
    item.carried_forward_amount = balance.carried_forward_amount;
    item.outstanding_amount = balance.outstanding_amount;
    item.version += 1;
    item.updated_at = Utc::now();
}

/// Store implementing every store trait over shared in-memory tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // ---- seeding ----

    pub fn seed_session(&self, name: &str, active: bool) -> AcademicSession {
        let session = AcademicSession {
            id: AcademicSessionId::new(),
            name: name.into(),
            is_active: active,
            created_at: Utc::now(),
        };
        self.state().sessions.push(session.clone());
        session
    }

    pub fn seed_student(&self, first_name: &str) -> Student {
        let mut s = self.state();
        let input = new_student(&format!("S-{}", s.students.len() + 1), first_name);
        let student = student_from(input);
        s.students.push(student.clone());
        student
    }

    pub fn seed_student_and_session(&self) -> (Student, AcademicSession) {
        let session = self.seed_session("2025-26", true);
        let student = self.seed_student("Asha");
        self.seed_enrollment(student.id, session.id, "5th");
        (student, session)
    }

    pub fn seed_enrollment(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
        class: &str,
    ) -> Enrollment {
        self.state()
            .enroll(NewEnrollment {
                student_id,
                session_id,
                class_grade: class.into(),
                section: None,
            })
            .unwrap()
    }

    pub fn seed_line_item(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
        fee_type: FeeType,
        total: Decimal,
        previous: Decimal,
        paid: Decimal,
    ) -> FeeLineItem {
        self.state().materialize(NewFeeLineItem {
            student_id,
            session_id,
            fee_type,
            balance: Balance {
                total_amount: total,
                previous_year_fees: previous,
                paid_amount: paid,
                carried_forward_amount: Decimal::ZERO,
                outstanding_amount: total + previous - paid,
            },
        })
    }

    /// A cash tuition payment recorded at `at`, with no line item behind it.
    pub fn seed_transaction(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> FeeTransaction {
        let tx = FeeTransaction {
            id: FeeTransactionId::new(),
            student_id,
            session_id,
            line_item_id: FeeLineItemId::new(),
            fee_type: FeeType::Tuition,
            amount,
            method: PaymentMethod::Cash,
            reference: None,
            remarks: None,
            recorded_by: "clerk".into(),
            recorded_at: at,
        };
        self.state().transactions.push(tx.clone());
        tx
    }

    pub fn seed_fee_structure(&self, class: &str, tuition: Decimal) {
        self.state().structures.push(ClassFeeStructure {
            id: ClassFeeStructureId::new(),
            class_grade: class.into(),
            tuition_fee_yearly: tuition,
            is_active: true,
        });
    }

    // ---- faults ----

    /// The next `n` compare-and-swap writes report a lost race.
    pub fn inject_cas_conflicts(&self, n: u32) {
        self.state().cas_conflicts = n;
    }

    /// The next payment commit fails before writing anything.
    pub fn fail_next_commit(&self) {
        self.state().fail_next_commit = true;
    }

    /// Promotion writes for this student fail.
    pub fn fail_promotion_of(&self, student_id: StudentId) {
        self.state().failing_promotions.insert(student_id);
    }

    /// Every source item a promotion is about to close gets written by
    /// someone else first, as if a payment landed in between.
    pub fn touch_source_items_during_promotion(&self) {
        self.state().touch_source_items = true;
    }

    // ---- inspection ----

    pub fn line_item(&self, id: FeeLineItemId) -> Option<FeeLineItem> {
        self.state().line_items.iter().find(|i| i.id == id).cloned()
    }

    pub fn line_items_for(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
    ) -> Vec<FeeLineItem> {
        self.state()
            .line_items
            .iter()
            .filter(|i| i.student_id == student_id && i.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn enrollment(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
    ) -> Option<Enrollment> {
        self.state()
            .enrollments
            .iter()
            .find(|e| e.student_id == student_id && e.session_id == session_id)
            .cloned()
    }

    pub fn line_item_count(&self) -> usize {
        self.state().line_items.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.state().transactions.len()
    }

    pub fn activity_count(&self) -> usize {
        self.state().logs.len()
    }

    pub fn expense_count(&self) -> usize {
        self.state().expenses.len()
    }
}

fn student_from(input: NewStudent) -> Student {
    Student {
        id: StudentId::new(),
        scholar_no: input.scholar_no,
        first_name: input.first_name,
        last_name: input.last_name,
        parent_name: input.parent_name,
        parent_phone: input.parent_phone,
        parent_email: input.parent_email,
        status: StudentStatus::Active,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl FeeStore for MemoryStore {
    async fn fetch_fee_line_items(
        &self,
        student_id: StudentId,
        session_id: Option<AcademicSessionId>,
    ) -> Result<Vec<FeeLineItem>, PersistenceError> {
        Ok(self
            .state()
            .line_items
            .iter()
            .filter(|i| i.student_id == student_id)
            .filter(|i| session_id.is_none_or(|s| s == i.session_id))
            .cloned()
            .collect())
    }

    async fn fetch_session_line_items(
        &self,
        session_id: AcademicSessionId,
    ) -> Result<Vec<FeeLineItem>, PersistenceError> {
        Ok(self
            .state()
            .line_items
            .iter()
            .filter(|i| i.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn fetch_fee_line_item(
        &self,
        id: FeeLineItemId,
    ) -> Result<Option<FeeLineItem>, PersistenceError> {
        Ok(self.line_item(id))
    }

    async fn fetch_outstanding_line_items(
        &self,
        session_id: Option<AcademicSessionId>,
    ) -> Result<Vec<OutstandingLineItem>, PersistenceError> {
        let s = self.state();
        Ok(s.line_items
            .iter()
            .filter(|i| i.outstanding_amount > Decimal::ZERO)
            .filter(|i| session_id.is_none_or(|id| id == i.session_id))
            .filter_map(|i| {
                let student = s.students.iter().find(|st| st.id == i.student_id)?;
                let class_grade = s
                    .enrollments
                    .iter()
                    .find(|e| e.student_id == i.student_id && e.session_id == i.session_id)
                    .map(|e| e.class_grade.clone());
                Some(OutstandingLineItem {
                    line_item: i.clone(),
                    scholar_no: student.scholar_no.clone(),
                    student_name: student.full_name(),
                    parent_phone: student.parent_phone.clone(),
                    class_grade,
                })
            })
            .collect())
    }

    async fn insert_fee_line_item(
        &self,
        item: NewFeeLineItem,
    ) -> Result<FeeLineItem, PersistenceError> {
        Ok(self.state().materialize(item))
    }

    async fn update_fee_line_item(
        &self,
        id: FeeLineItemId,
        patch: FeeLineItemPatch,
    ) -> Result<Option<FeeLineItem>, PersistenceError> {
        let mut s = self.state();
        if s.take_conflict() {
            return Ok(None);
        }
        let Some(item) = s
            .line_items
            .iter_mut()
            .find(|i| i.id == id && i.version == patch.expected_version)
        else {
            return Ok(None);
        };
        apply(item, patch.balance);
        Ok(Some(item.clone()))
    }

    async fn delete_fee_line_item(
        &self,
        id: FeeLineItemId,
        expected_version: i64,
    ) -> Result<bool, PersistenceError> {
        let mut s = self.state();
        if s.take_conflict() {
            return Ok(false);
        }
        let before = s.line_items.len();
        s.line_items
            .retain(|i| !(i.id == id && i.version == expected_version));
        Ok(s.line_items.len() < before)
    }

    async fn commit_payment(
        &self,
        commit: PaymentCommit,
    ) -> Result<Option<PaymentReceipt>, PersistenceError> {
        let mut s = self.state();
        if std::mem::take(&mut s.fail_next_commit) {
            return Err(PersistenceError::store("commit_payment", "connection reset"));
        }
        if s.take_conflict() {
            return Ok(None);
        }
        let amount = commit.transaction.amount;
        let Some(item) = s.line_items.iter_mut().find(|i| {
            i.id == commit.line_item_id
                && i.version == commit.expected_version
                && i.outstanding_amount >= amount
        }) else {
            return Ok(None);
        };
        apply(item, commit.balance);
        let line_item = item.clone();

        let t = commit.transaction;
        let transaction = FeeTransaction {
            id: FeeTransactionId::new(),
            student_id: t.student_id,
            session_id: t.session_id,
            line_item_id: t.line_item_id,
            fee_type: t.fee_type,
            amount: t.amount,
            method: t.method,
            reference: t.reference,
            remarks: t.remarks,
            recorded_by: t.recorded_by,
            recorded_at: Utc::now(),
        };
        s.transactions.push(transaction.clone());
        Ok(Some(PaymentReceipt::new(line_item, transaction)))
    }

    async fn fetch_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<FeeTransaction>, PersistenceError> {
        Ok(self
            .state()
            .transactions
            .iter()
            .rev()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn insert_student(&self, student: NewStudent) -> Result<Student, PersistenceError> {
        let mut s = self.state();
        if s.students.iter().any(|x| x.scholar_no == student.scholar_no) {
            return Err(PersistenceError::Conflict {
                operation: "insert_student",
                message: "students_scholar_no_key".into(),
            });
        }
        let student = student_from(student);
        s.students.push(student.clone());
        Ok(student)
    }

    async fn fetch_student(&self, id: StudentId) -> Result<Option<Student>, PersistenceError> {
        Ok(self.state().students.iter().find(|s| s.id == id).cloned())
    }

    async fn set_student_status(
        &self,
        id: StudentId,
        status: StudentStatus,
    ) -> Result<Option<Student>, PersistenceError> {
        let mut s = self.state();
        Ok(s.students.iter_mut().find(|x| x.id == id).map(|x| {
            x.status = status;
            x.clone()
        }))
    }

    async fn insert_enrollment(
        &self,
        enrollment: NewEnrollment,
    ) -> Result<Enrollment, PersistenceError> {
        self.state().enroll(enrollment)
    }

    async fn find_enrollment(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
    ) -> Result<Option<Enrollment>, PersistenceError> {
        Ok(self.enrollment(student_id, session_id))
    }

    async fn fetch_class_fee_structure(
        &self,
        class_grade: &str,
    ) -> Result<Option<ClassFeeStructure>, PersistenceError> {
        Ok(self
            .state()
            .structures
            .iter()
            .find(|s| s.class_grade == class_grade && s.is_active)
            .cloned())
    }

    async fn promote_student(&self, write: PromotionWrite) -> Result<Enrollment, PersistenceError> {
        let mut s = self.state();
        if s.failing_promotions.contains(&write.enrollment.student_id) {
            return Err(PersistenceError::store("promote_student", "connection reset"));
        }
        if std::mem::take(&mut s.touch_source_items) {
            for carried in &write.carried_items {
                if let Some(item) = s.line_items.iter_mut().find(|i| i.id == carried.line_item_id) {
                    item.version += 1;
                }
            }
        }
        let stale = write.carried_items.iter().find(|c| {
            !s.line_items
                .iter()
                .any(|i| i.id == c.line_item_id && i.version == c.expected_version)
        });
        if let Some(stale) = stale {
            return Err(PersistenceError::Conflict {
                operation: "promote_student",
                message: format!("line item {} changed during promotion", stale.line_item_id),
            });
        }

        let enrollment = s.enroll(write.enrollment)?;
        for carried in write.carried_items {
            if let Some(item) = s.line_items.iter_mut().find(|i| i.id == carried.line_item_id) {
                apply(item, carried.balance);
            }
        }
        for item in write.line_items {
            s.materialize(item);
        }
        Ok(enrollment)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, name: &str) -> Result<AcademicSession, PersistenceError> {
        let mut s = self.state();
        if s.sessions.iter().any(|x| x.name == name) {
            return Err(PersistenceError::Conflict {
                operation: "insert_session",
                message: "academic_sessions_name_key".into(),
            });
        }
        let session = AcademicSession {
            id: AcademicSessionId::new(),
            name: name.into(),
            is_active: false,
            created_at: Utc::now(),
        };
        s.sessions.push(session.clone());
        Ok(session)
    }

    async fn list_sessions(&self) -> Result<Vec<AcademicSession>, PersistenceError> {
        Ok(self.state().sessions.iter().rev().cloned().collect())
    }

    async fn fetch_session(
        &self,
        id: AcademicSessionId,
    ) -> Result<Option<AcademicSession>, PersistenceError> {
        Ok(self.state().sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn fetch_active_session(&self) -> Result<Option<AcademicSession>, PersistenceError> {
        Ok(self.state().sessions.iter().find(|s| s.is_active).cloned())
    }

    async fn activate_session(&self, id: AcademicSessionId) -> Result<bool, PersistenceError> {
        let mut s = self.state();
        if !s.sessions.iter().any(|x| x.id == id) {
            return Ok(false);
        }
        for session in &mut s.sessions {
            session.is_active = session.id == id;
        }
        Ok(true)
    }
}

#[async_trait]
impl ActivitySink for MemoryStore {
    async fn record(&self, entry: NewActivityLog) -> Result<(), PersistenceError> {
        self.state().logs.push(ActivityLog {
            id: ActivityLogId::new(),
            actor: entry.actor,
            action: entry.action,
            module: entry.module.to_string(),
            description: entry.description,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn fetch_activity_logs(
        &self,
        filter: ActivityFilter,
    ) -> Result<Vec<ActivityLog>, PersistenceError> {
        let limit = usize::try_from(filter.limit).unwrap_or(usize::MAX);
        Ok(self
            .state()
            .logs
            .iter()
            .rev()
            .filter(|l| filter.matches(l))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn insert_expense(&self, expense: NewExpense) -> Result<Expense, PersistenceError> {
        let expense = Expense {
            id: ExpenseId::new(),
            title: expense.title,
            category: expense.category,
            amount: expense.amount,
            expense_date: expense.expense_date,
            description: expense.description,
            added_by: expense.added_by,
            session_id: expense.session_id,
            created_at: Utc::now(),
        };
        self.state().expenses.push(expense.clone());
        Ok(expense)
    }

    async fn fetch_expenses(
        &self,
        filter: ExpenseFilter,
    ) -> Result<Vec<Expense>, PersistenceError> {
        let mut expenses: Vec<Expense> = self
            .state()
            .expenses
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        expenses.sort_by(|a, b| b.expense_date.cmp(&a.expense_date));
        Ok(expenses)
    }
}
