//! Report generation service.

use std::collections::HashMap;

use chrono::NaiveTime;
use kosh_shared::types::{AcademicSessionId, StudentId};
use rust_decimal::Decimal;

use super::types::{
    CategoryTotal, CollectionSummary, DefaulterFilter, DefaulterRow, DefaultersReport,
    FeeTypeOverview, FeeTypeTotal, FinancialOverview, FinancialPeriod, MethodTotal,
    SessionFeeOverview,
};
use crate::audit::{ActivityFilter, ActivityLog, ActivitySink};
use crate::expenses::{Expense, ExpenseCategory, ExpenseFilter};
use crate::ledger::{
    FeeLineItem, FeeSummary, FeeTransaction, FeeType, LedgerError, OutstandingLineItem,
    PaymentMethod, TransactionFilter, compute_fee_summary,
};
use crate::store::{self, ExpenseStore, FeeStore, StorePolicy};

/// Service for generating fee reports.
///
/// The async methods fetch from the store; the associated functions do the
/// aggregation and have no I/O.
pub struct ReportService<F, X, A> {
    fees: F,
    expenses: X,
    audit: A,
    policy: StorePolicy,
}

impl<F: FeeStore, X: ExpenseStore, A: ActivitySink> ReportService<F, X, A> {
    /// Creates a service over the given store handles.
    pub const fn new(fees: F, expenses: X, audit: A, policy: StorePolicy) -> Self {
        Self {
            fees,
            expenses,
            audit,
            policy,
        }
    }

    /// Students who still owe, optionally within one session.
    pub async fn defaulters(
        &self,
        session_id: Option<AcademicSessionId>,
        filter: &DefaulterFilter,
    ) -> Result<DefaultersReport, LedgerError> {
        let items = store::read(&self.policy, "fetch_outstanding_line_items", || {
            self.fees.fetch_outstanding_line_items(session_id)
        })
        .await?;

        let rows = Self::aggregate_defaulters(items, filter);
        Ok(DefaultersReport {
            session_id,
            total_outstanding: rows.iter().map(|r| r.summary.outstanding_amount).sum(),
            rows,
        })
    }

    /// Payments matching `filter`, grouped by method and fee type.
    pub async fn collections(
        &self,
        filter: TransactionFilter,
    ) -> Result<CollectionSummary, LedgerError> {
        let txs = store::read(&self.policy, "fetch_transactions", || {
            self.fees.fetch_transactions(filter.clone())
        })
        .await?;
        Ok(Self::summarize_collections(&txs))
    }

    /// Billing state of a session.
    pub async fn session_overview(
        &self,
        session_id: AcademicSessionId,
    ) -> Result<SessionFeeOverview, LedgerError> {
        let items = store::read(&self.policy, "fetch_session_line_items", || {
            self.fees.fetch_session_line_items(session_id)
        })
        .await?;
        Ok(Self::summarize_session(session_id, &items))
    }

    /// Fees collected against expenses paid over `period`, both ends included.
    ///
    /// # Errors
    ///
    /// `Validation` if `period.from` is after `period.to`.
    pub async fn financial_overview(
        &self,
        period: FinancialPeriod,
    ) -> Result<FinancialOverview, LedgerError> {
        if period.from > period.to {
            return Err(LedgerError::Validation(format!(
                "Period starts {} after it ends {}",
                period.from, period.to
            )));
        }
        let day_after = period.to.succ_opt().ok_or_else(|| {
            LedgerError::Validation(format!("Period end {} is out of range", period.to))
        })?;

        let payments = TransactionFilter {
            from: Some(period.from.and_time(NaiveTime::MIN).and_utc()),
            to: Some(day_after.and_time(NaiveTime::MIN).and_utc()),
            ..TransactionFilter::default()
        };
        let txs = store::read(&self.policy, "fetch_transactions", || {
            self.fees.fetch_transactions(payments.clone())
        })
        .await?;

        let spent = ExpenseFilter {
            from: Some(period.from),
            to: Some(period.to),
            ..ExpenseFilter::default()
        };
        let expenses = store::read(&self.policy, "fetch_expenses", || {
            self.expenses.fetch_expenses(spent.clone())
        })
        .await?;

        Ok(Self::summarize_finances(period, &txs, &expenses))
    }

    /// Activity log entries, newest first.
    pub async fn activity_logs(
        &self,
        filter: ActivityFilter,
    ) -> Result<Vec<ActivityLog>, LedgerError> {
        let logs = store::read(&self.policy, "fetch_activity_logs", || {
            self.audit.fetch_activity_logs(filter.clone())
        })
        .await?;
        Ok(logs)
    }
}

impl<F, X, A> ReportService<F, X, A> {
    /// Groups unpaid line items by student and sorts by outstanding, largest first.
    #[must_use]
    pub fn aggregate_defaulters(
        items: Vec<OutstandingLineItem>,
        filter: &DefaulterFilter,
    ) -> Vec<DefaulterRow> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut index: HashMap<StudentId, usize> = HashMap::new();
        let mut rows: Vec<DefaulterRow> = Vec::new();

        for item in items {
            if item.line_item.outstanding_amount <= Decimal::ZERO {
                continue;
            }
            if let Some(class) = &filter.class_grade
                && item.class_grade.as_ref() != Some(class)
            {
                continue;
            }
            if let Some(needle) = &search
                && !matches_search(&item, needle)
            {
                continue;
            }

            let li = &item.line_item;
            let slot = *index.entry(li.student_id).or_insert_with(|| {
                rows.push(DefaulterRow {
                    student_id: li.student_id,
                    scholar_no: item.scholar_no.clone(),
                    student_name: item.student_name.clone(),
                    parent_phone: item.parent_phone.clone(),
                    class_grade: item.class_grade.clone(),
                    fee_types: Vec::new(),
                    summary: FeeSummary::default(),
                });
                rows.len() - 1
            });

            let row = &mut rows[slot];
            if row.class_grade.is_none() {
                row.class_grade.clone_from(&item.class_grade);
            }
            if !row.fee_types.contains(&li.fee_type) {
                row.fee_types.push(li.fee_type);
            }
            row.summary.total_amount += li.total_amount;
            row.summary.previous_year_fees += li.previous_year_fees;
            row.summary.paid_amount += li.paid_amount;
            row.summary.carried_forward_amount += li.carried_forward_amount;
            row.summary.outstanding_amount += li.outstanding_amount;
        }

        rows.sort_by(|a, b| {
            b.summary
                .outstanding_amount
                .cmp(&a.summary.outstanding_amount)
                .then_with(|| a.student_name.cmp(&b.student_name))
        });
        rows
    }

    /// Totals payments by method and by fee type.
    #[must_use]
    pub fn summarize_collections(txs: &[FeeTransaction]) -> CollectionSummary {
        let by_method = PaymentMethod::ALL
            .into_iter()
            .filter_map(|method| {
                let matching: Vec<_> = txs.iter().filter(|t| t.method == method).collect();
                (!matching.is_empty()).then(|| MethodTotal {
                    method,
                    amount: matching.iter().map(|t| t.amount).sum(),
                    count: matching.len(),
                })
            })
            .collect();

        let by_fee_type = FeeType::ALL
            .into_iter()
            .filter_map(|fee_type| {
                let matching: Vec<_> = txs.iter().filter(|t| t.fee_type == fee_type).collect();
                (!matching.is_empty()).then(|| FeeTypeTotal {
                    fee_type,
                    amount: matching.iter().map(|t| t.amount).sum(),
                    count: matching.len(),
                })
            })
            .collect();

        CollectionSummary {
            total_collected: txs.iter().map(|t| t.amount).sum(),
            transaction_count: txs.len(),
            by_method,
            by_fee_type,
        }
    }

    /// Totals a session's line items overall and per fee type.
    #[must_use]
    pub fn summarize_session(
        session_id: AcademicSessionId,
        items: &[FeeLineItem],
    ) -> SessionFeeOverview {
        let mut per_student: HashMap<StudentId, Decimal> = HashMap::new();
        for item in items {
            *per_student.entry(item.student_id).or_default() += item.outstanding_amount;
        }

        let by_fee_type = FeeType::ALL
            .into_iter()
            .filter_map(|fee_type| {
                let matching: Vec<FeeLineItem> = items
                    .iter()
                    .filter(|i| i.fee_type == fee_type)
                    .cloned()
                    .collect();
                (!matching.is_empty()).then(|| FeeTypeOverview {
                    fee_type,
                    line_items: matching.len(),
                    summary: compute_fee_summary(&matching),
                })
            })
            .collect();

        SessionFeeOverview {
            session_id,
            students_billed: per_student.len(),
            students_settled: per_student.values().filter(|o| **o <= Decimal::ZERO).count(),
            summary: compute_fee_summary(items),
            by_fee_type,
        }
    }

    /// Nets payments against expenses. Callers pass rows already narrowed
    /// to `period`.
    #[must_use]
    pub fn summarize_finances(
        period: FinancialPeriod,
        txs: &[FeeTransaction],
        expenses: &[Expense],
    ) -> FinancialOverview {
        let fees_collected: Decimal = txs.iter().map(|t| t.amount).sum();
        let total_expenses: Decimal = expenses.iter().map(|e| e.amount).sum();

        let expenses_by_category = ExpenseCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let matching: Vec<_> = expenses.iter().filter(|e| e.category == category).collect();
                (!matching.is_empty()).then(|| CategoryTotal {
                    category,
                    amount: matching.iter().map(|e| e.amount).sum(),
                    count: matching.len(),
                })
            })
            .collect();

        FinancialOverview {
            from: period.from,
            to: period.to,
            fees_collected,
            payment_count: txs.len(),
            total_expenses,
            expense_count: expenses.len(),
            net_balance: fees_collected - total_expenses,
            expenses_by_category,
        }
    }
}

fn matches_search(item: &OutstandingLineItem, needle: &str) -> bool {
    item.student_name.to_lowercase().contains(needle)
        || item.scholar_no.to_lowercase().contains(needle)
        || item.parent_phone.contains(needle)
}
